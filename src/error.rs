//! 翻译引擎统一错误处理
//!
//! 提供结构化错误类型和错误处理机制

use std::fmt;

use thiserror::Error;

/// 翻译引擎错误类型
#[derive(Error, Debug, Clone)]
pub enum TranslateError {
    /// 已有翻译任务在运行，拒绝并发启动
    #[error("翻译任务正在进行中")]
    Busy,

    /// 页面中没有可翻译文本
    #[error("没有找到可翻译的文本")]
    NoTranslatableText,

    /// 翻译后端不可达或调用失败
    #[error("翻译服务错误: {0}")]
    Transport(String),

    /// 翻译响应无法解析
    #[error("解析错误: {0}")]
    Parse(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    Internal(String),
}

impl TranslateError {
    /// 检查错误是否可重试
    ///
    /// 传输层和解析失败按批次重试（指数退避），其余错误直接上抛。
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslateError::Transport(_) => true,
            TranslateError::Parse(_) => true,
            TranslateError::Busy => false,
            TranslateError::NoTranslatableText => false,
            TranslateError::Config(_) => false,
            TranslateError::Internal(_) => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslateError::Busy => ErrorSeverity::Info,
            TranslateError::NoTranslatableText => ErrorSeverity::Warning,
            TranslateError::Transport(_) => ErrorSeverity::Error,
            TranslateError::Parse(_) => ErrorSeverity::Error,
            TranslateError::Config(_) => ErrorSeverity::Critical,
            TranslateError::Internal(_) => ErrorSeverity::Critical,
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl From<serde_json::Error> for TranslateError {
    fn from(error: serde_json::Error) -> Self {
        TranslateError::Parse(format!("JSON序列化错误: {}", error))
    }
}

/// 错误结果类型别名
pub type TranslateResult<T> = Result<T, TranslateError>;

/// 错误处理助手函数
pub mod helpers {
    use super::*;

    /// 按严重程度记录并返回错误
    pub fn log_error<T>(error: TranslateError) -> TranslateResult<T> {
        match error.severity() {
            ErrorSeverity::Info => tracing::info!("翻译信息: {}", error),
            ErrorSeverity::Warning => tracing::warn!("翻译警告: {}", error),
            ErrorSeverity::Error => tracing::error!("翻译错误: {}", error),
            ErrorSeverity::Critical => tracing::error!("翻译严重错误: {}", error),
        }

        Err(error)
    }

    /// 创建传输错误
    pub fn transport_error<T: fmt::Display>(msg: T) -> TranslateError {
        TranslateError::Transport(msg.to_string())
    }

    /// 创建配置错误
    pub fn config_error<T: fmt::Display>(msg: T) -> TranslateError {
        TranslateError::Config(msg.to_string())
    }

    /// 创建内部错误
    pub fn internal_error<T: fmt::Display>(msg: T) -> TranslateError {
        TranslateError::Internal(msg.to_string())
    }
}
