//! 引擎配置管理模块
//!
//! 提供批次、重试和防抖参数的统一配置，支持默认值与校验

use serde::{Deserialize, Serialize};

use crate::error::{TranslateError, TranslateResult};

/// 配置常量
pub mod constants {
    /// 主队列每批发送的条目数
    pub const BATCH_SIZE: usize = 8;
    /// 失败重试阶段的批次大小
    pub const RETRY_BATCH_SIZE: usize = 4;
    /// 单个批次的最大重试次数
    pub const MAX_BATCH_RETRIES: usize = 3;
    /// 失败条目的补偿重试轮数
    pub const RETRY_ROUNDS: usize = 2;
    /// 退避基准延迟（毫秒），实际等待 = 基准 × 尝试序号
    pub const BACKOFF_BASE_MS: u64 = 500;

    /// 新内容防抖窗口（毫秒），自最后一次DOM变动起计
    pub const MUTATION_DEBOUNCE_MS: u64 = 500;
    /// 滚动稳定信号的防抖窗口（毫秒）
    pub const SCROLL_DEBOUNCE_MS: u64 = 100;

    /// 文本节点的最小修剪长度
    pub const MIN_TEXT_LENGTH: usize = 2;
    /// 功能性词汇的最大长度（更长的文本不按功能词过滤）
    pub const MIN_TRANSLATION_LENGTH: usize = 3;
    /// 代码类文本的特殊字符密度阈值
    pub const SPECIAL_CHAR_THRESHOLD: f32 = 0.33;

    /// 祖先语义判定的最大回溯层数
    pub const ANCESTOR_WALK_LIMIT: usize = 15;

    /// 引擎自身的状态指示元素 id，提取时必须跳过
    pub const STATUS_ELEMENT_ID: &str = "pageglot-status";

    /// 可翻译属性
    pub const TRANSLATABLE_ATTRS: &[&str] = &[
        "title", "alt", "placeholder", "aria-label", "aria-description",
    ];

    /// 跳过的元素（脚本/样式/代码/表单控件/嵌入媒体）
    pub const SKIP_ELEMENTS: &[&str] = &[
        "script", "style", "code", "pre", "noscript", "textarea", "select",
        "option", "meta", "link", "head", "svg", "math", "canvas", "video",
        "audio", "embed", "object", "iframe", "input",
    ];

    /// 功能性词汇
    pub const FUNCTIONAL_WORDS: &[&str] = &[
        "ok", "yes", "no", "on", "off", "go", "up", "x", ">", "▶", "▲", "▼", "◀", "•",
    ];

    /// 主内容区域的 id/class 特征词
    pub const MAIN_CONTENT_TOKENS: &[&str] =
        &["content", "article", "post", "entry", "main", "body-text"];

    /// 边缘区域的 id/class 特征词
    pub const PERIPHERAL_TOKENS: &[&str] = &[
        "sidebar", "nav", "menu", "footer", "header", "toc", "widget", "breadcrumb",
    ];
}

/// 引擎配置
///
/// 退避延迟与防抖窗口是固定常量，不在此处开放；这里只放批次规模
/// 与重试轮次这类按部署环境调整的参数。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// 主队列批次大小
    pub batch_size: usize,
    /// 失败重试阶段的批次大小
    pub retry_batch_size: usize,
    /// 单批次传输失败的最大重试次数
    pub max_batch_retries: usize,
    /// 失败条目的补偿重试轮数
    pub retry_rounds: usize,
    /// 是否收集属性文本（title/alt/placeholder 等）
    pub collect_attributes: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: constants::BATCH_SIZE,
            retry_batch_size: constants::RETRY_BATCH_SIZE,
            max_batch_retries: constants::MAX_BATCH_RETRIES,
            retry_rounds: constants::RETRY_ROUNDS,
            collect_attributes: true,
        }
    }
}

impl EngineConfig {
    /// 验证配置
    pub fn validate(&self) -> TranslateResult<()> {
        if self.batch_size == 0 {
            return Err(TranslateError::Config("批次大小不能为0".to_string()));
        }

        if self.retry_batch_size == 0 {
            return Err(TranslateError::Config("重试批次大小不能为0".to_string()));
        }

        if self.max_batch_retries == 0 {
            return Err(TranslateError::Config("重试次数不能为0".to_string()));
        }

        Ok(())
    }
}
