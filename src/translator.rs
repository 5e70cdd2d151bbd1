//! 翻译后端能力接口
//!
//! 引擎不关心后端是本地模型还是远程服务：宿主实现 `Translator`，
//! 引擎按批次提交条目并严格按 id 匹配响应。响应允许乱序、允许
//! 缺项——缺失的 id 会被引擎归类为失败条目。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::TranslateResult;

/// 提交给后端的单个条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateItem {
    pub id: usize,
    pub text: String,
}

/// 后端返回的单条译文
///
/// `error` 非空表示该条目翻译失败；空译文同样按失败处理。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Translation {
    pub id: usize,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 一次批量调用的完整响应
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslateResponse {
    pub translations: Vec<Translation>,
}

/// 翻译后端能力
///
/// 单线程协作调度，实现无须 `Send`；超时控制是实现方的职责。
#[async_trait(?Send)]
pub trait Translator {
    /// 翻译一批条目
    ///
    /// 顶层失败（网络不可达、响应无法解析）以 `Err` 返回，由引擎
    /// 按批次做指数退避重试；单条目失败放在响应的 `error` 字段里。
    async fn translate(
        &self,
        items: &[TranslateItem],
        target_lang: &str,
        source_lang: &str,
    ) -> TranslateResult<TranslateResponse>;
}
