//! 状态通道能力接口

use async_trait::async_trait;

/// 面向用户的状态显示通道
///
/// 宿主负责渲染与延迟隐藏；引擎只提交文本。
#[async_trait(?Send)]
pub trait StatusSink {
    /// 显示一条状态信息
    async fn report(&self, message: &str, is_error: bool);

    /// 隐藏状态显示
    async fn hide(&self);
}

/// 丢弃所有状态的空实现
#[derive(Debug, Default)]
pub struct NullStatus;

#[async_trait(?Send)]
impl StatusSink for NullStatus {
    async fn report(&self, _message: &str, _is_error: bool) {}

    async fn hide(&self) {}
}
