//! 翻译队列引擎模块
//!
//! 维护按优先级降序的待翻译队列，按固定批次送往翻译后端：
//! 传输层失败按批次做退避重试，响应严格按 id 匹配，缺失或
//! 出错的条目归入失败列表，由完成后的补偿轮次以更小的批次
//! 再试。滚动稳定后队列中尚未派发的条目会就地重算优先级并
//! 整体重排，不影响已在途的批次。

use tokio::time::{sleep, Duration};

use crate::config::constants;
use crate::error::TranslateError;
use crate::extractor::QueueItem;
use crate::layout::Layout;
use crate::registry::NodeRegistry;
use crate::scorer::{score_element, score_text_node};
use crate::translator::{TranslateItem, TranslateResponse, Translator};

/// 待翻译队列
///
/// 内部始终保持优先级降序；批次从队首取出。
#[derive(Debug, Default)]
pub struct PendingQueue {
    items: Vec<QueueItem>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以已排序的工作列表重置队列
    pub fn seed(&mut self, items: Vec<QueueItem>) {
        self.items = items;
    }

    /// 从队首取出一个批次（最高优先级在前）
    pub fn pop_batch(&mut self, batch_size: usize) -> Vec<QueueItem> {
        let take = batch_size.min(self.items.len());
        self.items.drain(..take).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// 就地重算所有排队条目的优先级并重排
    ///
    /// 针对视口滚动后几何变化的场景；节点已脱离文档的条目
    /// 降为零分留在队尾，写入阶段自然跳过。
    pub fn reprioritize(&mut self, registry: &NodeRegistry, layout: &dyn Layout) {
        for item in self.items.iter_mut() {
            let entry = match registry.get(item.id) {
                Some(entry) => entry,
                None => {
                    item.priority = 0;
                    continue;
                }
            };

            item.priority = match registry.live_node(item.id) {
                Some(node) => match entry.attr() {
                    Some(_) => score_element(&node, &item.text, layout),
                    None => score_text_node(&node, &item.text, layout),
                },
                None => 0,
            };
        }

        self.items.sort_by(|a, b| b.priority.cmp(&a.priority));
    }
}

/// 单个批次的处理结果
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// 成功写入 DOM 的条目数
    pub applied: usize,
    /// 需要进入补偿重试的条目
    pub failed: Vec<QueueItem>,
}

/// 引擎运行统计
///
/// 引擎整体运行在单线程协作调度上，计数器无须原子类型。
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    pub batches_dispatched: usize,
    pub items_applied: usize,
    pub items_failed: usize,
    pub retry_rounds_run: usize,
    pub characters_sent: usize,
}

impl EngineStats {
    pub fn reset(&mut self) {
        *self = Default::default();
    }
}

/// 调用翻译后端，传输失败按批次退避重试
///
/// 等待时间 = 基准延迟 × 尝试序号；重试只覆盖可重试错误
/// （传输/解析），重试耗尽返回最后一个错误。
pub async fn call_with_retry(
    translator: &dyn Translator,
    batch: &[QueueItem],
    target_lang: &str,
    source_lang: &str,
    retries: usize,
) -> Result<TranslateResponse, TranslateError> {
    let wire: Vec<TranslateItem> = batch
        .iter()
        .map(|item| TranslateItem {
            id: item.id,
            text: item.text.clone(),
        })
        .collect();

    let mut attempt = 0;
    loop {
        match translator.translate(&wire, target_lang, source_lang).await {
            Ok(response) => return Ok(response),
            Err(error) => {
                attempt += 1;

                if !error.is_retryable() || attempt >= retries {
                    return Err(error);
                }

                let delay = Duration::from_millis(constants::BACKOFF_BASE_MS * attempt as u64);
                tracing::warn!(
                    "批次翻译失败，{}ms 后重试 (尝试 {}/{}): {}",
                    delay.as_millis(),
                    attempt + 1,
                    retries,
                    error
                );
                sleep(delay).await;
            }
        }
    }
}

/// 将批次响应按 id 匹配回注册表
///
/// 响应中带非空译文且无错误标记的 id 立即写入；带错误标记、
/// 译文为空、或整个在响应中缺失的 id 归入失败列表。节点已
/// 脱离文档的写入失败只记录日志，既不算成功也不再重试。
pub fn apply_response(
    registry: &mut NodeRegistry,
    batch: &[QueueItem],
    response: &TranslateResponse,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for item in batch {
        let matched = response
            .translations
            .iter()
            .find(|translation| translation.id == item.id);

        match matched {
            Some(translation) if translation.error.is_none() && !translation.text.is_empty() => {
                if registry.apply_translation(item.id, &translation.text) {
                    outcome.applied += 1;
                }
            }
            Some(translation) => {
                tracing::debug!(
                    id = item.id,
                    error = translation.error.as_deref().unwrap_or("空译文"),
                    "条目翻译失败"
                );
                outcome.failed.push(item.clone());
            }
            None => {
                tracing::debug!(id = item.id, "响应中缺失该条目");
                outcome.failed.push(item.clone());
            }
        }
    }

    outcome
}

/// 整批失败时的结果：所有条目进入失败列表
pub fn batch_failed(batch: &[QueueItem]) -> BatchOutcome {
    BatchOutcome {
        applied: 0,
        failed: batch.to_vec(),
    }
}
