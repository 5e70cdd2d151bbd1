//! 新内容监视模块
//!
//! 宿主把观察到的 DOM 插入（无限滚动、SPA 导航）交给监视器缓冲，
//! 自最后一次变动起 500ms 的防抖窗口过后统一处理：增量提取新
//! 节点，并在没有整页任务运行时为它们发送一次尽力而为的翻译
//! 批次——没有优先级队列，也没有补偿重试。整页任务进行中时
//! 新节点继续缓冲，处理推迟到监视器自己的下一次防抖触发。

use markup5ever_rcdom::Handle;
use tokio::time::{sleep_until, Duration, Instant};

use crate::config::constants;
use crate::queue::{apply_response, call_with_retry};
use crate::session::TranslationSession;

/// 一批观察到的 DOM 变动
///
/// 只关心插入：新增节点原样入缓冲，分类推迟到防抖触发之后。
#[derive(Debug, Default)]
pub struct MutationRecord {
    pub added: Vec<Handle>,
}

/// 新内容监视器
///
/// 持有会话的浅拷贝；`run` 是常驻的防抖循环，宿主在本地任务集
/// 上启动它，丢弃该任务即彻底停止监视。
pub struct MutationWatcher {
    session: TranslationSession,
}

impl MutationWatcher {
    pub fn new(session: TranslationSession) -> Self {
        Self { session }
    }

    /// 缓冲一批观察到的变动
    ///
    /// 监视未启用时等同于观察器已断开，直接丢弃。
    pub fn record(&self, record: MutationRecord) {
        {
            let mut inner = self.session.inner_mut();
            if !inner.auto_translate_enabled || record.added.is_empty() {
                return;
            }

            inner.mutation_buffer.extend(record.added);
            inner.last_mutation = Some(Instant::now());
        }

        self.session.mutation_wake.notify_one();
    }

    /// 防抖循环
    ///
    /// 等缓冲非空后，从最后一次变动起睡满防抖窗口再处理；窗口内
    /// 又有变动到达则顺延。循环不主动退出，由宿主丢弃任务结束。
    pub async fn run(&self) {
        loop {
            // 等待缓冲出现内容
            loop {
                let ready = {
                    let inner = self.session.inner_mut();
                    inner.auto_translate_enabled && !inner.mutation_buffer.is_empty()
                };
                if ready {
                    break;
                }
                self.session.mutation_wake.notified().await;
            }

            // 防抖窗口：从最后一次变动起计
            loop {
                let deadline = {
                    let inner = self.session.inner_mut();
                    inner
                        .last_mutation
                        .map(|at| at + Duration::from_millis(constants::MUTATION_DEBOUNCE_MS))
                };

                let deadline = match deadline {
                    Some(deadline) => deadline,
                    // 等待期间缓冲被停用清空
                    None => break,
                };

                if Instant::now() >= deadline {
                    break;
                }
                sleep_until(deadline).await;
            }

            self.flush_new_content().await;
        }
    }

    /// 处理缓冲的新节点
    ///
    /// 返回成功应用的译文条数。整页任务进行中时不动缓冲，只把
    /// 防抖计时顺延，等下一次触发再检查。
    pub async fn flush_new_content(&self) -> usize {
        let nodes = {
            let mut inner = self.session.inner_mut();

            if !inner.auto_translate_enabled || inner.mutation_buffer.is_empty() {
                return 0;
            }

            if inner.run_state.is_active() {
                tracing::debug!("整页翻译进行中，新内容处理顺延");
                inner.last_mutation = Some(Instant::now());
                return 0;
            }

            inner.last_mutation = None;
            std::mem::take(&mut inner.mutation_buffer)
        };

        // 增量提取：元素按子树走，孤立文本节点直接评估
        let items = {
            let mut inner = self.session.inner_mut();
            let inner_ref = &mut *inner;
            let mut items = Vec::new();
            for node in &nodes {
                items.extend(inner_ref.extractor.extract_inserted(
                    node,
                    &mut inner_ref.registry,
                    self.session.layout.as_ref(),
                ));
            }
            items
        };

        if items.is_empty() {
            return 0;
        }

        let (target, source) = {
            let inner = self.session.inner_mut();
            (inner.target_lang.clone(), inner.source_lang.clone())
        };
        if target.is_empty() {
            // 尚未有过整页翻译，不知道目标语言
            return 0;
        }

        // 一次性尽力而为：单次尝试，失败即放弃
        let applied = match call_with_retry(
            self.session.translator.as_ref(),
            &items,
            &target,
            &source,
            1,
        )
        .await
        {
            Ok(response) => {
                let mut inner = self.session.inner_mut();
                let outcome = apply_response(&mut inner.registry, &items, &response);
                if outcome.applied > 0 {
                    inner.flags.has_cache = true;
                }
                outcome.applied
            }
            Err(error) => {
                tracing::warn!("新内容翻译失败: {}", error);
                0
            }
        };

        tracing::debug!(applied, found = items.len(), "新内容处理完成");
        applied
    }
}
