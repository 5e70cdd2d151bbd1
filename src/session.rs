//! 翻译会话模块
//!
//! `TranslationSession` 是一个页面纪元的全部可变状态的唯一所有者：
//! 注册表、待翻译队列、页面标记、运行状态机与新内容缓冲都在这里，
//! 宿主按会话粒度创建与销毁（每个 frame 一个，测试里随用随建）。
//!
//! 并发模型是单线程协作调度：所有工作以交错的异步任务跑在一个
//! 事件循环上，悬挂点只出现在等待翻译请求和防抖/退避计时器的
//! 位置。两个悬挂点之间的 DOM 读写对本引擎的其他逻辑是原子的，
//! 但页面脚本可能随时改动 DOM——所以注册表的写路径必须容忍节点
//! 失效。同一时刻只允许一个翻译任务：并发的启动请求直接拒绝，
//! 不排队。

use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use markup5ever_rcdom::Handle;
use tokio::sync::Notify;
use tokio::time::{sleep, Duration, Instant};

use crate::config::{constants, EngineConfig};
use crate::dom::detect_document_language;
use crate::error::{TranslateError, TranslateResult};
use crate::extractor::{QueueItem, TextExtractor};
use crate::layout::Layout;
use crate::queue::{
    apply_response, batch_failed, call_with_retry, BatchOutcome, EngineStats, PendingQueue,
};
use crate::registry::NodeRegistry;
use crate::status::StatusSink;
use crate::toggle::{self, PageFlags, ToggleOutcome};
use crate::translator::{Translation, Translator};

/// 翻译任务运行状态
///
/// 状态机：`Idle → Extracting → Translating → (Cancelled | Completed) → Idle`。
/// 用枚举而不是布尔标记，让"既在提取又在翻译"这类非法状态无法表示。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Extracting,
    Translating,
    Cancelled,
    Completed,
}

impl RunState {
    /// 是否有任务在进行中
    pub fn is_active(self) -> bool {
        matches!(self, RunState::Extracting | RunState::Translating)
    }
}

/// 一次翻译任务的结果摘要
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSummary {
    pub total: usize,
    pub applied: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl RunSummary {
    /// 完成百分比（按已尝试条目计，上限 100）
    pub fn percent(&self) -> u32 {
        if self.total == 0 {
            return 100;
        }
        (((self.applied + self.failed) * 100 + self.total / 2) / self.total).min(100) as u32
    }
}

/// 会话内部状态
pub(crate) struct SessionInner {
    pub(crate) document: Handle,
    pub(crate) registry: NodeRegistry,
    pub(crate) queue: PendingQueue,
    pub(crate) extractor: TextExtractor,
    pub(crate) flags: PageFlags,
    pub(crate) run_state: RunState,
    pub(crate) cancel_requested: bool,
    pub(crate) needs_reprioritize: bool,
    pub(crate) target_lang: String,
    pub(crate) source_lang: String,
    pub(crate) stats: EngineStats,
    // 新内容监视状态
    pub(crate) auto_translate_enabled: bool,
    pub(crate) mutation_buffer: Vec<Handle>,
    pub(crate) last_mutation: Option<Instant>,
    /// 最近一次原始滚动事件的时间戳
    pub(crate) last_scroll: Option<Instant>,
}

/// 翻译会话
///
/// 克隆是浅拷贝（共享同一内部状态），便于把同一个会话同时交给
/// 控制消息处理器与新内容监视任务。内部借用绝不跨越悬挂点。
#[derive(Clone)]
pub struct TranslationSession {
    inner: Rc<RefCell<SessionInner>>,
    pub(crate) translator: Rc<dyn Translator>,
    pub(crate) layout: Rc<dyn Layout>,
    pub(crate) status: Rc<dyn StatusSink>,
    pub(crate) config: EngineConfig,
    pub(crate) mutation_wake: Rc<Notify>,
}

impl TranslationSession {
    /// 创建会话
    pub fn new(
        document: Handle,
        translator: Rc<dyn Translator>,
        layout: Rc<dyn Layout>,
        status: Rc<dyn StatusSink>,
        config: EngineConfig,
    ) -> TranslateResult<Self> {
        config.validate()?;

        let collect_attributes = config.collect_attributes;
        Ok(Self {
            inner: Rc::new(RefCell::new(SessionInner {
                document,
                registry: NodeRegistry::new(),
                queue: PendingQueue::new(),
                extractor: TextExtractor::new(collect_attributes),
                flags: PageFlags::default(),
                run_state: RunState::Idle,
                cancel_requested: false,
                needs_reprioritize: false,
                target_lang: String::new(),
                source_lang: "auto".to_string(),
                stats: EngineStats::default(),
                auto_translate_enabled: false,
                mutation_buffer: Vec::new(),
                last_mutation: None,
                last_scroll: None,
            })),
            translator,
            layout,
            status,
            config,
            mutation_wake: Rc::new(Notify::new()),
        })
    }

    pub(crate) fn inner_mut(&self) -> RefMut<'_, SessionInner> {
        self.inner.borrow_mut()
    }

    /// 启动整页翻译的同步阶段：状态守卫、提取、入队
    ///
    /// 成功返回提取到的条目数，之后由 [`drive`](Self::drive) 驱动
    /// 异步的批次派发。已有任务在运行时返回 [`TranslateError::Busy`]，
    /// 请求不会排队。
    pub fn begin_full_translation(
        &self,
        target_lang: &str,
        source_lang: &str,
    ) -> TranslateResult<usize> {
        let mut inner = self.inner_mut();

        if inner.run_state.is_active() {
            return Err(TranslateError::Busy);
        }

        inner.run_state = RunState::Extracting;
        inner.cancel_requested = false;
        inner.needs_reprioritize = false;
        inner.last_scroll = None;
        inner.target_lang = target_lang.to_string();
        inner.source_lang = source_lang.to_string();
        inner.stats.reset();

        let document = inner.document.clone();
        let inner_ref = &mut *inner;
        let items = inner_ref.extractor.extract(
            &document,
            &mut inner_ref.registry,
            self.layout.as_ref(),
            false,
        );

        if items.is_empty() {
            inner.run_state = RunState::Idle;
            return Err(TranslateError::NoTranslatableText);
        }

        let total = items.len();
        inner.queue.seed(items);
        inner.run_state = RunState::Translating;
        inner.flags.showing_translated = false;

        tracing::debug!(total, target_lang, "整页翻译已启动");
        Ok(total)
    }

    /// 驱动排空循环直到队列清空或任务被取消
    ///
    /// 每次派发之间检查取消标记并按需重排队列；在途批次不受
    /// 这两者影响。
    pub async fn drive(&self) -> RunSummary {
        // 只接受已完成启动阶段的任务
        if self.inner.borrow().run_state != RunState::Translating {
            return RunSummary::default();
        }

        let total = self.inner_mut().queue.len();
        let mut summary = RunSummary {
            total,
            ..Default::default()
        };
        let mut failed: Vec<QueueItem> = Vec::new();
        let mut attempted = 0;

        // 主排空循环
        loop {
            let batch = {
                let mut inner = self.inner_mut();

                if inner.cancel_requested {
                    inner.queue.clear();
                    summary.cancelled = true;
                    break;
                }

                // 原始滚动信号沉淀满防抖窗口后视为稳定
                if let Some(at) = inner.last_scroll {
                    if at.elapsed() >= Duration::from_millis(constants::SCROLL_DEBOUNCE_MS) {
                        inner.last_scroll = None;
                        inner.needs_reprioritize = true;
                    }
                }

                if inner.needs_reprioritize {
                    inner.needs_reprioritize = false;
                    let inner_ref = &mut *inner;
                    inner_ref
                        .queue
                        .reprioritize(&inner_ref.registry, self.layout.as_ref());
                    tracing::debug!(pending = inner_ref.queue.len(), "队列已按新视口重排");
                }

                inner.queue.pop_batch(self.config.batch_size)
            };

            if batch.is_empty() {
                break;
            }

            attempted += batch.len();
            let outcome = self.dispatch_batch(&batch, self.config.max_batch_retries).await;
            summary.applied += outcome.applied;
            failed.extend(outcome.failed);

            self.report_progress(attempted, total).await;
        }

        // 失败条目的补偿重试：更小的批次、单次尝试、轮间退避
        if !summary.cancelled && !failed.is_empty() {
            failed = self.retry_failed(failed, &mut summary).await;
        }

        summary.failed = failed.len();
        self.finish_run(&summary).await;
        summary
    }

    /// 便捷入口：启动并驱动一次整页翻译
    pub async fn translate_page(
        &self,
        target_lang: &str,
        source_lang: &str,
    ) -> TranslateResult<RunSummary> {
        match self.begin_full_translation(target_lang, source_lang) {
            Ok(_) => Ok(self.drive().await),
            Err(error) => {
                if matches!(error, TranslateError::NoTranslatableText) {
                    self.status.report("没有找到可翻译的文本", true).await;
                }
                crate::error::helpers::log_error(error)
            }
        }
    }

    /// 派发单个批次并应用结果
    async fn dispatch_batch(&self, batch: &[QueueItem], retries: usize) -> BatchOutcome {
        {
            let mut inner = self.inner_mut();
            inner.stats.batches_dispatched += 1;
            inner.stats.characters_sent +=
                batch.iter().map(|item| item.text.chars().count()).sum::<usize>();
        }

        let (target, source) = {
            let inner = self.inner.borrow();
            (inner.target_lang.clone(), inner.source_lang.clone())
        };

        let outcome = match call_with_retry(
            self.translator.as_ref(),
            batch,
            &target,
            &source,
            retries,
        )
        .await
        {
            Ok(response) => {
                let mut inner = self.inner_mut();
                apply_response(&mut inner.registry, batch, &response)
            }
            Err(error) => {
                tracing::warn!("批次重试耗尽，{} 条全部标记失败: {}", batch.len(), error);
                batch_failed(batch)
            }
        };

        let mut inner = self.inner_mut();
        inner.stats.items_applied += outcome.applied;
        outcome
    }

    /// 失败条目的补偿重试轮次
    async fn retry_failed(
        &self,
        mut failed: Vec<QueueItem>,
        summary: &mut RunSummary,
    ) -> Vec<QueueItem> {
        for round in 1..=self.config.retry_rounds {
            if failed.is_empty() {
                break;
            }

            // 轮前退避
            sleep(Duration::from_millis(
                constants::BACKOFF_BASE_MS * round as u64,
            ))
            .await;

            if self.inner.borrow().cancel_requested {
                summary.cancelled = true;
                break;
            }

            tracing::debug!(round, remaining = failed.len(), "失败条目补偿重试");
            self.inner_mut().stats.retry_rounds_run += 1;

            let mut still_failed = Vec::new();
            let mut chunks = failed.chunks(self.config.retry_batch_size);
            for chunk in &mut chunks {
                if self.inner.borrow().cancel_requested {
                    summary.cancelled = true;
                    still_failed.extend(chunk.iter().cloned());
                    break;
                }

                // 单次尝试，不再嵌套退避
                let outcome = self.dispatch_batch(chunk, 1).await;
                summary.applied += outcome.applied;
                still_failed.extend(outcome.failed);
            }
            for chunk in chunks {
                still_failed.extend(chunk.iter().cloned());
            }

            failed = still_failed;

            if summary.cancelled {
                break;
            }
        }

        failed
    }

    /// 收尾：状态机归位、页面标记与用户可见摘要
    async fn finish_run(&self, summary: &RunSummary) {
        {
            let mut inner = self.inner_mut();
            inner.stats.items_failed = summary.failed;

            if summary.cancelled {
                inner.run_state = RunState::Cancelled;
            } else {
                if summary.applied > 0 {
                    inner.flags.has_cache = true;
                    inner.flags.showing_translated = true;
                    // 新内容自动翻译只在显示译文时有意义
                    inner.auto_translate_enabled = true;
                }
                inner.run_state = RunState::Completed;
            }
        }

        if summary.cancelled {
            self.status.report("翻译已取消", false).await;
        } else if summary.applied == 0 {
            self.status.report("翻译失败：没有条目成功应用", true).await;
        } else {
            let message = if summary.failed > 0 {
                format!(
                    "已翻译 {}/{} ({}%)，失败 {} 条",
                    summary.applied,
                    summary.total,
                    summary.percent(),
                    summary.failed
                )
            } else {
                format!(
                    "已翻译 {}/{} ({}%)",
                    summary.applied,
                    summary.total,
                    summary.percent()
                )
            };
            self.status.report(&message, false).await;
        }

        self.inner_mut().run_state = RunState::Idle;
        self.status.hide().await;
    }

    /// 上报进度：round(100 × 已尝试 / 总数)，上限 100
    async fn report_progress(&self, attempted: usize, total: usize) {
        if total == 0 {
            return;
        }
        let percent = ((attempted * 100 + total / 2) / total).min(100);
        self.status
            .report(&format!("翻译中… {}%", percent), false)
            .await;
    }

    /// 请求取消当前任务
    ///
    /// 协作式取消：在途的批次会执行完毕，之后不再派发新批次，
    /// 待翻译队列被清空。没有任务在运行时是 no-op。
    pub fn cancel(&self) {
        let mut inner = self.inner_mut();
        if inner.run_state.is_active() {
            inner.cancel_requested = true;
            tracing::debug!("已请求取消翻译任务");
        }
    }

    /// 视口滚动稳定信号
    ///
    /// 宿主在滚动停止（约 100ms 防抖）后调用；队列中尚未派发的
    /// 条目会在下一次批次派发前重算优先级并重排。
    pub fn scroll_settled(&self) {
        self.inner_mut().needs_reprioritize = true;
    }

    /// 原始滚动事件信号（引擎侧防抖）
    ///
    /// 没有自己防抖逻辑的宿主可以把每个滚动事件直接喂进来，
    /// 引擎在批次边界上等信号沉淀满防抖窗口后再重排。
    pub fn notify_scroll(&self) {
        self.inner_mut().last_scroll = Some(Instant::now());
    }

    /// 在原文与译文之间切换
    ///
    /// 切回原文时同时停止新内容自动翻译。
    pub fn toggle_display(&self) -> ToggleOutcome {
        let mut inner = self.inner_mut();
        let inner_ref = &mut *inner;
        let outcome = toggle::toggle(&mut inner_ref.registry, &mut inner_ref.flags);

        if outcome.changed && !inner_ref.flags.showing_translated {
            inner_ref.auto_translate_enabled = false;
            inner_ref.mutation_buffer.clear();
        }

        outcome
    }

    /// 无条件还原原文，缓存保留
    pub fn restore_original(&self) -> (usize, bool) {
        let mut inner = self.inner_mut();
        let inner_ref = &mut *inner;
        let restored = toggle::restore_original(&mut inner_ref.registry, &mut inner_ref.flags);
        inner_ref.auto_translate_enabled = false;
        inner_ref.mutation_buffer.clear();
        (restored, inner_ref.flags.has_cache)
    }

    /// 还原原文并拆除会话状态
    ///
    /// 清空注册表与队列、停止监视、重置页面标记。会话之后仍可
    /// 重新开始整页翻译（新纪元）。
    pub fn restore_and_stop(&self) -> usize {
        let mut inner = self.inner_mut();
        let inner_ref = &mut *inner;
        let restored = toggle::restore_original(&mut inner_ref.registry, &mut inner_ref.flags);

        inner_ref.cancel_requested = true;
        inner_ref.queue.clear();
        inner_ref.registry.clear();
        inner_ref.flags = PageFlags::default();
        inner_ref.auto_translate_enabled = false;
        inner_ref.mutation_buffer.clear();
        inner_ref.last_mutation = None;
        inner_ref.last_scroll = None;

        restored
    }

    /// 应用一批外部提供的译文（流式/预计算结果）
    ///
    /// 逐条经注册表写入，返回成功应用的数量。
    pub fn apply_partial(&self, translations: &[Translation]) -> usize {
        let mut inner = self.inner_mut();
        let mut applied = 0;

        for translation in translations {
            if translation.error.is_some() || translation.text.is_empty() {
                continue;
            }
            if inner.registry.apply_translation(translation.id, &translation.text) {
                applied += 1;
            }
        }

        if applied > 0 {
            inner.flags.has_cache = true;
            inner.flags.showing_translated = true;
        }

        tracing::debug!(applied, total = translations.len(), "外部译文已应用");
        applied
    }

    /// 启用/停用新内容自动翻译
    pub fn set_auto_translate(&self, enabled: bool) -> bool {
        let mut inner = self.inner_mut();
        inner.auto_translate_enabled = enabled;
        if !enabled {
            inner.mutation_buffer.clear();
            inner.last_mutation = None;
        }
        drop(inner);

        if enabled {
            self.mutation_wake.notify_waiters();
        }
        enabled
    }

    /// 当前运行状态
    pub fn run_state(&self) -> RunState {
        self.inner.borrow().run_state
    }

    /// 是否有翻译任务在进行
    pub fn is_translating(&self) -> bool {
        self.inner.borrow().run_state.is_active()
    }

    /// 新内容自动翻译是否开启
    pub fn is_auto_translating(&self) -> bool {
        self.inner.borrow().auto_translate_enabled
    }

    /// 页面标记快照
    pub fn flags(&self) -> PageFlags {
        self.inner.borrow().flags
    }

    /// 待翻译队列中剩余的条目数
    pub fn pending_count(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    /// 引擎统计快照
    pub fn stats(&self) -> EngineStats {
        self.inner.borrow().stats.clone()
    }

    /// 检测页面语言（基础语言标签，小写、去地区后缀）
    pub fn detected_language(&self) -> String {
        let document = self.inner.borrow().document.clone();
        detect_document_language(&document)
    }
}
