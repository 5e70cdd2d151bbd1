#![allow(dead_code)]

// 集成测试公共模块
//
// 提供测试辅助工具和共享功能

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use async_trait::async_trait;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use pageglot::dom::{html_to_dom, node_key};
use pageglot::error::{TranslateError, TranslateResult};
use pageglot::layout::{Layout, Rect};
use pageglot::status::StatusSink;
use pageglot::translator::{TranslateItem, TranslateResponse, Translation, Translator};
use pageglot::{EngineConfig, TranslationSession};

/// HTML测试工具
pub struct HtmlTestHelper;

impl HtmlTestHelper {
    /// 创建测试用的DOM结构
    pub fn create_test_dom(html: &str) -> RcDom {
        html_to_dom(html.as_bytes(), "utf-8".to_string())
    }

    /// 简单英文页面：恰好三个可翻译文本节点
    pub fn create_simple_english_page() -> String {
        r#"<!DOCTYPE html>
<html lang="en">
<head><title>x</title><meta charset="UTF-8"></head>
<body>
    <h1>Welcome to the test page</h1>
    <p>This is the first paragraph of content.</p>
    <p>Here is another paragraph to translate.</p>
</body>
</html>"#
            .to_string()
    }

    /// 带主内容区和导航的页面
    pub fn create_article_with_nav() -> String {
        r#"<!DOCTYPE html>
<html lang="en">
<body>
    <nav><a href="/">Back to home</a></nav>
    <main>
        <article>
            <h2>Understanding incremental translation</h2>
            <p>A long paragraph of article body text that carries the substance of the page and should be translated before any navigation chrome around it.</p>
        </article>
    </main>
    <footer><span>All rights reserved</span></footer>
</body>
</html>"#
            .to_string()
    }

    /// 查找包含指定文本的文本节点
    pub fn find_text_node(node: &Handle, needle: &str) -> Option<Handle> {
        if let NodeData::Text { contents } = &node.data {
            if contents.borrow().contains(needle) {
                return Some(node.clone());
            }
        }
        for child in node.children.borrow().iter() {
            if let Some(found) = Self::find_text_node(child, needle) {
                return Some(found);
            }
        }
        None
    }

    /// 查找第一个指定标签的元素
    pub fn find_element(node: &Handle, tag: &str) -> Option<Handle> {
        if pageglot::dom::get_node_name(node) == Some(tag) {
            return Some(node.clone());
        }
        for child in node.children.borrow().iter() {
            if let Some(found) = Self::find_element(child, tag) {
                return Some(found);
            }
        }
        None
    }

    /// 收集子树的全部文本
    pub fn collect_text(node: &Handle, out: &mut String) {
        if let NodeData::Text { contents } = &node.data {
            out.push_str(&contents.borrow());
        }
        for child in node.children.borrow().iter() {
            Self::collect_text(child, out);
        }
    }
}

/// 可编排的翻译桩
///
/// 默认把每条文本译为 "译:<原文>"；可以注入传输失败、单条错误
/// 与缺失条目，并在每次调用时触发回调（用于模拟调用期间的滚动
/// 或取消）。
pub struct ScriptedTranslator {
    /// 每次调用收到的条目
    pub calls: RefCell<Vec<Vec<TranslateItem>>>,
    /// 响应中标记错误的 id
    pub fail_ids: RefCell<HashSet<usize>>,
    /// 响应中直接缺失的 id
    pub omit_ids: RefCell<HashSet<usize>>,
    /// 先以传输错误失败的次数
    pub transport_failures: RefCell<usize>,
    /// 每次调用的回调，参数是调用序号（从 1 起）
    pub on_call: RefCell<Option<Box<dyn FnMut(usize)>>>,
}

impl ScriptedTranslator {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            calls: RefCell::new(Vec::new()),
            fail_ids: RefCell::new(HashSet::new()),
            omit_ids: RefCell::new(HashSet::new()),
            transport_failures: RefCell::new(0),
            on_call: RefCell::new(None),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    /// 译文约定
    pub fn translated(text: &str) -> String {
        format!("译:{}", text)
    }
}

#[async_trait(?Send)]
impl Translator for ScriptedTranslator {
    async fn translate(
        &self,
        items: &[TranslateItem],
        _target_lang: &str,
        _source_lang: &str,
    ) -> TranslateResult<TranslateResponse> {
        self.calls.borrow_mut().push(items.to_vec());
        let call_index = self.calls.borrow().len();

        if let Some(hook) = self.on_call.borrow_mut().as_mut() {
            hook(call_index);
        }

        {
            let mut failures = self.transport_failures.borrow_mut();
            if *failures > 0 {
                *failures -= 1;
                return Err(TranslateError::Transport("连接被拒绝".to_string()));
            }
        }

        let fail_ids = self.fail_ids.borrow();
        let omit_ids = self.omit_ids.borrow();

        Ok(TranslateResponse {
            translations: items
                .iter()
                .filter(|item| !omit_ids.contains(&item.id))
                .map(|item| Translation {
                    id: item.id,
                    text: if fail_ids.contains(&item.id) {
                        String::new()
                    } else {
                        Self::translated(&item.text)
                    },
                    error: fail_ids
                        .contains(&item.id)
                        .then(|| "model error".to_string()),
                })
                .collect(),
        })
    }
}

/// 可变几何的布局桩
pub struct SharedLayout {
    viewport: RefCell<Rect>,
    rects: RefCell<HashMap<usize, Rect>>,
    hidden: RefCell<HashSet<usize>>,
}

impl SharedLayout {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            viewport: RefCell::new(Rect::new(0.0, 0.0, 1000.0, 800.0)),
            rects: RefCell::new(HashMap::new()),
            hidden: RefCell::new(HashSet::new()),
        })
    }

    /// 放置元素的包围盒
    pub fn place(&self, element: &Handle, rect: Rect) {
        self.rects.borrow_mut().insert(node_key(element), rect);
    }

    /// 标记元素为不可见
    pub fn hide(&self, element: &Handle) {
        self.hidden.borrow_mut().insert(node_key(element));
    }
}

impl Layout for SharedLayout {
    fn viewport(&self) -> Rect {
        *self.viewport.borrow()
    }

    fn bounding_rect(&self, element: &Handle) -> Option<Rect> {
        self.rects.borrow().get(&node_key(element)).copied()
    }

    fn is_displayed(&self, element: &Handle) -> bool {
        !self.hidden.borrow().contains(&node_key(element))
    }
}

/// 记录型状态通道
#[derive(Default)]
pub struct RecordingStatus {
    pub messages: RefCell<Vec<(String, bool)>>,
    pub hidden: RefCell<usize>,
}

#[async_trait(?Send)]
impl StatusSink for RecordingStatus {
    async fn report(&self, message: &str, is_error: bool) {
        self.messages
            .borrow_mut()
            .push((message.to_string(), is_error));
    }

    async fn hide(&self) {
        *self.hidden.borrow_mut() += 1;
    }
}

/// 测试环境
pub struct TestEnvironment {
    pub dom: RcDom,
    pub session: TranslationSession,
    pub translator: Rc<ScriptedTranslator>,
    pub layout: Rc<SharedLayout>,
    pub status: Rc<RecordingStatus>,
}

impl TestEnvironment {
    pub fn new(html: &str) -> Self {
        Self::with_config(html, EngineConfig::default())
    }

    pub fn with_config(html: &str, config: EngineConfig) -> Self {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let dom = HtmlTestHelper::create_test_dom(html);
        let translator = ScriptedTranslator::new();
        let layout = SharedLayout::new();
        let status = Rc::new(RecordingStatus::default());

        let session = TranslationSession::new(
            dom.document.clone(),
            translator.clone(),
            layout.clone(),
            status.clone(),
            config,
        )
        .expect("会话创建失败");

        Self {
            dom,
            session,
            translator,
            layout,
            status,
        }
    }

    /// 读取页面当前的全部文本
    pub fn page_text(&self) -> String {
        let mut out = String::new();
        HtmlTestHelper::collect_text(&self.dom.document, &mut out);
        out
    }
}
