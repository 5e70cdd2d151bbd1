//! 翻译优先级评分模块
//!
//! 对每个候选文本位置给出一个非负分数，决定它在翻译队列中的先后。
//! 评分是关于当前 DOM 与布局状态的纯函数：每次调用都重新读取几何
//! 与祖先语义，不做任何跨调用缓存（滚动会让几何失效）。
//!
//! ## 评分构成（累加）
//!
//! 1. 视口命中：元素与当前视口相交 +10000，其中位于视口上半部再 +200
//! 2. 文本长度分档：越长的正文片段越值得先翻译，过短的标签文本降权
//! 3. 祖先语义：main/article 语义链加分，nav/footer 等边缘链减分
//! 4. 直接容器标签：段落、标题加分，按钮、表单标签减分
//! 5. 水平偏心惩罚：远离页面水平中线的内容多半是侧栏
//!
//! 单次评分最多读取一次元素包围盒；祖先回溯最多
//! [`constants::ANCESTOR_WALK_LIMIT`] 层。

use markup5ever_rcdom::Handle;

use crate::config::constants;
use crate::dom::{containing_element, get_node_attr, get_node_name, parent_of};
use crate::layout::Layout;

/// 视口相交基础分
const VIEWPORT_BONUS: i64 = 10_000;
/// 视口上半部附加分
const TOP_HALF_BONUS: i64 = 200;
/// 主内容语义链加分
const MAIN_CONTENT_BONUS: i64 = 500;
/// 主内容与边缘信号混合时的折中分
const MIXED_ANCESTRY_BONUS: i64 = 100;
/// 纯边缘语义链减分
const PERIPHERAL_PENALTY: i64 = -300;
/// 水平偏心减分
const OFF_CENTER_PENALTY: i64 = -100;
/// 偏心判定阈值：与页面水平中线的距离超过视口宽度的该比例
const OFF_CENTER_RATIO: f64 = 0.35;

/// 对文本节点评分
///
/// 几何项取该文本节点的最近祖先元素；没有祖先元素
/// （游离文本）时只计长度项。
pub fn score_text_node(node: &Handle, text: &str, layout: &dyn Layout) -> i64 {
    match containing_element(node) {
        Some(element) => score_element(&element, text, layout),
        None => (length_score(text)).max(0),
    }
}

/// 对元素位置评分
///
/// 属性文本（title/alt 等）直接以所属元素评分；文本节点
/// 经 [`score_text_node`] 间接走到这里。
pub fn score_element(element: &Handle, text: &str, layout: &dyn Layout) -> i64 {
    let mut score: i64 = 0;

    let viewport = layout.viewport();
    let rect = layout.bounding_rect(element);

    // 1. 视口命中
    if let Some(rect) = rect {
        if rect.intersects(&viewport) {
            score += VIEWPORT_BONUS;
            if rect.center_y() < viewport.center_y() {
                score += TOP_HALF_BONUS;
            }
        }
    }

    // 2. 文本长度分档
    score += length_score(text);

    // 3. 祖先语义
    score += ancestry_score(element);

    // 4. 直接容器标签
    score += container_tag_score(element);

    // 5. 水平偏心惩罚
    if let Some(rect) = rect {
        let offset = (rect.center_x() - viewport.center_x()).abs();
        if offset > viewport.width * OFF_CENTER_RATIO {
            score += OFF_CENTER_PENALTY;
        }
    }

    score.max(0)
}

/// 文本长度分档
fn length_score(text: &str) -> i64 {
    let len = text.trim().chars().count();
    if len >= 200 {
        150
    } else if len >= 100 {
        100
    } else if len >= 50 {
        60
    } else if len >= 20 {
        30
    } else {
        -20
    }
}

/// 祖先语义判定
///
/// 自元素起向上回溯，逐层归类为主内容链或边缘链；两类信号
/// 都出现时按混合处理（嵌在正文里的小部件很常见）。
fn ancestry_score(element: &Handle) -> i64 {
    let mut saw_main = false;
    let mut saw_peripheral = false;

    let mut current = Some(element.clone());
    for _ in 0..constants::ANCESTOR_WALK_LIMIT {
        let node = match current {
            Some(node) => node,
            None => break,
        };

        match classify_ancestor(&node) {
            AncestorKind::MainContent => saw_main = true,
            AncestorKind::Peripheral => saw_peripheral = true,
            AncestorKind::Neutral => {}
        }

        current = parent_of(&node);
    }

    match (saw_main, saw_peripheral) {
        (true, false) => MAIN_CONTENT_BONUS,
        (true, true) => MIXED_ANCESTRY_BONUS,
        (false, true) => PERIPHERAL_PENALTY,
        (false, false) => 0,
    }
}

/// 祖先类别
enum AncestorKind {
    MainContent,
    Peripheral,
    Neutral,
}

/// 归类单个祖先
fn classify_ancestor(node: &Handle) -> AncestorKind {
    let tag = match get_node_name(node) {
        Some(tag) => tag,
        None => return AncestorKind::Neutral,
    };

    if matches!(tag, "main" | "article") {
        return AncestorKind::MainContent;
    }
    if matches!(tag, "nav" | "aside" | "footer" | "header") {
        return AncestorKind::Peripheral;
    }

    if let Some(role) = get_node_attr(node, "role") {
        let role = role.to_lowercase();
        if matches!(role.as_str(), "main" | "article") {
            return AncestorKind::MainContent;
        }
        if matches!(
            role.as_str(),
            "navigation" | "complementary" | "banner" | "contentinfo" | "menu" | "menubar"
        ) {
            return AncestorKind::Peripheral;
        }
    }

    // id/class 特征词
    let mut identity = get_node_attr(node, "id").unwrap_or_default();
    if let Some(class) = get_node_attr(node, "class") {
        identity.push(' ');
        identity.push_str(&class);
    }
    let identity = identity.to_lowercase();

    if !identity.is_empty() {
        if constants::MAIN_CONTENT_TOKENS
            .iter()
            .any(|token| identity.contains(token))
        {
            return AncestorKind::MainContent;
        }
        if constants::PERIPHERAL_TOKENS
            .iter()
            .any(|token| identity.contains(token))
        {
            return AncestorKind::Peripheral;
        }
    }

    AncestorKind::Neutral
}

/// 直接容器标签加减分
fn container_tag_score(element: &Handle) -> i64 {
    match get_node_name(element) {
        Some("p") => 80,
        Some("h1") => 70,
        Some("h2") => 64,
        Some("h3") => 58,
        Some("h4") => 52,
        Some("h5") => 46,
        Some("h6") => 40,
        Some("li") => 30,
        Some("blockquote") | Some("figcaption") => 25,
        Some("td") | Some("th") => 20,
        Some("span") | Some("div") => 5,
        Some("a") => -10,
        Some("label") => -30,
        Some("button") => -50,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use markup5ever_rcdom::{Handle, NodeData};

    use super::*;
    use crate::dom::{html_to_dom, node_key};
    use crate::layout::Rect;

    /// 固定几何的布局桩
    struct StubLayout {
        viewport: Rect,
        rects: HashMap<usize, Rect>,
    }

    impl StubLayout {
        fn new(viewport: Rect) -> Self {
            Self {
                viewport,
                rects: HashMap::new(),
            }
        }

        fn place(&mut self, element: &Handle, rect: Rect) {
            self.rects.insert(node_key(element), rect);
        }
    }

    impl Layout for StubLayout {
        fn viewport(&self) -> Rect {
            self.viewport
        }

        fn bounding_rect(&self, element: &Handle) -> Option<Rect> {
            self.rects.get(&node_key(element)).copied()
        }

        fn is_displayed(&self, _element: &Handle) -> bool {
            true
        }
    }

    fn find_first_text(node: &Handle, needle: &str) -> Option<Handle> {
        if let NodeData::Text { contents } = &node.data {
            if contents.borrow().contains(needle) {
                return Some(node.clone());
            }
        }
        for child in node.children.borrow().iter() {
            if let Some(found) = find_first_text(child, needle) {
                return Some(found);
            }
        }
        None
    }

    #[test]
    fn test_main_paragraph_outranks_nav_label() {
        let html = r#"<html><body>
            <main><p>A long enough paragraph of body text that clearly belongs to the article and deserves early translation.</p></main>
            <nav><a>Home</a></nav>
        </body></html>"#;
        let dom = html_to_dom(html.as_bytes(), "utf-8".to_string());

        let paragraph_text = find_first_text(&dom.document, "paragraph").unwrap();
        let nav_text = find_first_text(&dom.document, "Home").unwrap();

        let mut layout = StubLayout::new(Rect::new(0.0, 0.0, 1000.0, 800.0));
        let paragraph = containing_element(&paragraph_text).unwrap();
        layout.place(&paragraph, Rect::new(200.0, 100.0, 600.0, 80.0));
        // 导航在视口之外
        let nav_link = containing_element(&nav_text).unwrap();
        layout.place(&nav_link, Rect::new(0.0, 2000.0, 100.0, 20.0));

        let text = crate::dom::text_content(&paragraph_text).unwrap();
        let in_view = score_text_node(&paragraph_text, &text, &layout);
        let off_view = score_text_node(&nav_text, "Home", &layout);

        assert!(in_view > off_view);
        assert!(in_view >= VIEWPORT_BONUS);
        // 纯导航标签被语义减分压到 0
        assert_eq!(off_view, 0);
    }

    #[test]
    fn test_scores_are_never_negative() {
        let html = r#"<html><body><nav><button>x</button></nav></body></html>"#;
        let dom = html_to_dom(html.as_bytes(), "utf-8".to_string());
        let text = find_first_text(&dom.document, "x").unwrap();
        let layout = StubLayout::new(Rect::new(0.0, 0.0, 1000.0, 800.0));

        assert_eq!(score_text_node(&text, "x", &layout), 0);
    }

    #[test]
    fn test_top_half_bonus_applies() {
        let html = r#"<html><body><p>top</p><p>bottom</p></body></html>"#;
        let dom = html_to_dom(html.as_bytes(), "utf-8".to_string());
        let top_text = find_first_text(&dom.document, "top").unwrap();
        let bottom_text = find_first_text(&dom.document, "bottom").unwrap();

        let mut layout = StubLayout::new(Rect::new(0.0, 0.0, 1000.0, 800.0));
        layout.place(
            &containing_element(&top_text).unwrap(),
            Rect::new(400.0, 50.0, 200.0, 40.0),
        );
        layout.place(
            &containing_element(&bottom_text).unwrap(),
            Rect::new(400.0, 700.0, 200.0, 40.0),
        );

        let top_score = score_text_node(&top_text, "top", &layout);
        let bottom_score = score_text_node(&bottom_text, "bottom", &layout);

        assert_eq!(top_score - bottom_score, TOP_HALF_BONUS);
    }

    #[test]
    fn test_off_center_sidebar_penalised() {
        let html = r#"<html><body><div>centered text here today</div><div>sidebar text here today</div></body></html>"#;
        let dom = html_to_dom(html.as_bytes(), "utf-8".to_string());
        let center_text = find_first_text(&dom.document, "centered").unwrap();
        let side_text = find_first_text(&dom.document, "sidebar").unwrap();

        let mut layout = StubLayout::new(Rect::new(0.0, 0.0, 1000.0, 800.0));
        layout.place(
            &containing_element(&center_text).unwrap(),
            Rect::new(400.0, 100.0, 200.0, 40.0),
        );
        // 中心在 x=950，偏离中线 450 > 350
        layout.place(
            &containing_element(&side_text).unwrap(),
            Rect::new(900.0, 100.0, 100.0, 40.0),
        );

        let centered = score_text_node(&center_text, "centered text here today", &layout);
        let sided = score_text_node(&side_text, "sidebar text here today", &layout);

        assert_eq!(centered - sided, -OFF_CENTER_PENALTY);
    }
}
