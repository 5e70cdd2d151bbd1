//! 文本提取集成测试
//!
//! 覆盖提取器与注册表的纪元语义、id 唯一性与优先级排序

mod common;

use common::{HtmlTestHelper, SharedLayout};
use pageglot::extractor::TextExtractor;
use pageglot::layout::Rect;
use pageglot::registry::NodeRegistry;

/// 每次提取产出的 id 在纪元内唯一，且都能在注册表中解析回
/// 与条目文本一致的原文
#[test]
fn test_ids_unique_and_resolve_to_registry_text() {
    let dom = HtmlTestHelper::create_test_dom(&HtmlTestHelper::create_article_with_nav());
    let mut registry = NodeRegistry::new();
    let mut extractor = TextExtractor::new(true);
    let layout = SharedLayout::new();

    let items = extractor.extract(&dom.document, &mut registry, layout.as_ref(), false);
    assert!(!items.is_empty(), "页面应当有可翻译文本");

    let mut seen = std::collections::HashSet::new();
    for item in &items {
        assert!(seen.insert(item.id), "id {} 重复出现", item.id);

        let entry = registry.get(item.id).expect("id 必须能在注册表中解析");
        assert_eq!(entry.original_text().trim(), item.text);
        assert!(item.priority >= 0, "优先级必须非负");
    }
}

/// 整页提取开启新纪元：id 从零重新编号，旧条目全部清除
#[test]
fn test_full_extraction_clears_previous_epoch() {
    let dom = HtmlTestHelper::create_test_dom(&HtmlTestHelper::create_simple_english_page());
    let mut registry = NodeRegistry::new();
    let mut extractor = TextExtractor::new(true);
    let layout = SharedLayout::new();

    let first = extractor.extract(&dom.document, &mut registry, layout.as_ref(), false);
    let first_count = registry.len();

    let second = extractor.extract(&dom.document, &mut registry, layout.as_ref(), false);

    assert_eq!(registry.len(), first_count, "重新提取不应累积条目");
    assert_eq!(
        first.iter().map(|i| i.id).min(),
        second.iter().map(|i| i.id).min(),
        "新纪元的编号从同一起点开始"
    );
}

/// 增量提取只增长注册表，已处理集合不会缩小
#[test]
fn test_incremental_extraction_only_grows() {
    let dom = HtmlTestHelper::create_test_dom(&HtmlTestHelper::create_simple_english_page());
    let mut registry = NodeRegistry::new();
    let mut extractor = TextExtractor::new(true);
    let layout = SharedLayout::new();

    let items = extractor.extract(&dom.document, &mut registry, layout.as_ref(), false);
    let epoch_len = registry.len();

    // 应用一条译文，使其进入已处理集合
    assert!(registry.apply_translation(items[0].id, "第一条译文"));
    let heading = HtmlTestHelper::find_text_node(&dom.document, "Welcome").unwrap();
    let processed_before = registry.is_processed(&heading, None);

    // 对同一文档做增量提取：不产出新条目，不触碰已处理状态
    let incremental = extractor.extract(&dom.document, &mut registry, layout.as_ref(), true);
    assert!(incremental.is_empty());
    assert_eq!(registry.len(), epoch_len);
    assert_eq!(registry.is_processed(&heading, None), processed_before);

    // 新插入的子树带来新 id
    let inserted = HtmlTestHelper::create_test_dom("<div><p>Brand new paragraph text</p></div>");
    let inserted_root = HtmlTestHelper::find_element(&inserted.document, "div").unwrap();
    let fresh = extractor.extract_inserted(&inserted_root, &mut registry, layout.as_ref());

    assert_eq!(fresh.len(), 1);
    assert!(registry.len() > epoch_len);
}

/// 视口内主内容区的长段落必须严格高于视口外导航里的短标签
#[test]
fn test_main_paragraph_scores_above_nav_label() {
    let dom = HtmlTestHelper::create_test_dom(&HtmlTestHelper::create_article_with_nav());
    let layout = SharedLayout::new();

    // 段落在视口内，导航链接在视口外
    let paragraph_text = HtmlTestHelper::find_text_node(&dom.document, "long paragraph").unwrap();
    let paragraph = pageglot::dom::containing_element(&paragraph_text).unwrap();
    layout.place(&paragraph, Rect::new(200.0, 150.0, 600.0, 120.0));

    let nav_text = HtmlTestHelper::find_text_node(&dom.document, "Back to home").unwrap();
    let nav_link = pageglot::dom::containing_element(&nav_text).unwrap();
    layout.place(&nav_link, Rect::new(0.0, -100.0, 120.0, 24.0));

    let mut registry = NodeRegistry::new();
    let mut extractor = TextExtractor::new(true);
    let items = extractor.extract(&dom.document, &mut registry, layout.as_ref(), false);

    let paragraph_item = items.iter().find(|i| i.text.contains("long paragraph")).unwrap();
    let nav_item = items.iter().find(|i| i.text.contains("Back to home")).unwrap();

    assert!(
        paragraph_item.priority > nav_item.priority,
        "正文段落 ({}) 必须高于导航标签 ({})",
        paragraph_item.priority,
        nav_item.priority
    );
    // 工作列表整体降序
    assert_eq!(items[0].id, paragraph_item.id);
}

/// 计算样式不可见的子树整体跳过
#[test]
fn test_hidden_subtree_not_extracted() {
    let dom = HtmlTestHelper::create_test_dom(
        r#"<html><body>
            <div id="visible"><p>Shown paragraph text</p></div>
            <div id="ghost"><p>Hidden paragraph text</p></div>
        </body></html>"#,
    );
    let layout = SharedLayout::new();

    // 标记 ghost 容器为 display:none
    fn find_div_by_id(node: &markup5ever_rcdom::Handle, id: &str) -> Option<markup5ever_rcdom::Handle> {
        if pageglot::dom::get_node_attr(node, "id").as_deref() == Some(id) {
            return Some(node.clone());
        }
        for child in node.children.borrow().iter() {
            if let Some(found) = find_div_by_id(child, id) {
                return Some(found);
            }
        }
        None
    }
    let ghost = find_div_by_id(&dom.document, "ghost").unwrap();
    layout.hide(&ghost);

    let mut registry = NodeRegistry::new();
    let mut extractor = TextExtractor::new(true);
    let items = extractor.extract(&dom.document, &mut registry, layout.as_ref(), false);

    assert_eq!(items.len(), 1);
    assert!(items[0].text.contains("Shown"));
}
