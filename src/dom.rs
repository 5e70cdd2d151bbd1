//! DOM 访问辅助模块
//!
//! 基于 markup5ever_rcdom 提供节点读写、父链回溯与挂载状态检查。
//! 注册表只持有弱引用，所有写路径都要先经过这里的挂载检查。

use std::rc::Weak;

use encoding_rs::Encoding;
use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom};

/// 将 HTML 字节转换为 DOM
pub fn html_to_dom(data: &[u8], document_encoding: String) -> RcDom {
    let s: String;

    if let Some(encoding) = Encoding::for_label(document_encoding.as_bytes()) {
        let (string, _, _) = encoding.decode(data);
        s = string.to_string();
    } else {
        s = String::from_utf8_lossy(data).to_string();
    }

    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut s.as_bytes())
        .unwrap_or_else(|_| parse_document(RcDom::default(), Default::default()).one(""))
}

/// 获取节点属性值
pub fn get_node_attr(node: &Handle, attr_name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => {
            for attr in attrs.borrow().iter() {
                if &*attr.name.local == attr_name {
                    return Some(attr.value.to_string());
                }
            }
            None
        }
        _ => None,
    }
}

/// 设置节点属性
pub fn set_node_attr(node: &Handle, attr_name: &str, attr_value: Option<String>) {
    use html5ever::interface::{Attribute, QualName};
    use html5ever::tendril::format_tendril;
    use html5ever::{namespace_url, ns, LocalName};

    if let NodeData::Element { attrs, .. } = &node.data {
        let attrs_mut = &mut attrs.borrow_mut();
        let mut i = 0;
        let mut found_existing_attr: bool = false;

        while i < attrs_mut.len() {
            if &attrs_mut[i].name.local == attr_name {
                found_existing_attr = true;

                if let Some(attr_value) = attr_value.clone() {
                    let _ = &attrs_mut[i].value.clear();
                    let _ = &attrs_mut[i].value.push_slice(attr_value.as_str());
                } else {
                    // 值为空时整体移除属性
                    attrs_mut.remove(i);
                    continue;
                }
            }

            i += 1;
        }

        if !found_existing_attr {
            if let Some(attr_value) = attr_value.clone() {
                let name = LocalName::from(attr_name);

                attrs_mut.push(Attribute {
                    name: QualName::new(None, ns!(), name),
                    value: format_tendril!("{}", attr_value),
                });
            }
        }
    };
}

/// 获取元素节点的标签名
pub fn get_node_name(node: &Handle) -> Option<&'_ str> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

/// 获取父节点
///
/// rcdom 的 parent 是 `Cell<Option<Weak>>`，读取后必须放回，
/// 否则节点会永久失去父链。
pub fn parent_of(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take();
    let parent = weak.as_ref().and_then(|w| w.upgrade());
    node.parent.set(weak);
    parent
}

/// 获取文本节点最近的祖先元素
pub fn containing_element(node: &Handle) -> Option<Handle> {
    let mut current = parent_of(node);
    while let Some(ancestor) = current {
        if matches!(ancestor.data, NodeData::Element { .. }) {
            return Some(ancestor);
        }
        current = parent_of(&ancestor);
    }
    None
}

/// 检查节点是否仍挂载在文档树上
///
/// 从节点沿父链回溯到 Document 根；链路中断（被页面脚本移除）
/// 视为已脱离。
pub fn is_attached(node: &Handle) -> bool {
    if matches!(node.data, NodeData::Document) {
        return true;
    }

    let mut current = node.clone();
    // 防御环状父链，限制回溯深度
    for _ in 0..512 {
        match parent_of(&current) {
            Some(parent) => {
                if matches!(parent.data, NodeData::Document) {
                    return true;
                }
                current = parent;
            }
            None => return false,
        }
    }

    false
}

/// 节点身份键（指针地址），用于已处理集合与去重
pub fn node_key(node: &Handle) -> usize {
    std::rc::Rc::as_ptr(node) as *const Node as usize
}

/// 对节点取弱引用
pub fn downgrade(node: &Handle) -> Weak<Node> {
    std::rc::Rc::downgrade(node)
}

/// 读取文本节点的当前内容
pub fn text_content(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Text { contents } => Some(contents.borrow().to_string()),
        _ => None,
    }
}

/// 覆写文本节点内容
///
/// 非文本节点静默忽略，返回 false。
pub fn set_text_content(node: &Handle, text: &str) -> bool {
    match &node.data {
        NodeData::Text { contents } => {
            let mut contents = contents.borrow_mut();
            *contents = text.into();
            true
        }
        _ => false,
    }
}

/// 查找文档的 `<html>` 元素
pub fn document_element(document: &Handle) -> Option<Handle> {
    document
        .children
        .borrow()
        .iter()
        .find(|child| get_node_name(child) == Some("html"))
        .cloned()
}

/// 检测文档语言
///
/// 依次读取 `<html lang>` 与 `<meta http-equiv="content-language">`，
/// 小写化并去掉地区后缀（`en-US` → `en`）；没有任何声明时返回 "auto"。
pub fn detect_document_language(document: &Handle) -> String {
    if let Some(html) = document_element(document) {
        if let Some(lang) = get_node_attr(&html, "lang") {
            if let Some(base) = base_language_tag(&lang) {
                return base;
            }
        }

        if let Some(meta_lang) = find_content_language_meta(&html) {
            if let Some(base) = base_language_tag(&meta_lang) {
                return base;
            }
        }
    }

    "auto".to_string()
}

/// 提取语言标签的基础子标签
fn base_language_tag(raw: &str) -> Option<String> {
    let base = raw.trim().split(['-', '_']).next().unwrap_or("");
    if base.is_empty() {
        None
    } else {
        Some(base.to_lowercase())
    }
}

/// 在文档中查找 content-language meta 声明
fn find_content_language_meta(node: &Handle) -> Option<String> {
    if get_node_name(node) == Some("meta") {
        let http_equiv = get_node_attr(node, "http-equiv")?;
        if http_equiv.eq_ignore_ascii_case("content-language") {
            return get_node_attr(node, "content");
        }
    }

    for child in node.children.borrow().iter() {
        if let Some(found) = find_content_language_meta(child) {
            return Some(found);
        }
    }

    None
}
