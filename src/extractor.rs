//! 文本提取器模块
//!
//! 遍历 DOM 子树，挑出符合条件的文本节点与可翻译属性，在注册表
//! 中登记并按优先级降序产出工作列表。
//!
//! 两种模式：
//! - 整页模式：先清空注册表（开启新纪元），然后遍历整棵子树
//! - 增量模式：跳过已登记/已处理的单元，用于扫描新插入的内容
//!
//! 提取只写注册表，不触发任何翻译调用。

use markup5ever_rcdom::{Handle, NodeData};

use crate::config::constants;
use crate::dom::{containing_element, get_node_attr, get_node_name, parent_of, text_content};
use crate::filter::TextFilter;
use crate::layout::Layout;
use crate::registry::NodeRegistry;
use crate::scorer::{score_element, score_text_node};

/// 队列条目：一个待翻译单元
///
/// `priority` 可变——滚动后会就地重算再整体重排。
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub id: usize,
    pub text: String,
    pub priority: i64,
}

/// 提取统计信息
#[derive(Debug, Clone, Default)]
pub struct ExtractionStats {
    pub nodes_visited: usize,
    pub nodes_skipped: usize,
    pub text_nodes_found: usize,
    pub eligible_texts: usize,
    pub eligible_attributes: usize,
    pub filtered_texts: usize,
}

impl ExtractionStats {
    pub fn reset(&mut self) {
        *self = Default::default();
    }
}

/// DOM 文本提取器
pub struct TextExtractor {
    filter: TextFilter,
    collect_attributes: bool,
    stats: ExtractionStats,
}

impl TextExtractor {
    pub fn new(collect_attributes: bool) -> Self {
        Self {
            filter: TextFilter::new(),
            collect_attributes,
            stats: ExtractionStats::default(),
        }
    }

    /// 提取子树中的可翻译单元
    ///
    /// 返回按优先级降序排序的工作列表（排序稳定，同分保持
    /// 文档顺序）。`only_new` 为 false 时先清空注册表。
    pub fn extract(
        &mut self,
        root: &Handle,
        registry: &mut NodeRegistry,
        layout: &dyn Layout,
        only_new: bool,
    ) -> Vec<QueueItem> {
        if !only_new {
            registry.clear();
        }
        self.stats.reset();

        let mut items = Vec::new();
        self.walk(root, registry, layout, only_new, &mut items);

        items.sort_by(|a, b| b.priority.cmp(&a.priority));

        tracing::debug!(
            visited = self.stats.nodes_visited,
            eligible = items.len(),
            filtered = self.stats.filtered_texts,
            only_new,
            "文本提取完成"
        );

        items
    }

    /// 评估一个新插入的节点
    ///
    /// 插入的是元素时按子树做增量提取；插入的是孤立文本节点时
    /// 直接评估，不做子树遍历。两种情况都先验证祖先链没有落在
    /// 被排除的区域里。
    pub fn extract_inserted(
        &mut self,
        node: &Handle,
        registry: &mut NodeRegistry,
        layout: &dyn Layout,
    ) -> Vec<QueueItem> {
        if !self.ancestors_allowed(node, layout) {
            return Vec::new();
        }

        match node.data {
            NodeData::Text { .. } => {
                let mut items = Vec::new();
                self.visit_text_node(node, registry, layout, true, &mut items);
                items
            }
            NodeData::Element { .. } => self.extract(node, registry, layout, true),
            _ => Vec::new(),
        }
    }

    pub fn stats(&self) -> &ExtractionStats {
        &self.stats
    }

    /// 递归遍历
    fn walk(
        &mut self,
        node: &Handle,
        registry: &mut NodeRegistry,
        layout: &dyn Layout,
        only_new: bool,
        items: &mut Vec<QueueItem>,
    ) {
        self.stats.nodes_visited += 1;

        match node.data {
            NodeData::Text { .. } => {
                self.visit_text_node(node, registry, layout, only_new, items);
            }
            NodeData::Element { .. } => {
                if !self.element_allowed(node, layout) {
                    self.stats.nodes_skipped += 1;
                    return;
                }

                if self.collect_attributes {
                    self.visit_element_attributes(node, registry, layout, only_new, items);
                }

                for child in node.children.borrow().iter() {
                    self.walk(child, registry, layout, only_new, items);
                }
            }
            _ => {
                for child in node.children.borrow().iter() {
                    self.walk(child, registry, layout, only_new, items);
                }
            }
        }
    }

    /// 评估单个文本节点
    fn visit_text_node(
        &mut self,
        node: &Handle,
        registry: &mut NodeRegistry,
        layout: &dyn Layout,
        only_new: bool,
        items: &mut Vec<QueueItem>,
    ) {
        self.stats.text_nodes_found += 1;

        let original = match text_content(node) {
            Some(text) => text,
            None => return,
        };

        if !self.filter.should_translate(&original) {
            self.stats.filtered_texts += 1;
            return;
        }

        if only_new && registry.is_known(node, None) {
            return;
        }

        let trimmed = original.trim().to_string();
        let priority = score_text_node(node, &trimmed, layout);
        let id = registry.register(node, None, original);

        self.stats.eligible_texts += 1;
        items.push(QueueItem {
            id,
            text: trimmed,
            priority,
        });
    }

    /// 收集元素上的可翻译属性
    fn visit_element_attributes(
        &mut self,
        element: &Handle,
        registry: &mut NodeRegistry,
        layout: &dyn Layout,
        only_new: bool,
        items: &mut Vec<QueueItem>,
    ) {
        for &attr_name in constants::TRANSLATABLE_ATTRS {
            let value = match get_node_attr(element, attr_name) {
                Some(value) => value,
                None => continue,
            };

            if !self.filter.should_translate(&value) {
                continue;
            }

            if only_new && registry.is_known(element, Some(attr_name)) {
                continue;
            }

            let trimmed = value.trim().to_string();
            let priority = score_element(element, &trimmed, layout);
            let id = registry.register(element, Some(attr_name.to_string()), value);

            self.stats.eligible_attributes += 1;
            items.push(QueueItem {
                id,
                text: trimmed,
                priority,
            });
        }
    }

    /// 元素本身是否允许进入
    ///
    /// 拒绝即整棵子树剪枝：脚本/样式/代码/表单控件/嵌入媒体、
    /// 可编辑区域、显式标记不翻译的区域、引擎自身的状态指示
    /// 元素，以及计算样式不可见的元素。
    fn element_allowed(&self, element: &Handle, layout: &dyn Layout) -> bool {
        let tag = match get_node_name(element) {
            Some(tag) => tag,
            None => return true,
        };

        if constants::SKIP_ELEMENTS.contains(&tag) {
            return false;
        }

        if let Some(editable) = get_node_attr(element, "contenteditable") {
            if editable.is_empty() || editable.eq_ignore_ascii_case("true") {
                return false;
            }
        }

        // 显式退出标记
        if let Some(translate) = get_node_attr(element, "translate") {
            if translate.eq_ignore_ascii_case("no") {
                return false;
            }
        }
        if let Some(class) = get_node_attr(element, "class") {
            if class.split_whitespace().any(|c| c == "notranslate") {
                return false;
            }
        }

        if let Some(id) = get_node_attr(element, "id") {
            if id == constants::STATUS_ELEMENT_ID {
                return false;
            }
        }

        if !layout.is_displayed(element) {
            return false;
        }

        true
    }

    /// 自下而上验证祖先链
    fn ancestors_allowed(&self, node: &Handle, layout: &dyn Layout) -> bool {
        let mut current = match node.data {
            NodeData::Element { .. } => Some(node.clone()),
            _ => containing_element(node),
        };

        while let Some(element) = current {
            if !self.element_allowed(&element, layout) {
                return false;
            }
            current = parent_of(&element);
        }

        true
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new(true)
    }
}
