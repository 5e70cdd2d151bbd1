//! 节点注册表模块
//!
//! 注册表是 id 到活动 DOM 节点的唯一权威映射，同时保存每个翻译
//! 单元的原文、缓存译文与已处理标记。节点只以弱引用持有：页面
//! 脚本可能随时把节点移出文档，所有写路径都必须先做挂载检查，
//! 单个节点失效不能中断其余节点的处理。

use std::collections::{HashMap, HashSet};
use std::rc::Weak;

use markup5ever_rcdom::{Handle, Node};

use crate::dom::{downgrade, is_attached, node_key, set_node_attr, set_text_content};

/// 单元身份键：节点指针 + 可选属性名
type UnitKey = (usize, Option<String>);

/// 一个翻译单元
///
/// `attr` 为空时单元指向文本节点本身；否则指向元素的某个
/// 可翻译属性（title/alt 等）。
#[derive(Debug)]
pub struct NodeEntry {
    /// 对活动节点的弱引用
    node: Weak<Node>,
    /// 属性单元的属性名
    attr: Option<String>,
    /// 提取时刻的原文，文本单元含首尾空白
    original_text: String,
    /// 成功应用过的译文（去除空白修饰）
    translated_text: Option<String>,
    /// 是否持有译文——与当前是否正在显示译文无关
    is_translated: bool,
}

impl NodeEntry {
    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn translated_text(&self) -> Option<&str> {
        self.translated_text.as_deref()
    }

    pub fn is_translated(&self) -> bool {
        self.is_translated
    }

    pub fn attr(&self) -> Option<&str> {
        self.attr.as_deref()
    }

    /// 升级弱引用；节点已被回收时返回 None
    pub fn upgrade(&self) -> Option<Handle> {
        self.node.upgrade()
    }
}

/// 节点注册表
///
/// 一次整页提取构成一个纪元：`clear` 清空映射并把 id 计数归零，
/// 增量提取在现有纪元上追加新 id。
#[derive(Debug, Default)]
pub struct NodeRegistry {
    entries: HashMap<usize, NodeEntry>,
    /// 已处理（已应用过译文）的单元
    processed: HashSet<UnitKey>,
    /// 当前纪元内已注册的单元，防止重复登记
    registered: HashSet<UnitKey>,
    next_id: usize,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 开启新纪元：清空所有条目并重置 id 计数
    pub fn clear(&mut self) {
        self.entries.clear();
        self.processed.clear();
        self.registered.clear();
        self.next_id = 0;
    }

    /// 登记一个翻译单元，返回分配的 id
    ///
    /// id 在纪元内单调递增且唯一。
    pub fn register(&mut self, node: &Handle, attr: Option<String>, original_text: String) -> usize {
        let id = self.next_id;
        self.next_id += 1;

        self.registered.insert((node_key(node), attr.clone()));
        self.entries.insert(
            id,
            NodeEntry {
                node: downgrade(node),
                attr,
                original_text,
                translated_text: None,
                is_translated: false,
            },
        );

        id
    }

    pub fn get(&self, id: usize) -> Option<&NodeEntry> {
        self.entries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 单元是否已处理（已应用译文且未被还原）
    pub fn is_processed(&self, node: &Handle, attr: Option<&str>) -> bool {
        self.processed
            .contains(&(node_key(node), attr.map(|s| s.to_string())))
    }

    /// 单元是否已登记或已处理，增量提取据此跳过
    pub fn is_known(&self, node: &Handle, attr: Option<&str>) -> bool {
        let key = (node_key(node), attr.map(|s| s.to_string()));
        self.registered.contains(&key) || self.processed.contains(&key)
    }

    /// 升级并验证某条目的节点引用
    pub fn live_node(&self, id: usize) -> Option<Handle> {
        let entry = self.entries.get(&id)?;
        let node = entry.node.upgrade()?;
        if is_attached(&node) {
            Some(node)
        } else {
            None
        }
    }

    /// 应用一条译文
    ///
    /// 文本单元会保留原文的首尾空白；属性单元直接覆写属性值。
    /// 节点已脱离文档时记录日志并返回 false，不影响其他条目。
    pub fn apply_translation(&mut self, id: usize, translated: &str) -> bool {
        let entry = match self.entries.get_mut(&id) {
            Some(entry) => entry,
            None => return false,
        };

        let node = match entry.node.upgrade() {
            Some(node) if is_attached(&node) => node,
            _ => {
                tracing::warn!(id, "目标节点已脱离文档，跳过写入");
                return false;
            }
        };

        let written = match &entry.attr {
            Some(attr) => {
                set_node_attr(&node, attr, Some(translated.to_string()));
                true
            }
            None => {
                let (leading, trailing) = whitespace_affixes(&entry.original_text);
                let merged = format!("{}{}{}", leading, translated, trailing);
                set_text_content(&node, &merged)
            }
        };

        if !written {
            tracing::warn!(id, "目标节点类型不符，跳过写入");
            return false;
        }

        entry.translated_text = Some(translated.to_string());
        entry.is_translated = true;
        self.processed
            .insert((node_key(&node), entry.attr.clone()));

        true
    }

    /// 还原所有已翻译单元的原文
    ///
    /// 写回提取时刻的原文并把单元移出已处理集合（允许之后重新
    /// 提取），但保留缓存译文与 `is_translated` 标记，供无须再次
    /// 调用翻译服务的切换使用。返回成功写回的数量。
    pub fn restore_original(&mut self) -> usize {
        let mut restored = 0;

        for (id, entry) in self.entries.iter() {
            if !entry.is_translated {
                continue;
            }

            let node = match entry.node.upgrade() {
                Some(node) if is_attached(&node) => node,
                _ => {
                    tracing::debug!(id, "还原时节点已脱离文档");
                    continue;
                }
            };

            let written = match &entry.attr {
                Some(attr) => {
                    set_node_attr(&node, attr, Some(entry.original_text.clone()));
                    true
                }
                None => set_text_content(&node, &entry.original_text),
            };

            if written {
                self.processed.remove(&(node_key(&node), entry.attr.clone()));
                restored += 1;
            }
        }

        restored
    }

    /// 重新应用缓存译文
    ///
    /// 只处理译文与原文不同的条目；成功的单元重新进入已处理
    /// 集合。返回是否有任何单元被恢复。
    pub fn restore_cached(&mut self) -> bool {
        let mut any = false;
        let mut to_mark: Vec<UnitKey> = Vec::new();

        for (id, entry) in self.entries.iter() {
            let translated = match &entry.translated_text {
                Some(text) => text,
                None => continue,
            };

            let unchanged = match &entry.attr {
                Some(_) => translated == &entry.original_text,
                None => translated.trim() == entry.original_text.trim(),
            };
            if unchanged {
                continue;
            }

            let node = match entry.node.upgrade() {
                Some(node) if is_attached(&node) => node,
                _ => {
                    tracing::debug!(id, "恢复译文时节点已脱离文档");
                    continue;
                }
            };

            let written = match &entry.attr {
                Some(attr) => {
                    set_node_attr(&node, attr, Some(translated.clone()));
                    true
                }
                None => {
                    let (leading, trailing) = whitespace_affixes(&entry.original_text);
                    let merged = format!("{}{}{}", leading, translated, trailing);
                    set_text_content(&node, &merged)
                }
            };

            if written {
                to_mark.push((node_key(&node), entry.attr.clone()));
                any = true;
            }
        }

        for key in to_mark {
            self.processed.insert(key);
        }

        any
    }

    /// 是否持有任何缓存译文
    pub fn has_cached_translations(&self) -> bool {
        self.entries.values().any(|entry| entry.is_translated)
    }

    /// 已持有译文的条目数
    pub fn cached_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.is_translated)
            .count()
    }
}

/// 拆出原文的首尾空白
///
/// 全空白原文按"全部是前缀"处理，避免空白被复制两份。
fn whitespace_affixes(text: &str) -> (&str, &str) {
    if text.trim().is_empty() {
        return (text, "");
    }

    let start = text.len() - text.trim_start().len();
    let end = text.trim_end().len();
    (&text[..start], &text[end..])
}
