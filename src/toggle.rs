//! 原文/译文切换控制模块
//!
//! 在不重新调用翻译后端的前提下，利用注册表缓存在原文与
//! 译文两种显示状态之间切换。

use serde::{Deserialize, Serialize};

use crate::registry::NodeRegistry;

/// 页面当前显示状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayState {
    Original,
    Translated,
}

/// 页面级标记
///
/// `has_cache` 表示注册表里存在缓存译文；`showing_translated`
/// 表示当前正在显示译文。两者独立：还原原文后缓存仍在。
#[derive(Debug, Clone, Copy, Default)]
pub struct PageFlags {
    pub has_cache: bool,
    pub showing_translated: bool,
}

impl PageFlags {
    pub fn display_state(&self) -> DisplayState {
        if self.showing_translated {
            DisplayState::Translated
        } else {
            DisplayState::Original
        }
    }
}

/// 切换结果
#[derive(Debug, Clone, Copy)]
pub struct ToggleOutcome {
    pub showing: DisplayState,
    pub has_cache: bool,
    /// 为 false 表示无缓存可切换（no-op）
    pub changed: bool,
}

/// 在原文与译文之间切换
///
/// - 正在显示译文 → 写回原文（缓存保留）
/// - 正在显示原文且有缓存 → 重新应用缓存译文
/// - 没有缓存 → 不做任何事
pub fn toggle(registry: &mut NodeRegistry, flags: &mut PageFlags) -> ToggleOutcome {
    if flags.showing_translated {
        let restored = registry.restore_original();
        flags.showing_translated = false;
        tracing::debug!(restored, "已切回原文");

        ToggleOutcome {
            showing: DisplayState::Original,
            has_cache: flags.has_cache,
            changed: true,
        }
    } else if flags.has_cache {
        let any = registry.restore_cached();
        flags.showing_translated = any;
        tracing::debug!("已切回译文");

        ToggleOutcome {
            showing: flags.display_state(),
            has_cache: true,
            changed: any,
        }
    } else {
        ToggleOutcome {
            showing: DisplayState::Original,
            has_cache: false,
            changed: false,
        }
    }
}

/// 无条件还原原文
///
/// 返回成功写回的条目数；缓存与 `has_cache` 标记保留。
pub fn restore_original(registry: &mut NodeRegistry, flags: &mut PageFlags) -> usize {
    let restored = registry.restore_original();
    flags.showing_translated = false;
    restored
}
