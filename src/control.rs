//! 控制消息模块
//!
//! 宿主应用（消息总线、扩展后台页）与引擎之间的请求/响应面。
//! 消息体是 JSON 友好的 camelCase 结构，每种请求都有确定的
//! 响应形状。

use serde::{Deserialize, Serialize};

use crate::session::TranslationSession;
use crate::toggle::DisplayState;
use crate::translator::Translation;

/// 控制请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ControlRequest {
    /// 启动整页翻译
    #[serde(rename_all = "camelCase")]
    Start {
        target_language: String,
        #[serde(default = "default_source_language")]
        source_language: String,
        /// 装饰性发光效果，宿主渲染，引擎忽略
        #[serde(default)]
        show_glow_effect: bool,
    },
    /// 取消当前任务
    Cancel,
    /// 在原文与译文之间切换
    Toggle,
    /// 无条件还原原文
    RestoreOriginal,
    /// 启用/停用新内容自动翻译
    #[serde(rename_all = "camelCase")]
    SetAutoTranslate { enabled: bool },
    /// 查询运行状态
    QueryStatus,
    /// 查询检测到的页面语言
    QueryPageLanguage,
    /// 应用一批外部译文（流式/预计算结果）
    ApplyTranslations { translations: Vec<Translation> },
}

fn default_source_language() -> String {
    "auto".to_string()
}

/// 控制响应
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ControlResponse {
    Started {
        started: bool,
    },
    Cancelled {
        cancelled: bool,
    },
    #[serde(rename_all = "camelCase")]
    Toggled {
        showing: DisplayState,
        has_cache: bool,
    },
    #[serde(rename_all = "camelCase")]
    Restored {
        restored: bool,
        has_cache: bool,
    },
    #[serde(rename_all = "camelCase")]
    AutoTranslate {
        auto_translate_enabled: bool,
    },
    #[serde(rename_all = "camelCase")]
    Status {
        is_translating: bool,
        is_auto_translating: bool,
    },
    Language {
        language: String,
    },
    Applied {
        applied: usize,
    },
}

/// 处理一条控制消息
///
/// `Start` 会驱动整个翻译任务直到结束才返回；需要即时应答的
/// 宿主应直接使用 [`TranslationSession::begin_full_translation`]
/// 与 [`TranslationSession::drive`]，把后者挂到本地任务集上。
pub async fn handle(session: &TranslationSession, request: ControlRequest) -> ControlResponse {
    match request {
        ControlRequest::Start {
            target_language,
            source_language,
            show_glow_effect: _,
        } => {
            let started = session
                .translate_page(&target_language, &source_language)
                .await
                .is_ok();
            ControlResponse::Started { started }
        }

        ControlRequest::Cancel => {
            session.cancel();
            ControlResponse::Cancelled { cancelled: true }
        }

        ControlRequest::Toggle => {
            let outcome = session.toggle_display();
            if !outcome.changed && !outcome.has_cache {
                session.status.report("没有可还原的译文", false).await;
            }
            ControlResponse::Toggled {
                showing: outcome.showing,
                has_cache: outcome.has_cache,
            }
        }

        ControlRequest::RestoreOriginal => {
            let (_restored, has_cache) = session.restore_original();
            ControlResponse::Restored {
                restored: true,
                has_cache,
            }
        }

        ControlRequest::SetAutoTranslate { enabled } => ControlResponse::AutoTranslate {
            auto_translate_enabled: session.set_auto_translate(enabled),
        },

        ControlRequest::QueryStatus => ControlResponse::Status {
            is_translating: session.is_translating(),
            is_auto_translating: session.is_auto_translating(),
        },

        ControlRequest::QueryPageLanguage => ControlResponse::Language {
            language: session.detected_language(),
        },

        ControlRequest::ApplyTranslations { translations } => ControlResponse::Applied {
            applied: session.apply_partial(&translations),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let json = r#"{
            "action": "start",
            "targetLanguage": "zh",
            "sourceLanguage": "en",
            "showGlowEffect": true
        }"#;

        let request: ControlRequest = serde_json::from_str(json).unwrap();
        match request {
            ControlRequest::Start {
                target_language,
                source_language,
                show_glow_effect,
            } => {
                assert_eq!(target_language, "zh");
                assert_eq!(source_language, "en");
                assert!(show_glow_effect);
            }
            other => panic!("解析出意外的请求: {:?}", other),
        }
    }

    #[test]
    fn test_source_language_defaults_to_auto() {
        let json = r#"{"action": "start", "targetLanguage": "fr"}"#;
        let request: ControlRequest = serde_json::from_str(json).unwrap();

        match request {
            ControlRequest::Start {
                source_language, ..
            } => assert_eq!(source_language, "auto"),
            other => panic!("解析出意外的请求: {:?}", other),
        }
    }

    #[test]
    fn test_response_wire_format() {
        let response = ControlResponse::Status {
            is_translating: true,
            is_auto_translating: false,
        };
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["isTranslating"], true);
        assert_eq!(json["isAutoTranslating"], false);

        let toggled = ControlResponse::Toggled {
            showing: DisplayState::Translated,
            has_cache: true,
        };
        let json = serde_json::to_value(&toggled).unwrap();
        assert_eq!(json["showing"], "translated");
        assert_eq!(json["hasCache"], true);
    }
}
