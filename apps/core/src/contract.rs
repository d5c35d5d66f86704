use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Command {
    ToggleOverlay,
    PerformSearch { terms: String },
    ClearHighlights,
    ToggleAutoHighlight,
    SetDefaultTerms { terms: Vec<String> },
    ReHighlight,
}

impl Command {
    pub fn action(&self) -> &'static str {
        match self {
            Self::ToggleOverlay => "toggleOverlay",
            Self::PerformSearch { .. } => "performSearch",
            Self::ClearHighlights => "clearHighlights",
            Self::ToggleAutoHighlight => "toggleAutoHighlight",
            Self::SetDefaultTerms { .. } => "setDefaultTerms",
            Self::ReHighlight => "reHighlight",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageSender {
    pub id: Option<String>,
}

impl MessageSender {
    pub fn new(id: &str) -> Self {
        Self {
            id: Some(id.to_string()),
        }
    }

    pub fn anonymous() -> Self {
        Self { id: None }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_highlight_mode: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            auto_highlight_mode: None,
            error: None,
        }
    }

    pub fn with_auto_highlight_mode(mut self, enabled: bool) -> Self {
        self.auto_highlight_mode = Some(enabled);
        self
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            auto_highlight_mode: None,
            error: Some(message.into()),
        }
    }
}
