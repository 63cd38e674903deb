//! UI-agnostic chat state types
//!
//! These are the values the session controller mutates and the store
//! persists. Nothing here depends on the terminal UI.

use serde::{Deserialize, Serialize};

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Agent,
}

/// A rendered chat bubble
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    #[serde(default)]
    pub loading: bool,
    #[serde(default)]
    pub error: bool,
}

impl ChatMessage {
    pub fn outgoing(text: &str) -> Self {
        Self {
            role: ChatRole::User,
            text: text.to_string(),
            loading: false,
            error: false,
        }
    }

    /// Placeholder for an answer that has not arrived yet.
    pub fn incoming_placeholder() -> Self {
        Self {
            role: ChatRole::Agent,
            text: String::new(),
            loading: true,
            error: false,
        }
    }
}

/// Color theme preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

impl Theme {
    /// Value written to the store.
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light_mode",
            Theme::Dark => "dark_mode",
        }
    }

    /// Anything other than `"light_mode"` is dark.
    pub fn from_stored(value: Option<&str>) -> Self {
        match value {
            Some("light_mode") => Theme::Light,
            _ => Theme::Dark,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    /// Label of the toggle action, which names the theme you would switch to.
    pub fn toggle_label(&self) -> &'static str {
        match self {
            Theme::Light => "dark_mode",
            Theme::Dark => "light_mode",
        }
    }
}
