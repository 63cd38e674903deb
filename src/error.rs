use thiserror::Error;

/// Errors that end a single chat turn.
///
/// Every variant is terminal for the turn it belongs to: the text is shown in
/// place of the answer and the session goes back to idle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// Non-2xx status; the message is the API's own `error.message`.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response")]
    MalformedResponse,

    #[error("{0}")]
    Transport(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("No API key configured. Press K to enter one.")]
    MissingApiKey,
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ChatError::MalformedResponse
        } else {
            ChatError::Transport(err.to_string())
        }
    }
}

/// Errors from the local key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("filesystem error: {0}")]
    FileSystem(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_displays_message_verbatim() {
        let err = ChatError::Api {
            status: 429,
            message: "quota exceeded".to_string(),
        };
        assert_eq!(err.to_string(), "quota exceeded");
    }

    #[test]
    fn test_timeout_display() {
        assert_eq!(ChatError::Timeout(30).to_string(), "Request timed out after 30s");
    }
}
