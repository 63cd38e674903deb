use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::ChatError;

static BOLD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

impl<'a> GenerateRequest<'a> {
    /// A request carrying only this one user turn.
    fn single_turn(text: &'a str) -> Self {
        Self {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text }],
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Body of a `generateContent` reply, either shape.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenerateResponse {
    Failure { error: ApiErrorBody },
    Success { candidates: Vec<Candidate> },
}

/// Interpret a status code and raw body as one turn's outcome.
fn interpret(status: u16, body: &str) -> Result<String, ChatError> {
    let envelope: GenerateResponse = serde_json::from_str(body).map_err(|e| {
        warn!(status, error = %e, "unexpected response shape");
        ChatError::MalformedResponse
    })?;

    let ok = (200..300).contains(&status);
    match envelope {
        GenerateResponse::Failure { error } if !ok => Err(ChatError::Api {
            status,
            message: error.message,
        }),
        GenerateResponse::Success { candidates } if ok => candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| strip_bold(&p.text))
            .ok_or(ChatError::MalformedResponse),
        _ => Err(ChatError::MalformedResponse),
    }
}

/// Remove `**` delimiters, keeping the text between them.
pub fn strip_bold(text: &str) -> String {
    BOLD_PATTERN.replace_all(text, "$1").into_owned()
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_base: String,
    model: String,
    api_key: String,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(api_base: &str, model: &str, api_key: &str, timeout_secs: u64) -> anyhow::Result<Self> {
        let mut builder = Client::builder();
        if timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(timeout_secs));
        }

        Ok(Self {
            client: builder.build()?,
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            timeout_secs,
        })
    }

    /// Build a client from config, or `None` when no key is configured.
    pub fn from_config(config: &Config) -> anyhow::Result<Option<Self>> {
        match config.api_key.as_deref() {
            Some(key) if config.has_api_key() => Ok(Some(Self::new(
                &config.api_base,
                &config.model,
                key,
                config.request_timeout_secs,
            )?)),
            _ => Ok(None),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.api_base, self.model)
    }

    /// Send one user turn and return the answer text with bold markup removed.
    pub async fn generate(&self, prompt: &str) -> Result<String, ChatError> {
        let request = GenerateRequest::single_turn(prompt);

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.classify(e))?;
        debug!(status, bytes = body.len(), "generateContent response");

        interpret(status, &body)
    }

    fn classify(&self, err: reqwest::Error) -> ChatError {
        if err.is_timeout() {
            ChatError::Timeout(self.timeout_secs)
        } else {
            ChatError::from(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_bold() {
        assert_eq!(strip_bold("**Hello** world"), "Hello world");
        assert_eq!(strip_bold("a **b** c **d**"), "a b c d");
        assert_eq!(strip_bold("no markup"), "no markup");
        assert_eq!(strip_bold("**unclosed"), "**unclosed");
    }

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(GenerateRequest::single_turn("hi")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "contents": [{ "role": "user", "parts": [{ "text": "hi" }] }]
            })
        );
    }

    #[test]
    fn test_interpret_success() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"**Hello** world"}]}}]}"#;
        assert_eq!(interpret(200, body).unwrap(), "Hello world");
    }

    #[test]
    fn test_interpret_api_error() {
        let body = r#"{"error":{"code":429,"message":"quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        assert_eq!(
            interpret(429, body),
            Err(ChatError::Api {
                status: 429,
                message: "quota exceeded".to_string()
            })
        );
    }

    #[test]
    fn test_interpret_malformed_shapes() {
        assert_eq!(interpret(200, "not json"), Err(ChatError::MalformedResponse));
        assert_eq!(interpret(200, r#"{"candidates":[]}"#), Err(ChatError::MalformedResponse));
        assert_eq!(
            interpret(200, r#"{"candidates":[{"content":{"parts":[]}}]}"#),
            Err(ChatError::MalformedResponse)
        );
        assert_eq!(interpret(500, r#"{"oops":true}"#), Err(ChatError::MalformedResponse));
        assert_eq!(interpret(502, "<html>bad gateway</html>"), Err(ChatError::MalformedResponse));
    }

    #[test]
    fn test_error_body_with_success_status_is_malformed() {
        let body = r#"{"error":{"message":"odd"}}"#;
        assert_eq!(interpret(200, body), Err(ChatError::MalformedResponse));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let client = GeminiClient::new("http://localhost:1234/", "gemini-1.5-flash", "k", 0).unwrap();
        assert_eq!(
            client.endpoint(),
            "http://localhost:1234/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_from_config_needs_a_real_key() {
        let mut config = Config::new();
        assert!(GeminiClient::from_config(&config).unwrap().is_none());

        config.api_key = Some("  ".to_string());
        assert!(GeminiClient::from_config(&config).unwrap().is_none());

        config.api_key = Some("key".to_string());
        let client = GeminiClient::from_config(&config).unwrap().unwrap();
        assert_eq!(client.model(), config.model);
    }
}
