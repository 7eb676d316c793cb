//! Optional note reformulation through an OpenAI-compatible chat endpoint.
//!
//! Reformulation is a convenience: callers that cannot afford a failure use
//! [`ReformulationService::reformulate_or_keep`], which falls back to the text
//! the user typed.

use reqwest::{Client, Request, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::{clamp_chars, compact_text, is_http_url, normalize_text_option};
use crate::validate::MAX_TEXT_LENGTH;

const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
const ENV_OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
const ENV_OPENAI_REFORMULATION_MODEL: &str = "OPENAI_REFORMULATION_MODEL";

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 500;

const SYSTEM_PROMPT: &str = "You help site managers write construction-site documentation. \
Rewrite the note professionally and clearly. Keep every fact, measurement and location, \
keep the language of the note and do not add information.";

#[derive(Clone, Debug, PartialEq, Eq)]
enum ReformulationMode {
    Disabled,
    OpenAi {
        base_url: String,
        api_key: String,
        model: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReformulationConfigStatus {
    pub enabled: bool,
    pub provider: &'static str,
    pub model: Option<String>,
}

#[derive(Debug, Error)]
pub enum ReformulationError {
    #[error("Reformulation is not configured. Set OPENAI_API_KEY.")]
    NotConfigured,
    #[error("Note text is required")]
    EmptyInput,
    #[error("Invalid reformulation configuration: {0}")]
    InvalidConfiguration(&'static str),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Reformulation API error: {0}")]
    Api(String),
    #[error("Invalid response from reformulation API")]
    InvalidResponse,
}

impl ReformulationError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotConfigured => "REFORMULATION_DISABLED",
            Self::EmptyInput => "MISSING_TEXT",
            Self::InvalidConfiguration(_) => "CONFIGURATION_ERROR",
            Self::Http(error) if error.is_timeout() => "TIMEOUT",
            Self::Http(_) => "NETWORK_ERROR",
            Self::Api(_) | Self::InvalidResponse => "SERVER_ERROR",
        }
    }
}

type ReformulationResult<T> = Result<T, ReformulationError>;

#[derive(Clone)]
pub struct ReformulationService {
    client: Client,
    mode: ReformulationMode,
}

impl std::fmt::Debug for ReformulationService {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ReformulationService")
            .field("status", &self.config_status())
            .finish_non_exhaustive()
    }
}

impl ReformulationService {
    /// Build from `OPENAI_API_KEY`, `OPENAI_BASE_URL` and
    /// `OPENAI_REFORMULATION_MODEL`. Without a key the service is disabled.
    pub fn from_env() -> ReformulationResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ReformulationResult<Self> {
        let mode = match normalize_text_option(lookup(ENV_OPENAI_API_KEY)) {
            Some(api_key) => {
                let base_url = normalize_text_option(lookup(ENV_OPENAI_BASE_URL))
                    .map(|value| value.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
                if !is_http_url(&base_url) {
                    return Err(ReformulationError::InvalidConfiguration(
                        "OPENAI_BASE_URL must start with http:// or https://",
                    ));
                }
                let model = normalize_text_option(lookup(ENV_OPENAI_REFORMULATION_MODEL))
                    .unwrap_or_else(|| DEFAULT_MODEL.to_string());
                ReformulationMode::OpenAi {
                    base_url,
                    api_key,
                    model,
                }
            }
            None => ReformulationMode::Disabled,
        };

        Ok(Self {
            client: Client::builder().build()?,
            mode,
        })
    }

    pub fn disabled() -> ReformulationResult<Self> {
        Ok(Self {
            client: Client::builder().build()?,
            mode: ReformulationMode::Disabled,
        })
    }

    #[must_use]
    pub fn config_status(&self) -> ReformulationConfigStatus {
        match &self.mode {
            ReformulationMode::Disabled => ReformulationConfigStatus {
                enabled: false,
                provider: "none",
                model: None,
            },
            ReformulationMode::OpenAi { model, .. } => ReformulationConfigStatus {
                enabled: true,
                provider: "openai",
                model: Some(model.clone()),
            },
        }
    }

    /// Rewrite `text`; the result never exceeds the note length ceiling.
    pub async fn reformulate(&self, text: &str) -> ReformulationResult<String> {
        let request = self.build_request(text)?;
        let response = self.client.execute(request).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(ReformulationError::Api(
                "Unauthorized reformulation request (check OPENAI_API_KEY)".to_string(),
            ));
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ReformulationError::Api(format!(
                "request failed with {status}: {}",
                compact_text(&body)
            )));
        }

        let payload: ChatCompletionResponse = response.json().await?;
        extract_reply(payload)
    }

    /// [`Self::reformulate`], keeping the original text on any failure.
    pub async fn reformulate_or_keep(&self, text: &str) -> String {
        match self.reformulate(text).await {
            Ok(revised) => revised,
            Err(error) => {
                tracing::warn!(code = error.code(), "Keeping original note text: {error}");
                text.to_string()
            }
        }
    }

    fn build_request(&self, text: &str) -> ReformulationResult<Request> {
        let (base_url, api_key, model) = match &self.mode {
            ReformulationMode::Disabled => return Err(ReformulationError::NotConfigured),
            ReformulationMode::OpenAi {
                base_url,
                api_key,
                model,
            } => (base_url, api_key, model),
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(ReformulationError::EmptyInput);
        }

        let body = ChatCompletionRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: format!("Rewrite this site note: \"{text}\""),
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        self.client
            .post(format!("{base_url}/v1/chat/completions"))
            .bearer_auth(api_key)
            .json(&body)
            .build()
            .map_err(ReformulationError::Http)
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatReply>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

fn extract_reply(payload: ChatCompletionResponse) -> ReformulationResult<String> {
    let content = payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .and_then(|content| normalize_text_option(Some(content)))
        .ok_or(ReformulationError::InvalidResponse)?;
    Ok(clamp_chars(&content, MAX_TEXT_LENGTH))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn service(vars: &[(&str, &str)]) -> ReformulationService {
        let map = vars.iter().copied().collect::<HashMap<_, _>>();
        ReformulationService::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
            .unwrap()
    }

    #[test]
    fn disabled_without_api_key() {
        let status = service(&[]).config_status();
        assert!(!status.enabled);
        assert_eq!(status.provider, "none");

        let error = service(&[]).build_request("Riss").unwrap_err();
        assert!(matches!(error, ReformulationError::NotConfigured));
    }

    #[test]
    fn rejects_base_url_without_scheme() {
        let result = ReformulationService::from_lookup(|key| match key {
            ENV_OPENAI_API_KEY => Some("sk-test".to_string()),
            ENV_OPENAI_BASE_URL => Some("api.example.com".to_string()),
            _ => None,
        });
        assert!(matches!(
            result,
            Err(ReformulationError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn request_shape_is_chat_completion() {
        let service = service(&[
            (ENV_OPENAI_API_KEY, "sk-test"),
            (ENV_OPENAI_BASE_URL, "https://llm.example.com/"),
        ]);
        assert_eq!(service.config_status().model.as_deref(), Some(DEFAULT_MODEL));

        let request = service.build_request("  riss wand eg  ").unwrap();
        assert_eq!(request.method(), reqwest::Method::POST);
        assert_eq!(
            request.url().as_str(),
            "https://llm.example.com/v1/chat/completions"
        );
        let auth = request
            .headers()
            .get(reqwest::header::AUTHORIZATION)
            .unwrap()
            .to_str()
            .unwrap();
        assert_eq!(auth, "Bearer sk-test");

        let body: serde_json::Value = serde_json::from_slice(
            request.body().and_then(reqwest::Body::as_bytes).unwrap(),
        )
        .unwrap();
        assert_eq!(body["max_tokens"], 500);
        assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(
            body["messages"][1]["content"],
            "Rewrite this site note: \"riss wand eg\""
        );
    }

    #[test]
    fn empty_note_is_rejected_before_any_request() {
        let service = service(&[(ENV_OPENAI_API_KEY, "sk-test")]);
        let error = service.build_request("   ").unwrap_err();
        assert_eq!(error.code(), "MISSING_TEXT");
    }

    #[test]
    fn reply_is_trimmed_and_clamped() {
        let payload: ChatCompletionResponse = serde_json::from_value(serde_json::json!({
            "choices": [{ "message": { "content": format!("  {}  ", "a".repeat(1200)) } }]
        }))
        .unwrap();
        let reply = extract_reply(payload).unwrap();
        assert_eq!(reply.chars().count(), MAX_TEXT_LENGTH);

        let empty: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"  "}}]}"#).unwrap();
        assert!(matches!(
            extract_reply(empty),
            Err(ReformulationError::InvalidResponse)
        ));
        let missing: ChatCompletionResponse = serde_json::from_str("{}").unwrap();
        assert!(extract_reply(missing).is_err());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn failures_keep_original_text() {
        let text = "Riss in Wand";
        assert_eq!(service(&[]).reformulate_or_keep(text).await, text);
    }
}
