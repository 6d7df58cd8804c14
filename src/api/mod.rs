//! The provider gateway: one capability, two remote implementations.
//!
//! The conversation controller talks to [`ProviderGateway`] and nothing
//! else; [`ProviderRouter`] holds both clients and is the single place in
//! the crate that branches on the configured provider.

use async_trait::async_trait;
use std::error::Error as StdError;
use std::fmt;

use crate::core::message::Message;
use crate::core::settings::{ApiSettings, Provider};

pub mod fireworks;
pub mod gemini;

pub use fireworks::FireworksClient;
pub use gemini::GeminiClient;

/// Classified gateway failure. `Display` is the user-facing text the
/// controller appends to the conversation, so every variant renders as a
/// complete, human-readable sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The cached connectivity flag said we are offline; no request was made.
    Offline,
    /// The request never produced an HTTP response.
    Network(String),
    /// The credential was rejected or lacks permission.
    Unauthorized,
    /// Quota or request frequency exceeded.
    RateLimited,
    /// The remote reported a failure; carries its message when one exists.
    Upstream(String),
    /// The remote answered successfully but returned no content.
    Empty,
    /// Anything that defied classification.
    Unknown,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Offline | ApiError::Network(_) => {
                write!(f, "网络连接已断开，请检查您的网络连接后重试。")
            }
            ApiError::Unauthorized => write!(f, "API 密钥无效或已过期，请检查您的 API 密钥。"),
            ApiError::RateLimited => write!(f, "API 调用频率超限，请稍后再试。"),
            ApiError::Upstream(message) => write!(f, "服务器错误：{message}"),
            ApiError::Empty => write!(f, "AI 返回了空响应，请重试。"),
            ApiError::Unknown => write!(f, "抱歉，服务出现了问题。请稍后重试。"),
        }
    }
}

impl StdError for ApiError {}

/// Produces the next assistant reply for a context window, or a classified
/// failure. Implementations never mutate the conversation.
#[async_trait]
pub trait ProviderGateway: Send + Sync {
    async fn generate_reply(
        &self,
        context: &[Message],
        settings: &ApiSettings,
    ) -> Result<String, ApiError>;
}

/// Owns both provider clients and dispatches per the configured provider.
pub struct ProviderRouter {
    fireworks: FireworksClient,
    gemini: GeminiClient,
}

impl ProviderRouter {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            fireworks: FireworksClient::new(client.clone()),
            gemini: GeminiClient::new(client),
        }
    }
}

#[async_trait]
impl ProviderGateway for ProviderRouter {
    async fn generate_reply(
        &self,
        context: &[Message],
        settings: &ApiSettings,
    ) -> Result<String, ApiError> {
        match settings.provider {
            Provider::Fireworks => self.fireworks.generate_reply(context, settings).await,
            Provider::Gemini => self.gemini.generate_reply(context, settings).await,
        }
    }
}

/// Pulls a human-readable summary out of a provider error body. Providers
/// disagree on where the message lives (`error.message`, a bare `error`
/// string, a top-level `message`), so each location is tried in turn.
pub(crate) fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value.get("error").and_then(|v| match v {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Object(map) => map
                    .get("message")
                    .and_then(|message| message.as_str().map(str::to_owned)),
                _ => None,
            })
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        })?;

    let collapsed = summary.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Summary extraction straight from raw (possibly non-JSON) body text.
pub(crate) fn summarize_error_body(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body.trim())
        .ok()
        .and_then(|value| extract_error_summary(&value))
}
