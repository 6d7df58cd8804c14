//! Gemini client: the `generateContent` REST call, with the conversation
//! translated into Gemini's turn format (`assistant` becomes `model`, and
//! anything before the first user turn is dropped).

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{summarize_error_body, ApiError, ProviderGateway};
use crate::core::message::Message;
use crate::core::settings::ApiSettings;
use crate::utils::url::construct_api_url;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    top_p: f64,
    top_k: u32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    fn text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
}

impl GeminiClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, GEMINI_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

/// Builds the request body. Turns before the first user message are not
/// representable in Gemini's history, so the window starts there; by
/// construction the controller always sends at least one user turn, making
/// the missing-user failure a defensive check rather than a normal path.
fn build_request<'a>(
    context: &'a [Message],
    settings: &ApiSettings,
) -> Result<GenerateContentRequest<'a>, ApiError> {
    let first_user = context
        .iter()
        .position(|message| message.is_user())
        .ok_or_else(|| ApiError::Upstream("对话历史中未找到用户消息".to_string()))?;

    let contents = context[first_user..]
        .iter()
        .map(|message| Content {
            role: if message.is_user() { "user" } else { "model" },
            parts: vec![Part {
                text: &message.content,
            }],
        })
        .collect();

    Ok(GenerateContentRequest {
        contents,
        generation_config: GenerationConfig {
            temperature: settings.temperature,
            top_p: 0.95,
            top_k: 64,
            max_output_tokens: settings.max_tokens,
        },
    })
}

fn classify_failure(status: StatusCode, body: &str) -> ApiError {
    if body.contains("API_KEY_INVALID") || body.contains("PERMISSION_DENIED") {
        return ApiError::Unauthorized;
    }
    if status.as_u16() == 429
        || body.contains("QUOTA_EXCEEDED")
        || body.contains("RESOURCE_EXHAUSTED")
    {
        return ApiError::RateLimited;
    }
    ApiError::Upstream(summarize_error_body(body).unwrap_or_else(|| "API_ERROR".to_string()))
}

#[async_trait]
impl ProviderGateway for GeminiClient {
    async fn generate_reply(
        &self,
        context: &[Message],
        settings: &ApiSettings,
    ) -> Result<String, ApiError> {
        let endpoint = format!("models/{}:generateContent", settings.model);
        let url = construct_api_url(&self.base_url, &endpoint);
        let request = build_request(context, settings)?;

        let response = self
            .client
            .post(url)
            .query(&[("key", settings.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|err| ApiError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| ApiError::Network(err.to_string()))?;

        let text = body.text();
        if text.is_empty() {
            return Err(ApiError::Empty);
        }
        Ok(text)
    }
}
