//! Fireworks chat-completions client: a single non-streaming POST carrying
//! the context window verbatim.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{summarize_error_body, ApiError, ProviderGateway};
use crate::core::message::Message;
use crate::core::settings::ApiSettings;
use crate::utils::url::construct_api_url;

pub const FIREWORKS_BASE_URL: &str = "https://api.fireworks.ai/inference/v1";

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    top_p: f64,
    top_k: u32,
    presence_penalty: f64,
    frequency_penalty: f64,
    temperature: f64,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatCompletionChoice>,
}

#[derive(Deserialize)]
struct ChatCompletionChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

pub struct FireworksClient {
    client: reqwest::Client,
    base_url: String,
}

impl FireworksClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, FIREWORKS_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

fn build_request<'a>(context: &'a [Message], settings: &'a ApiSettings) -> ChatCompletionRequest<'a> {
    ChatCompletionRequest {
        model: &settings.model,
        max_tokens: settings.max_tokens,
        top_p: 1.0,
        top_k: 40,
        presence_penalty: 0.0,
        frequency_penalty: 0.0,
        temperature: settings.temperature,
        messages: context
            .iter()
            .map(|message| ChatMessage {
                role: message.role.as_str(),
                content: &message.content,
            })
            .collect(),
        stream: false,
    }
}

fn classify_failure(status: StatusCode, body: &str) -> ApiError {
    match status.as_u16() {
        401 | 403 => ApiError::Unauthorized,
        429 => ApiError::RateLimited,
        _ => ApiError::Upstream(
            summarize_error_body(body).unwrap_or_else(|| "API_ERROR".to_string()),
        ),
    }
}

#[async_trait]
impl ProviderGateway for FireworksClient {
    async fn generate_reply(
        &self,
        context: &[Message],
        settings: &ApiSettings,
    ) -> Result<String, ApiError> {
        let url = construct_api_url(&self.base_url, "chat/completions");
        let request = build_request(context, settings);

        let response = self
            .client
            .post(url)
            .header("Accept", "application/json")
            .bearer_auth(&settings.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|err| ApiError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body));
        }

        let body: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| ApiError::Network(err.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(ApiError::Empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::settings::Provider;

    fn settings() -> ApiSettings {
        let mut settings = ApiSettings::default();
        settings.temperature = 0.3;
        settings.max_tokens = 2048;
        settings
    }

    #[test]
    fn request_carries_the_fixed_sampling_parameters() {
        let context = vec![Message::user("你好")];
        let settings = settings();
        let json = serde_json::to_value(build_request(&context, &settings)).unwrap();

        assert_eq!(json["model"], Provider::Fireworks.default_model());
        assert_eq!(json["top_p"], 1.0);
        assert_eq!(json["top_k"], 40);
        assert_eq!(json["presence_penalty"], 0.0);
        assert_eq!(json["frequency_penalty"], 0.0);
        assert_eq!(json["temperature"], 0.3);
        assert_eq!(json["max_tokens"], 2048);
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn context_is_forwarded_verbatim_in_order() {
        let context = vec![
            Message::user("first"),
            Message::assistant("second"),
            Message::user("third"),
        ];
        let json = serde_json::to_value(build_request(&context, &settings())).unwrap();
        let messages = json["messages"].as_array().unwrap();

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[2]["content"], "third");
    }

    #[test]
    fn auth_and_quota_statuses_classify_before_upstream() {
        assert_eq!(
            classify_failure(StatusCode::UNAUTHORIZED, "{}"),
            ApiError::Unauthorized
        );
        assert_eq!(
            classify_failure(StatusCode::FORBIDDEN, "{}"),
            ApiError::Unauthorized
        );
        assert_eq!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, "{}"),
            ApiError::RateLimited
        );
    }

    #[test]
    fn other_failures_carry_the_server_message() {
        assert_eq!(
            classify_failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                r#"{"error":{"message":"model is overloaded"}}"#
            ),
            ApiError::Upstream("model is overloaded".to_string())
        );
        assert_eq!(
            classify_failure(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>"),
            ApiError::Upstream("API_ERROR".to_string())
        );
    }

    #[test]
    fn empty_choice_content_parses_to_none() {
        let body: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant"}}]}"#).unwrap();
        assert!(body.choices[0].message.content.is_none());

        let body: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"喵"}}]}"#,
        )
        .unwrap();
        assert_eq!(body.choices[0].message.content.as_deref(), Some("喵"));
    }
}
