use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use trackline_core::error::AppError;
use trackline_core::traits::StatusModel;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(120);

/// OpenAI-compatible chat client that answers tracking prompts with a
/// single JSON object.
///
/// Works with any OpenAI-compatible API, including:
/// - OpenAI directly (`https://api.openai.com/v1`)
/// - Gemini via compatibility layer (`https://generativelanguage.googleapis.com/v1beta/openai`)
#[derive(Clone)]
pub struct OpenAiStatusModel {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenAiStatusModel {
    pub fn new(api_key: &str, model: &str) -> Result<Self, AppError> {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, model: &str, base_url: &str) -> Result<Self, AppError> {
        Self::build(api_key, model, base_url, DEFAULT_LLM_TIMEOUT)
    }

    pub fn with_timeout(self, timeout: Duration) -> Result<Self, AppError> {
        Self::build(&self.api_key, &self.model, &self.base_url, timeout)
    }

    fn build(
        api_key: &str,
        model: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout_secs: timeout.as_secs(),
        })
    }
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client, AppError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::HttpError(e.to_string()))
}

// ---- OpenAI API types ----

#[derive(Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Serialize)]
pub(crate) struct Message {
    pub role: &'static str,
    pub content: Content,
}

#[derive(Serialize)]
#[serde(untagged)]
pub(crate) enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
pub(crate) struct ImageUrl {
    pub url: String,
}

#[derive(Serialize)]
pub(crate) struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// POST a chat completion and return the first choice's content, if any.
pub(crate) async fn send_chat(
    client: &Client,
    base_url: &str,
    api_key: &str,
    timeout_secs: u64,
    request: &ChatRequest,
) -> Result<Option<String>, AppError> {
    let url = format!("{base_url}/chat/completions");

    let response = client
        .post(&url)
        .header("Authorization", format!("Bearer {api_key}"))
        .json(request)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                AppError::Timeout(timeout_secs)
            } else if e.is_connect() {
                AppError::NetworkError(format!("Connection failed: {}", e))
            } else {
                AppError::HttpError(e.to_string())
            }
        })?;

    let status = response.status();
    if !status.is_success() {
        let status_code = status.as_u16();
        let body = response.text().await.unwrap_or_default();

        let message = serde_json::from_str::<ApiError>(&body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| format!("HTTP {}: {}", status_code, body));

        if status_code == 429 {
            return Err(AppError::RateLimitExceeded);
        }

        return Err(AppError::LlmError {
            message,
            status_code,
            retryable: status_code >= 500,
        });
    }

    let chat_response: ChatResponse = response
        .json()
        .await
        .map_err(|e| AppError::HttpError(format!("Failed to parse LLM response: {}", e)))?;

    Ok(chat_response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content))
}

impl StatusModel for OpenAiStatusModel {
    async fn complete_json(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<serde_json::Value, AppError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system",
                    content: Content::Text(system_prompt.to_string()),
                },
                Message {
                    role: "user",
                    content: Content::Text(user_prompt.to_string()),
                },
            ],
            response_format: Some(ResponseFormat {
                format_type: "json_object",
            }),
            temperature: Some(0.0),
            max_tokens: None,
        };

        let content = send_chat(
            &self.client,
            &self.base_url,
            &self.api_key,
            self.timeout_secs,
            &request,
        )
        .await?
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AppError::LlmError {
            message: "Empty response from LLM".into(),
            status_code: 200,
            retryable: false,
        })?;

        serde_json::from_str(&content).map_err(|e| {
            AppError::InterpretationFailure(format!(
                "LLM returned invalid JSON: {}. Raw: {}",
                e, content
            ))
        })
    }
}
