use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use trackline_core::error::AppError;
use trackline_core::traits::CaptchaSolver;

use crate::llm::{
    ChatRequest, Content, ContentPart, DEFAULT_BASE_URL, ImageUrl, Message, http_client,
    send_chat,
};

pub const DEFAULT_VISION_MODEL: &str = "gpt-4o";
const VISION_TIMEOUT: Duration = Duration::from_secs(30);
const CHALLENGE_PROMPT: &str = "What is the text in this captcha? Return ONLY the text.";
const MAX_ANSWER_TOKENS: u32 = 10;

/// Reads challenge images with an OpenAI-compatible vision model.
#[derive(Clone)]
pub struct OpenAiVisionSolver {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenAiVisionSolver {
    pub fn new(api_key: &str, model: &str) -> Result<Self, AppError> {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, model: &str, base_url: &str) -> Result<Self, AppError> {
        Ok(Self {
            client: http_client(VISION_TIMEOUT)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            timeout_secs: VISION_TIMEOUT.as_secs(),
        })
    }
}

/// `data:` URL carrying a PNG image.
fn png_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

#[async_trait]
impl CaptchaSolver for OpenAiVisionSolver {
    async fn solve(&self, png: &[u8]) -> Result<Option<String>, AppError> {
        tracing::info!(bytes = png.len(), "Asking vision model to read challenge");
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user",
                content: Content::Parts(vec![
                    ContentPart::Text {
                        text: CHALLENGE_PROMPT.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: png_data_url(png),
                        },
                    },
                ]),
            }],
            response_format: None,
            temperature: None,
            max_tokens: Some(MAX_ANSWER_TOKENS),
        };

        let answer = send_chat(
            &self.client,
            &self.base_url,
            &self.api_key,
            self.timeout_secs,
            &request,
        )
        .await?;

        Ok(answer
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_data_url_is_base64_png() {
        assert_eq!(png_data_url(b"abc"), "data:image/png;base64,YWJj");
    }

    #[tokio::test]
    async fn test_answer_is_trimmed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"model": "gpt-4o", "max_tokens": 10})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "  X7KQ \n"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let solver = OpenAiVisionSolver::with_base_url("k", DEFAULT_VISION_MODEL, &server.uri()).unwrap();
        assert_eq!(solver.solve(b"png").await.unwrap(), Some("X7KQ".to_string()));
    }

    #[tokio::test]
    async fn test_blank_answer_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "   "}}]
            })))
            .mount(&server)
            .await;

        let solver = OpenAiVisionSolver::with_base_url("k", DEFAULT_VISION_MODEL, &server.uri()).unwrap();
        assert_eq!(solver.solve(b"png").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_api_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let solver = OpenAiVisionSolver::with_base_url("k", DEFAULT_VISION_MODEL, &server.uri()).unwrap();
        let err = solver.solve(b"png").await.unwrap_err();
        assert!(matches!(err, AppError::LlmError { status_code: 401, .. }));
    }
}
