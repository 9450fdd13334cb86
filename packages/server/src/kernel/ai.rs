// AI implementation using OpenAI
//
// This is the infrastructure implementation of BaseAI.
// Business logic (what to prompt for) lives in domain layers.

use anyhow::{Context, Result};
use async_trait::async_trait;
use openai_client::{ChatRequest, Message, OpenAIClient, OpenAIError};
use std::time::Duration;
use tracing::debug;

use super::{BaseAI, ProviderError};

const DEFAULT_TEMPERATURE: f32 = 0.7;

/// OpenAI implementation of BaseAI bound to one model.
#[derive(Clone)]
pub struct OpenAIAdapter {
    client: OpenAIClient,
    model: String,
}

impl OpenAIAdapter {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = OpenAIClient::new(api_key)
            .with_timeout(Duration::from_secs(120))
            .context("Failed to create OpenAI HTTP client")?;
        Ok(Self::from_client(client, model))
    }

    pub fn from_client(client: OpenAIClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    fn request(&self, system_prompt: &str, user_prompt: &str) -> ChatRequest {
        ChatRequest::new(&self.model)
            .message(Message::system(system_prompt))
            .message(Message::user(user_prompt))
            .temperature(DEFAULT_TEMPERATURE)
    }

    async fn send(&self, request: ChatRequest) -> Result<String> {
        let response = self
            .client
            .chat_completion(request)
            .await
            .map_err(|e| match e {
                OpenAIError::Api { status, message } => anyhow::Error::new(ProviderError::Status {
                    provider: "OpenAI",
                    status,
                    body: message,
                }),
                other => anyhow::Error::new(other).context("OpenAI chat completion failed"),
            })?;

        if let Some(usage) = &response.usage {
            debug!(
                model = %self.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "OpenAI completion"
            );
        }
        Ok(response.content)
    }
}

#[async_trait]
impl BaseAI for OpenAIAdapter {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.send(self.request(system_prompt, user_prompt)).await
    }

    async fn complete_json(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        self.send(self.request(system_prompt, user_prompt).json_object())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_complete_json_requests_json_object_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({
                "model": "gpt-4o",
                "response_format": { "type": "json_object" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "{\"subject\":\"Hi\"}" } }],
                "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenAIClient::new("sk-test").with_base_url(server.uri());
        let adapter = OpenAIAdapter::from_client(client, "gpt-4o");

        let raw = adapter.complete_json("system", "user").await.unwrap();
        assert_eq!(raw, "{\"subject\":\"Hi\"}");
    }

    #[tokio::test]
    async fn test_api_error_summary_hides_response_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("org-8812 quota exceeded"))
            .mount(&server)
            .await;

        let client = OpenAIClient::new("sk-test").with_base_url(server.uri());
        let adapter = OpenAIAdapter::from_client(client, "gpt-4o");

        let err = adapter.complete_json("system", "user").await.unwrap_err();
        let failure = crate::kernel::ProviderFailure::from(err);

        assert_eq!(failure.summary, "OpenAI returned 429");
        assert!(failure.detail.contains("quota exceeded"));
    }
}
