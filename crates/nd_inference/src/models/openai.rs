use async_trait::async_trait;
use chrono::Utc;
use nd_core::{DigestResult, Error, PromptPayload, Result, SummaryInference};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::fmt;
use std::time::Instant;
use url::Url;

use crate::response::{extract_completion, split_digest};
use crate::{ModelConfig, ModelProvider};

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// Client for any chat-completions endpoint speaking the OpenAI wire format.
pub struct OpenAiCompatModel {
    client: Client,
    provider: ModelProvider,
    api_key: Option<String>,
    endpoint: Url,
    model_name: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl fmt::Debug for OpenAiCompatModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiCompatModel")
            .field("client", &"<reqwest::Client>")
            .field("provider", &self.provider)
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint.as_str())
            .field("model_name", &self.model_name)
            .finish()
    }
}

impl OpenAiCompatModel {
    pub fn new(config: &ModelConfig, api_key: Option<String>) -> Result<Self> {
        let base_url = config.base_url();
        let endpoint = Url::parse(&format!("{}/chat/completions", base_url.trim_end_matches('/')))
            .map_err(|e| Error::Configuration(format!("invalid model base URL '{}': {}", base_url, e)))?;
        Ok(Self {
            client: Client::new(),
            provider: config.provider,
            api_key,
            endpoint,
            model_name: config.model_name(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    fn build_request<'a>(&'a self, payload: &'a PromptPayload) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model_name,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &payload.system_instructions,
                },
                ChatMessage {
                    role: "user",
                    content: &payload.user_content,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

/// Maps a non-success HTTP status onto the error taxonomy.
fn classify_status(status: StatusCode, body: &str) -> Error {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Error::InferenceUnavailable(format!("inference service returned {}: {}", status, body))
    } else {
        Error::Configuration(format!("inference request rejected with {}: {}", status, body))
    }
}

#[async_trait]
impl SummaryInference for OpenAiCompatModel {
    fn name(&self) -> &str {
        self.provider.as_str()
    }

    async fn summarize(&self, payload: &PromptPayload) -> Result<DigestResult> {
        let start = Instant::now();
        let mut request = self.client.post(self.endpoint.clone()).json(&self.build_request(payload));
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::InferenceUnavailable(format!("inference request failed: {}", e)))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::InferenceUnavailable(format!("reading inference response failed: {}", e)))?;

        if !status.is_success() {
            tracing::warn!(status = %status, model = %self.model_name, "Inference API error");
            return Err(classify_status(status, &body));
        }

        let content = extract_completion(&body)?;
        let (subject, digest_body) = split_digest(&content)?;
        tracing::debug!(
            model = %self.model_name,
            duration_ms = start.elapsed().as_millis() as u64,
            chars = content.len(),
            "✨ Digest generated"
        );

        Ok(DigestResult {
            subject,
            body: digest_body,
            generated_at: Utc::now(),
            source_categories: payload.categories.clone(),
            article_count: payload.article_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nd_core::{CategorySet, ErrorKind};

    fn payload() -> PromptPayload {
        PromptPayload {
            system_instructions: "You are an editor.".to_string(),
            user_content: "Articles:\n1. Chips".to_string(),
            policy_version: "v1".to_string(),
            article_count: 1,
            categories: CategorySet::new(["technology"]).unwrap(),
        }
    }

    #[test]
    fn test_request_shape() {
        let config = ModelConfig {
            model_name: Some("gpt-4o-mini".to_string()),
            max_tokens: Some(800),
            ..Default::default()
        };
        let model = OpenAiCompatModel::new(&config, Some("sk-test".to_string())).unwrap();
        assert_eq!(model.endpoint.as_str(), "https://api.openai.com/v1/chat/completions");

        let payload = payload();
        let json = serde_json::to_value(model.build_request(&payload)).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "You are an editor.");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["max_tokens"], 800);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let config = ModelConfig {
            provider: ModelProvider::Ollama,
            base_url: Some("http://gpu-box:11434/v1/".to_string()),
            ..Default::default()
        };
        let model = OpenAiCompatModel::new(&config, None).unwrap();
        assert_eq!(model.endpoint.as_str(), "http://gpu-box:11434/v1/chat/completions");
        assert!(format!("{:?}", model).contains("gemma3:12b"));
    }

    #[test]
    fn test_debug_redacts_key() {
        let model = OpenAiCompatModel::new(&ModelConfig::default(), Some("sk-secret".to_string())).unwrap();
        assert!(!format!("{:?}", model).contains("sk-secret"));
    }

    #[test]
    fn test_status_classification() {
        assert_eq!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").kind(), ErrorKind::InferenceUnavailable);
        assert_eq!(classify_status(StatusCode::BAD_GATEWAY, "").kind(), ErrorKind::InferenceUnavailable);
        assert_eq!(classify_status(StatusCode::UNAUTHORIZED, "").kind(), ErrorKind::Configuration);
        assert_eq!(classify_status(StatusCode::BAD_REQUEST, "").kind(), ErrorKind::Configuration);
    }
}
