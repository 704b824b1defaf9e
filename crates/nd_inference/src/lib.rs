use nd_core::{Error, Result};
use serde::{Deserialize, Serialize};

pub mod models;
pub mod response;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    OpenAi,
    DeepSeek,
    Ollama,
    Dummy,
}

impl std::str::FromStr for ModelProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ModelProvider::OpenAi),
            "deepseek" => Ok(ModelProvider::DeepSeek),
            "ollama" => Ok(ModelProvider::Ollama),
            "dummy" => Ok(ModelProvider::Dummy),
            other => Err(Error::Configuration(format!(
                "unknown model '{}'. Available models: openai, deepseek, ollama, dummy",
                other
            ))),
        }
    }
}

impl ModelProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelProvider::OpenAi => "openai",
            ModelProvider::DeepSeek => "deepseek",
            ModelProvider::Ollama => "ollama",
            ModelProvider::Dummy => "dummy",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            ModelProvider::OpenAi => "https://api.openai.com/v1",
            ModelProvider::DeepSeek => "https://api.deepseek.com/v1",
            ModelProvider::Ollama => "http://localhost:11434/v1",
            ModelProvider::Dummy => "dummy://",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ModelProvider::OpenAi => "gpt-4o",
            ModelProvider::DeepSeek => "deepseek-chat",
            ModelProvider::Ollama => "gemma3:12b",
            ModelProvider::Dummy => "dummy",
        }
    }

    /// Environment variable holding the API key, if the provider needs one.
    pub fn default_api_key_env(self) -> Option<&'static str> {
        match self {
            ModelProvider::OpenAi => Some("OPENAI_API_KEY"),
            ModelProvider::DeepSeek => Some("DEEPSEEK_API_KEY"),
            ModelProvider::Ollama | ModelProvider::Dummy => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub provider: ModelProvider,
    pub model_name: Option<String>,
    pub base_url: Option<String>,
    pub api_key_env: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ModelProvider::OpenAi,
            model_name: None,
            base_url: None,
            api_key_env: None,
            temperature: Some(0.7),
            max_tokens: None,
        }
    }
}

impl ModelConfig {
    pub fn model_name(&self) -> String {
        self.model_name
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| self.provider.default_base_url().to_string())
    }

    pub fn api_key_env(&self) -> Option<String> {
        self.api_key_env
            .clone()
            .or_else(|| self.provider.default_api_key_env().map(str::to_string))
    }
}

pub mod prelude {
    pub use super::models::create_model;
    pub use super::{ModelConfig, ModelProvider};
    pub use nd_core::{DigestResult, Error, PromptPayload, Result, SummaryInference};
}

pub use models::create_model;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_defaults() {
        let config = ModelConfig {
            provider: ModelProvider::DeepSeek,
            ..Default::default()
        };
        assert_eq!(config.model_name(), "deepseek-chat");
        assert_eq!(config.base_url(), "https://api.deepseek.com/v1");
        assert_eq!(config.api_key_env().as_deref(), Some("DEEPSEEK_API_KEY"));

        let ollama: ModelConfig = serde_json::from_str(r#"{"provider":"ollama","model_name":"llama3"}"#).unwrap();
        assert_eq!(ollama.model_name(), "llama3");
        assert!(ollama.api_key_env().is_none());
    }

    #[test]
    fn test_unknown_provider() {
        assert!("claude".parse::<ModelProvider>().is_err());
        assert_eq!("OpenAI".parse::<ModelProvider>().unwrap(), ModelProvider::OpenAi);
    }
}
