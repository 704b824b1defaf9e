use nd_core::{Error, Result, SummaryInference};
use std::sync::Arc;

use crate::{ModelConfig, ModelProvider};

pub mod dummy;
pub mod openai;

pub use dummy::DummyModel;
pub use openai::OpenAiCompatModel;

pub fn create_model(config: &ModelConfig) -> Result<Arc<dyn SummaryInference>> {
    match config.provider {
        ModelProvider::Dummy => Ok(Arc::new(DummyModel::new())),
        ModelProvider::OpenAi | ModelProvider::DeepSeek | ModelProvider::Ollama => {
            let api_key = match config.api_key_env() {
                Some(var) => Some(std::env::var(&var).map_err(|_| {
                    Error::Configuration(format!(
                        "{} is not set (required by the {} model)",
                        var,
                        config.provider.as_str()
                    ))
                })?),
                None => None,
            };
            let model = OpenAiCompatModel::new(config, api_key)?;
            tracing::info!(model = %model.model_name(), "🧠 Inference model configured");
            Ok(Arc::new(model))
        }
    }
}
