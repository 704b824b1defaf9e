use nd_core::{ArticleSource, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

pub mod fixture;
pub mod newsapi;

pub use fixture::StaticSource;
pub use newsapi::NewsApiSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceProvider {
    NewsApi,
    Fixture,
}

impl std::str::FromStr for SourceProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "newsapi" => Ok(SourceProvider::NewsApi),
            "fixture" => Ok(SourceProvider::Fixture),
            other => Err(Error::Configuration(format!(
                "unknown article source '{}'. Available sources: newsapi, fixture",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub provider: SourceProvider,
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub page_size: u32,
    pub lookback_days: i64,
    pub language: Option<String>,
    pub fixture_path: Option<PathBuf>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            provider: SourceProvider::NewsApi,
            base_url: "https://newsapi.org/v2/".to_string(),
            api_key_env: "NEWS_API_KEY".to_string(),
            page_size: 5,
            lookback_days: 7,
            language: Some("en".to_string()),
            fixture_path: None,
        }
    }
}

pub fn create_source(config: &SourceConfig) -> Result<Arc<dyn ArticleSource>> {
    match config.provider {
        SourceProvider::NewsApi => {
            let api_key = std::env::var(&config.api_key_env).map_err(|_| {
                Error::Configuration(format!("{} is not set", config.api_key_env))
            })?;
            Ok(Arc::new(NewsApiSource::new(config, api_key)?))
        }
        SourceProvider::Fixture => {
            let path = config.fixture_path.as_ref().ok_or_else(|| {
                Error::Configuration("fixture source requires fixture_path".to_string())
            })?;
            Ok(Arc::new(StaticSource::from_json_file(path)?))
        }
    }
}
