use nd_core::{Error, Result};
use nd_inference::ModelConfig;
use nd_pipeline::{DeliveryConfig, PipelineConfig};
use nd_sources::SourceConfig;
use nd_storage::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Everything the binary needs, read from one JSON file. Missing sections
/// fall back to their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub pipeline: PipelineConfig,
    pub model: ModelConfig,
    pub source: SourceConfig,
    pub store: StoreConfig,
    pub delivery: DeliveryConfig,
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::Configuration(format!("cannot read config {}: {}", path.display(), e))
                })?;
                Ok(serde_json::from_str(&raw)?)
            }
            None => Ok(Self::default()),
        }
    }
}

/// A duration such as `90`, `30m`, `1h15m30s` or `7d`. Bare numbers are seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanDuration(pub Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let duration = match s.parse::<u64>() {
            Ok(seconds) => Duration::from_secs(seconds),
            Err(_) => humantime::parse_duration(s).map_err(|e| format!("invalid duration '{}': {}", s, e))?,
        };
        if duration.is_zero() {
            return Err("duration must be positive".to_string());
        }
        Ok(HumanDuration(duration))
    }
}
