use nd_core::{CategorySet, Result};
use serde::{Deserialize, Serialize};

use crate::assembler::EditorialPolicy;
use crate::retry::{RetryPolicy, StepTimeouts};

pub const DEFAULT_CATEGORIES: [&str; 3] = ["technology", "business", "politics"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Categories used when a trigger carries none
    pub default_categories: Vec<String>,
    pub editorial_policy: EditorialPolicy,
    pub retry: RetryPolicy,
    pub timeouts: StepTimeouts,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            editorial_policy: EditorialPolicy::default(),
            retry: RetryPolicy::default(),
            timeouts: StepTimeouts::default(),
        }
    }
}

impl PipelineConfig {
    pub fn default_category_set(&self) -> Result<CategorySet> {
        CategorySet::new(&self.default_categories)
    }
}
