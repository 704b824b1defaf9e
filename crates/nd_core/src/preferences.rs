use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::types::CategorySet;
use crate::Result;

/// Fewer categories than this is allowed but makes for a thin digest.
pub const RECOMMENDED_MIN_CATEGORIES: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    #[default]
    Weekly,
    Biweekly,
}

impl Frequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Biweekly => "biweekly",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "biweekly" | "bi-weekly" => Ok(Frequency::Biweekly),
            other => Err(Error::Configuration(format!(
                "unknown frequency '{}', expected daily, weekly or biweekly",
                other
            ))),
        }
    }
}

/// A subscriber's saved digest settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preference {
    pub principal: String,
    pub categories: CategorySet,
    pub frequency: Frequency,
    pub updated_at: DateTime<Utc>,
}

impl Preference {
    pub fn new(principal: &str, categories: CategorySet, frequency: Frequency) -> Result<Self> {
        let principal = principal.trim();
        if principal.is_empty() {
            return Err(Error::Configuration("principal must not be blank".to_string()));
        }
        Ok(Self {
            principal: principal.to_string(),
            categories,
            frequency,
            updated_at: Utc::now(),
        })
    }

    pub fn below_recommended_size(&self) -> bool {
        self.categories.len() < RECOMMENDED_MIN_CATEGORIES
    }
}

/// The subscribers a run is generated for.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Audience {
    #[serde(default)]
    pub frequency: Option<Frequency>,
    #[serde(default)]
    pub principals: Vec<String>,
}
