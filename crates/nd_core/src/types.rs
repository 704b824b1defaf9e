use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;
use crate::Result;

/// A topic tag, normalized to trimmed lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Category(String);

impl Category {
    pub fn new(tag: &str) -> Result<Self> {
        let normalized = tag.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(Error::Configuration("category tag must not be blank".to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Category {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.0
    }
}

/// Ordered, deduplicated, non-empty set of categories scoping one run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct CategorySet(Vec<Category>);

impl CategorySet {
    /// Builds a set from raw tags. Duplicates keep their first position.
    pub fn new<I, S>(tags: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut categories: Vec<Category> = Vec::new();
        for tag in tags {
            let category = Category::new(tag.as_ref())?;
            if !categories.contains(&category) {
                categories.push(category);
            }
        }
        if categories.is_empty() {
            return Err(Error::Configuration("category set must not be empty".to_string()));
        }
        Ok(Self(categories))
    }

    /// Parses a comma separated list such as `technology,business`.
    pub fn parse_list(list: &str) -> Result<Self> {
        Self::new(list.split(',').filter(|tag| !tag.trim().is_empty()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, category: &Category) -> bool {
        self.0.contains(category)
    }

    /// Position of `category` in the set, used as the primary sort key.
    pub fn position(&self, category: &Category) -> Option<usize> {
        self.0.iter().position(|c| c == category)
    }

    pub fn joined(&self, separator: &str) -> String {
        self.0
            .iter()
            .map(Category::as_str)
            .collect::<Vec<_>>()
            .join(separator)
    }
}

impl fmt::Display for CategorySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined(", "))
    }
}

impl TryFrom<Vec<String>> for CategorySet {
    type Error = Error;

    fn try_from(value: Vec<String>) -> Result<Self> {
        Self::new(value)
    }
}

impl From<CategorySet> for Vec<String> {
    fn from(set: CategorySet) -> Self {
        set.0.into_iter().map(String::from).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    pub published_at: DateTime<Utc>,
    pub category: Category,
}

/// Prompt sent to the inference boundary, plus the metadata the result needs.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptPayload {
    pub system_instructions: String,
    pub user_content: String,
    pub policy_version: String,
    pub article_count: usize,
    pub categories: CategorySet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestResult {
    pub subject: String,
    pub body: String,
    pub generated_at: DateTime<Utc>,
    pub source_categories: CategorySet,
    pub article_count: usize,
}

impl DigestResult {
    /// Minimal digest for a run whose sources returned nothing.
    pub fn empty(categories: &CategorySet) -> Self {
        Self {
            subject: format!("No new stories this time: {}", categories),
            body: format!(
                "No articles were available for the requested categories ({}). \
                 We'll be back with a full digest next time.",
                categories
            ),
            generated_at: Utc::now(),
            source_categories: categories.clone(),
            article_count: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RunId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::Configuration(format!("invalid run id '{}': {}", s, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_set_dedup_preserves_order() {
        let set = CategorySet::new(["Technology", "business", "technology ", "politics"]).unwrap();
        assert_eq!(set.joined(","), "technology,business,politics");
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_category_set_rejects_empty() {
        let err = CategorySet::new(Vec::<String>::new()).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Configuration);
        assert!(CategorySet::parse_list(" , ,").is_err());
        assert!(CategorySet::new(["  "]).is_err());
    }

    #[test]
    fn test_category_set_deserialize_validates() {
        let set: CategorySet = serde_json::from_str(r#"["science","Science","health"]"#).unwrap();
        assert_eq!(set.joined(","), "science,health");
        assert!(serde_json::from_str::<CategorySet>("[]").is_err());
    }

    #[test]
    fn test_article_description_defaults() {
        let article: Article = serde_json::from_str(
            r#"{"title":"t","url":"https://example.com/a","published_at":"2024-05-01T10:00:00Z","category":"Business"}"#,
        )
        .unwrap();
        assert_eq!(article.description, "");
        assert_eq!(article.category.as_str(), "business");
    }

    #[test]
    fn test_empty_digest_mentions_categories() {
        let set = CategorySet::new(["technology", "business"]).unwrap();
        let digest = DigestResult::empty(&set);
        assert_eq!(digest.article_count, 0);
        assert!(digest.body.contains("No articles were available"));
        assert!(digest.body.contains("technology, business"));
    }

    #[test]
    fn test_run_id_round_trips_through_display() {
        let id = RunId::new();
        assert_eq!(id.to_string().parse::<RunId>().unwrap(), id);
        assert!("not-a-uuid".parse::<RunId>().is_err());
    }
}
