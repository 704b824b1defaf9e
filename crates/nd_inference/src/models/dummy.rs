use async_trait::async_trait;
use chrono::Utc;
use nd_core::{DigestResult, PromptPayload, Result, SummaryInference};
use std::fmt;

/// Offline model that formats the prompt listing itself as the digest.
pub struct DummyModel;

impl fmt::Debug for DummyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DummyModel").finish()
    }
}

impl DummyModel {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DummyModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SummaryInference for DummyModel {
    fn name(&self) -> &str {
        "dummy"
    }

    async fn summarize(&self, payload: &PromptPayload) -> Result<DigestResult> {
        let listing = payload
            .user_content
            .lines()
            .skip_while(|line| !line.starts_with("Articles:"))
            .skip(1)
            .collect::<Vec<_>>()
            .join("\n");

        Ok(DigestResult {
            subject: format!("Your {} digest", payload.categories.joined(" & ")),
            body: format!(
                "Here are {} stories from this period.\n\n{}",
                payload.article_count,
                listing.trim()
            ),
            generated_at: Utc::now(),
            source_categories: payload.categories.clone(),
            article_count: payload.article_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nd_core::CategorySet;

    #[tokio::test]
    async fn test_dummy_model() {
        let model = DummyModel::new();
        let payload = PromptPayload {
            system_instructions: "be nice".to_string(),
            user_content: "Create a newsletter\n\nArticles:\n1. Chips\n   New fab\n   Source: https://a.test/1\n".to_string(),
            policy_version: "test".to_string(),
            article_count: 1,
            categories: CategorySet::new(["technology", "business"]).unwrap(),
        };

        let digest = model.summarize(&payload).await.unwrap();
        assert_eq!(digest.subject, "Your technology & business digest");
        assert!(digest.body.contains("1. Chips"));
        assert!(!digest.body.contains("Create a newsletter"));
        assert_eq!(digest.article_count, 1);
        assert_eq!(digest.source_categories, payload.categories);
    }
}
