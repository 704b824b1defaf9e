//! Prompt construction. Pure and deterministic: the same articles and
//! categories always produce the same prompt.

use nd_core::{Article, CategorySet, PromptPayload};
use serde::{Deserialize, Serialize};

pub const DEFAULT_POLICY_VERSION: &str = "editorial-2024.1";

pub const DEFAULT_INSTRUCTIONS: &str = "\
You are an experienced newsletter editor putting together a personalized digest.
Write a concise, engaging summary of the supplied articles that:
- leads with the most important stories
- adds context and explains why each story matters
- keeps a friendly, conversational tone
- groups related stories into clearly headed sections
Start your reply with a single line holding the email subject, then a blank line,
then the newsletter body. Keep it email friendly.";

/// Versioned system instructions. Changing them is a configuration change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorialPolicy {
    pub version: String,
    pub instructions: String,
}

impl Default for EditorialPolicy {
    fn default() -> Self {
        Self {
            version: DEFAULT_POLICY_VERSION.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
        }
    }
}

/// What the assemble step leaves on the run record. The prompt itself is not kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssemblySummary {
    pub article_count: usize,
    pub policy_version: String,
    pub prompt_chars: usize,
}

impl From<&PromptPayload> for AssemblySummary {
    fn from(payload: &PromptPayload) -> Self {
        Self {
            article_count: payload.article_count,
            policy_version: payload.policy_version.clone(),
            prompt_chars: payload.system_instructions.len() + payload.user_content.len(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DigestAssembler {
    policy: EditorialPolicy,
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn listing_entry(number: usize, article: &Article) -> String {
    let title = single_line(&article.title);
    let description = single_line(&article.description);
    format!(
        "{}. {}\n   {}\n   Source: {}\n\n",
        number,
        if title.is_empty() { "(untitled)" } else { title.as_str() },
        if description.is_empty() { "(no description)" } else { description.as_str() },
        article.url.trim()
    )
}

impl DigestAssembler {
    pub fn new(policy: EditorialPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &EditorialPolicy {
        &self.policy
    }

    /// Category order first, then fetch order. Articles outside the set go last.
    pub fn order<'a>(articles: &'a [Article], categories: &CategorySet) -> Vec<&'a Article> {
        let mut ordered: Vec<&Article> = articles.iter().collect();
        ordered.sort_by_key(|article| categories.position(&article.category).unwrap_or(categories.len()));
        ordered
    }

    pub fn assemble(&self, articles: &[Article], categories: &CategorySet) -> PromptPayload {
        let ordered = Self::order(articles, categories);

        let mut user_content = format!(
            "Create a newsletter summary of these articles from the past week.\nCategories requested: {}\n\n",
            categories
        );
        if ordered.is_empty() {
            user_content.push_str(&format!(
                "No articles were found for the requested categories ({}).\n",
                categories
            ));
        } else {
            user_content.push_str("Articles:\n");
            for (idx, article) in ordered.iter().enumerate() {
                user_content.push_str(&listing_entry(idx + 1, article));
            }
        }

        PromptPayload {
            system_instructions: self.policy.instructions.clone(),
            user_content,
            policy_version: self.policy.version.clone(),
            article_count: ordered.len(),
            categories: categories.clone(),
        }
    }
}
