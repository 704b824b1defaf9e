use async_trait::async_trait;

use crate::types::{Article, CategorySet};
use crate::Result;

#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Fetch recent articles for the given categories. An empty result is not an error.
    async fn fetch(&self, categories: &CategorySet) -> Result<Vec<Article>>;
}
