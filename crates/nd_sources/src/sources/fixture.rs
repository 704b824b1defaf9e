use async_trait::async_trait;
use nd_core::{Article, ArticleSource, CategorySet, Error, Result};
use std::path::Path;

/// Serves a fixed list of articles. Useful offline and in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    articles: Vec<Article>,
}

impl StaticSource {
    pub fn new(articles: Vec<Article>) -> Self {
        Self { articles }
    }

    /// Loads a JSON array of articles.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read fixture {}: {}", path.display(), e))
        })?;
        let articles: Vec<Article> = serde_json::from_str(&contents)?;
        Ok(Self::new(articles))
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }
}

#[async_trait]
impl ArticleSource for StaticSource {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn fetch(&self, categories: &CategorySet) -> Result<Vec<Article>> {
        Ok(self
            .articles
            .iter()
            .filter(|article| categories.contains(&article.category))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FIXTURE: &str = r#"[
        {"title": "Rates hold", "url": "https://b.test/1", "description": "Central bank pauses", "published_at": "2024-05-06T08:00:00Z", "category": "business"},
        {"title": "New phone", "url": "https://t.test/1", "description": "Thin again", "published_at": "2024-05-06T09:00:00Z", "category": "technology"},
        {"title": "Cup final", "url": "https://s.test/1", "published_at": "2024-05-06T10:00:00Z", "category": "sports"}
    ]"#;

    #[tokio::test]
    async fn test_fetch_filters_by_category() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FIXTURE.as_bytes()).unwrap();

        let source = StaticSource::from_json_file(file.path()).unwrap();
        assert_eq!(source.len(), 3);

        let categories = CategorySet::new(["technology", "business"]).unwrap();
        let articles = source.fetch(&categories).await.unwrap();
        let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["Rates hold", "New phone"]);
    }

    #[tokio::test]
    async fn test_fetch_may_return_nothing() {
        let source = StaticSource::default();
        let categories = CategorySet::new(["politics"]).unwrap();
        assert!(source.fetch(&categories).await.unwrap().is_empty());
    }

    #[test]
    fn test_missing_fixture_is_configuration_error() {
        let err = StaticSource::from_json_file(Path::new("/nonexistent/fixture.json")).unwrap_err();
        assert_eq!(err.kind(), nd_core::ErrorKind::Configuration);
    }
}
