use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::future::try_join_all;
use nd_core::{Article, ArticleSource, Category, CategorySet, Error, Result};
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use url::Url;

use super::SourceConfig;

#[derive(Deserialize)]
struct EverythingResponse {
    status: Option<String>,
    message: Option<String>,
    #[serde(default)]
    articles: Vec<RawArticle>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArticle {
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    published_at: Option<String>,
}

/// Article source backed by a NewsAPI compatible `everything` endpoint.
pub struct NewsApiSource {
    client: Client,
    api_key: String,
    endpoint: Url,
    page_size: u32,
    lookback: Duration,
    language: Option<String>,
}

impl fmt::Debug for NewsApiSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewsApiSource")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint.as_str())
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl NewsApiSource {
    pub fn new(config: &SourceConfig, api_key: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::Configuration("news API key is empty".to_string()));
        }
        let endpoint = Url::parse(&format!("{}/everything", config.base_url.trim_end_matches('/'))).map_err(|e| {
            Error::Configuration(format!("invalid source base URL '{}': {}", config.base_url, e))
        })?;
        Ok(Self {
            client: Client::new(),
            api_key,
            endpoint,
            page_size: config.page_size.max(1),
            lookback: Duration::days(config.lookback_days.max(1)),
            language: config.language.clone(),
        })
    }

    fn request_url(&self, category: &Category, now: DateTime<Utc>) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("q", category.as_str())
                .append_pair("from", &(now - self.lookback).format("%Y-%m-%d").to_string())
                .append_pair("sortBy", "publishedAt")
                .append_pair("pageSize", &self.page_size.to_string());
            if let Some(language) = &self.language {
                query.append_pair("language", language);
            }
        }
        url
    }

    async fn fetch_category(&self, category: &Category) -> Result<Vec<Article>> {
        let url = self.request_url(category, Utc::now());
        tracing::debug!(category = %category, "📡 Requesting articles");

        let response = self
            .client
            .get(url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| Error::Fetch(format!("request for '{}' failed: {}", category, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Fetch(format!("reading '{}' response failed: {}", category, e)))?;
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(Error::Configuration(format!(
                "news API rejected the key for '{}' ({})",
                category, status
            )));
        }
        if !status.is_success() {
            return Err(Error::Fetch(format!(
                "news API returned {} for '{}': {}",
                status, category, body
            )));
        }

        parse_response(&body, category, Utc::now())
    }
}

/// Decodes one `everything` response body into articles tagged with `category`.
pub(crate) fn parse_response(
    body: &str,
    category: &Category,
    fetched_at: DateTime<Utc>,
) -> Result<Vec<Article>> {
    let response: EverythingResponse = serde_json::from_str(body)
        .map_err(|e| Error::Fetch(format!("undecodable response for '{}': {}", category, e)))?;

    if response.status.as_deref() == Some("error") {
        return Err(Error::Fetch(format!(
            "news API error for '{}': {}",
            category,
            response.message.unwrap_or_else(|| "unknown error".to_string())
        )));
    }

    let mut articles = Vec::with_capacity(response.articles.len());
    for raw in response.articles {
        let (Some(title), Some(url)) = (raw.title, raw.url) else {
            tracing::warn!(category = %category, "Skipping article without title or url");
            continue;
        };
        let published_at = raw
            .published_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or(fetched_at);
        articles.push(Article {
            title,
            url,
            description: raw.description.unwrap_or_default(),
            published_at,
            category: category.clone(),
        });
    }
    Ok(articles)
}

#[async_trait]
impl ArticleSource for NewsApiSource {
    fn name(&self) -> &str {
        "newsapi"
    }

    async fn fetch(&self, categories: &CategorySet) -> Result<Vec<Article>> {
        let batches = try_join_all(categories.iter().map(|c| self.fetch_category(c))).await?;
        let articles: Vec<Article> = batches.into_iter().flatten().collect();
        tracing::info!(
            categories = %categories,
            count = articles.len(),
            "📰 Fetched articles"
        );
        Ok(articles)
    }
}
