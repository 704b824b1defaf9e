// Collaborator doubles shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use nd_core::{
    Article, ArticleSource, Category, CategorySet, DeliveryReceipt, DeliveryRequest, DeliverySink,
    DigestResult, Error, PromptPayload, Result, RunStore, SummaryInference,
};
use nd_inference::response::{extract_completion, split_digest};
use nd_pipeline::{DigestRunner, MemoryDelivery, PipelineConfig, RetryPolicy};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

pub fn article(title: &str, category: &str) -> Article {
    Article {
        title: title.to_string(),
        url: format!("https://news.test/{}", title.to_lowercase().replace(' ', "-")),
        description: format!("What happened with {}", title),
        published_at: Utc.with_ymd_and_hms(2024, 5, 6, 9, 30, 0).unwrap(),
        category: Category::new(category).unwrap(),
    }
}

/// Five articles spread over technology, business and politics, in fetch order.
pub fn five_articles() -> Vec<Article> {
    vec![
        article("Senate Vote", "politics"),
        article("Chip Shortage", "technology"),
        article("Rate Cut", "business"),
        article("New Phone", "technology"),
        article("Merger Talks", "business"),
    ]
}

/// Serves fixed articles and counts fetches. Can fail a number of times first.
pub struct CountingSource {
    articles: Vec<Article>,
    failures_left: AtomicU32,
    failure: fn() -> Error,
    pub calls: AtomicU32,
}

impl CountingSource {
    pub fn new(articles: Vec<Article>) -> Self {
        Self {
            articles,
            failures_left: AtomicU32::new(0),
            failure: || Error::Fetch("upstream unreachable".to_string()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing(times: u32, failure: fn() -> Error) -> Self {
        Self {
            articles: Vec::new(),
            failures_left: AtomicU32::new(times),
            failure,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArticleSource for CountingSource {
    fn name(&self) -> &str {
        "counting"
    }

    async fn fetch(&self, categories: &CategorySet) -> Result<Vec<Article>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err((self.failure)());
        }
        Ok(self
            .articles
            .iter()
            .filter(|a| categories.contains(&a.category))
            .cloned()
            .collect())
    }
}

/// Answers every prompt with a canned chat-completions body, parsed the way
/// the real client parses it.
pub struct ScriptedModel {
    body: String,
    pub calls: AtomicU32,
    pub prompts: Mutex<Vec<PromptPayload>>,
}

impl ScriptedModel {
    pub fn new(body: &str) -> Self {
        Self {
            body: body.to_string(),
            calls: AtomicU32::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(content: &str) -> Self {
        let body = serde_json::json!({
            "id": "chatcmpl-test",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
        });
        Self::new(&body.to_string())
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<PromptPayload> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl SummaryInference for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn summarize(&self, payload: &PromptPayload) -> Result<DigestResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(payload.clone());
        let content = extract_completion(&self.body)?;
        let (subject, body) = split_digest(&content)?;
        Ok(DigestResult {
            subject,
            body,
            generated_at: Utc::now(),
            source_categories: payload.categories.clone(),
            article_count: payload.article_count,
        })
    }
}

/// Model that always reports the service as unavailable.
#[derive(Default)]
pub struct UnavailableModel {
    pub calls: AtomicU32,
}

#[async_trait]
impl SummaryInference for UnavailableModel {
    fn name(&self) -> &str {
        "unavailable"
    }

    async fn summarize(&self, _payload: &PromptPayload) -> Result<DigestResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::InferenceUnavailable("503 Service Unavailable".to_string()))
    }
}

/// Sink that rejects the first `failures` deliveries.
pub struct FlakySink {
    failures_left: AtomicU32,
    pub calls: AtomicU32,
}

impl FlakySink {
    pub fn new(failures: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl DeliverySink for FlakySink {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn deliver(&self, _request: &DeliveryRequest) -> Result<DeliveryReceipt> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(Error::Delivery("mail relay refused connection".to_string()));
        }
        Ok(DeliveryReceipt {
            sink: "flaky".to_string(),
            reference: None,
            delivered_at: Utc::now(),
        })
    }
}

pub fn fast_config() -> PipelineConfig {
    PipelineConfig {
        retry: RetryPolicy::immediate(3),
        ..Default::default()
    }
}

pub fn runner_with(
    source: Arc<dyn ArticleSource>,
    model: Arc<dyn SummaryInference>,
    store: Arc<dyn RunStore>,
    delivery: Arc<dyn DeliverySink>,
) -> DigestRunner {
    DigestRunner::new(fast_config(), source, model, store, delivery).unwrap()
}

pub fn memory_delivery() -> Arc<MemoryDelivery> {
    Arc::new(MemoryDelivery::new())
}
