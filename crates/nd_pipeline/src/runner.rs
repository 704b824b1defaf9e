//! Durable digest runs.
//!
//! [`DigestRunner`] drives a [`DigestRun`] through its states one step at a
//! time and saves the record after every step. Step outputs cached on the
//! record are never recomputed, so a run interrupted at any point picks up
//! where it stopped the next time it is executed.

use futures::future::join_all;
use nd_core::{
    Article, ArticleSource, Audience, CategorySet, DeliveryReceipt, DeliveryRequest, DeliverySink,
    DigestResult, DigestRun, Error, PromptPayload, Result, RunId, RunStatus, RunStore, StepName,
    SummaryInference,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::assembler::{AssemblySummary, DigestAssembler};
use crate::config::PipelineConfig;
use crate::retry::{with_retry, Attempted};

/// Request to start a digest run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    /// `None` selects the configured default categories
    #[serde(default)]
    pub categories: Option<Vec<String>>,
    #[serde(default)]
    pub audience: Audience,
}

impl TriggerEvent {
    pub fn for_categories<I, S>(categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            categories: Some(categories.into_iter().map(Into::into).collect()),
            audience: Audience::default(),
        }
    }

    pub fn with_audience(mut self, audience: Audience) -> Self {
        self.audience = audience;
        self
    }
}

pub struct DigestRunner {
    config: PipelineConfig,
    default_categories: CategorySet,
    assembler: DigestAssembler,
    source: Arc<dyn ArticleSource>,
    model: Arc<dyn SummaryInference>,
    store: Arc<dyn RunStore>,
    delivery: Arc<dyn DeliverySink>,
}

impl DigestRunner {
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn ArticleSource>,
        model: Arc<dyn SummaryInference>,
        store: Arc<dyn RunStore>,
        delivery: Arc<dyn DeliverySink>,
    ) -> Result<Self> {
        let default_categories = config.default_category_set()?;
        let assembler = DigestAssembler::new(config.editorial_policy.clone());
        tracing::info!(
            source = source.name(),
            model = model.name(),
            delivery = delivery.name(),
            defaults = %default_categories,
            "🗞️ Digest runner ready"
        );
        Ok(Self {
            config,
            default_categories,
            assembler,
            source,
            model,
            store,
            delivery,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn default_categories(&self) -> &CategorySet {
        &self.default_categories
    }

    /// Creates and persists a `pending` run.
    pub async fn trigger(&self, event: TriggerEvent) -> Result<DigestRun> {
        let categories = match event.categories {
            Some(tags) => CategorySet::new(tags)?,
            None => self.default_categories.clone(),
        };
        let run = DigestRun::new(categories).with_audience(event.audience);
        self.store.insert_run(&run).await?;
        tracing::info!(run_id = %run.id, categories = %run.categories, "🚀 Digest run triggered");
        Ok(run)
    }

    pub async fn load(&self, id: RunId) -> Result<DigestRun> {
        self.store.load_run(id).await?.ok_or(Error::RunNotFound(id))
    }

    pub async fn list(&self) -> Result<Vec<DigestRun>> {
        self.store.list_runs().await
    }

    /// Cached digest of a completed run.
    pub async fn result(&self, id: RunId) -> Result<Option<DigestResult>> {
        let run = self.load(id).await?;
        if run.status != RunStatus::Completed {
            return Ok(None);
        }
        run.step_output(StepName::SummarizeNews)
    }

    /// Performs exactly one transition of the run and persists it.
    pub async fn advance(&self, id: RunId, cancel: &CancellationToken) -> Result<DigestRun> {
        let mut run = self.load(id).await?;
        self.advance_run(&mut run, cancel).await?;
        Ok(run)
    }

    /// Advances the run until it is completed or failed. Terminal runs are
    /// returned as stored.
    pub async fn execute(&self, id: RunId, cancel: &CancellationToken) -> Result<DigestRun> {
        let mut run = self.load(id).await?;
        if run.is_terminal() {
            tracing::debug!(run_id = %run.id, status = %run.status, "Run already finished");
            return Ok(run);
        }

        while !run.is_terminal() {
            self.advance_run(&mut run, cancel).await?;
        }

        match &run.failure {
            Some(failure) => tracing::error!(
                run_id = %run.id,
                step = %failure.step,
                kind = %failure.kind,
                attempts = failure.attempts,
                "❌ Digest run failed: {}",
                failure.message
            ),
            None => tracing::info!(run_id = %run.id, "✅ Digest run completed"),
        }
        Ok(run)
    }

    /// Executes every stored run that has not reached a terminal state.
    pub async fn resume_incomplete(&self, cancel: &CancellationToken) -> Result<Vec<DigestRun>> {
        let pending: Vec<RunId> = self
            .store
            .list_runs()
            .await?
            .into_iter()
            .filter(|run| !run.is_terminal())
            .map(|run| run.id)
            .collect();
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        tracing::info!(count = pending.len(), "🔄 Resuming unfinished digest runs");
        let outcomes = join_all(pending.iter().map(|id| self.execute(*id, cancel))).await;

        let mut resumed = Vec::with_capacity(outcomes.len());
        for (id, outcome) in pending.iter().zip(outcomes) {
            match outcome {
                Ok(run) => resumed.push(run),
                Err(e) => tracing::warn!(run_id = %id, error = %e, "Run could not be resumed"),
            }
        }
        Ok(resumed)
    }

    /// Executes a run with nobody awaiting the outcome, so every error that
    /// stops it short of a terminal state is logged here.
    pub async fn execute_detached(self: Arc<Self>, id: RunId, cancel: CancellationToken) -> Result<DigestRun> {
        let outcome = self.execute(id, &cancel).await;
        match &outcome {
            Ok(_) => {}
            Err(Error::Cancelled(_)) => {
                tracing::warn!(run_id = %id, "🛑 Background run cancelled, it will resume on the next start")
            }
            Err(e) => tracing::error!(
                run_id = %id,
                kind = %e.kind(),
                error = %e,
                "❌ Background run stopped before finishing"
            ),
        }
        outcome
    }

    async fn advance_run(&self, run: &mut DigestRun, cancel: &CancellationToken) -> Result<()> {
        if run.is_terminal() {
            return Ok(());
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled(run.id));
        }

        let from = run.status;
        match from {
            RunStatus::Pending => run.transition(RunStatus::Fetching)?,
            RunStatus::Fetching => self.fetch_step(run, cancel).await?,
            RunStatus::Assembling => self.assemble_step(run)?,
            RunStatus::Summarizing => self.summarize_step(run, cancel).await?,
            RunStatus::Completed | RunStatus::Failed => {}
        }

        self.store.save_run(run).await?;
        tracing::info!(run_id = %run.id, from = %from, status = %run.status, "Run advanced");
        Ok(())
    }

    fn cached_articles(&self, run: &DigestRun) -> Result<Vec<Article>> {
        run.step_output(StepName::FetchNews)?.ok_or_else(|| {
            Error::Storage(format!("run {} has no cached '{}' output", run.id, StepName::FetchNews))
        })
    }

    fn payload(&self, run: &DigestRun) -> Result<PromptPayload> {
        let articles = self.cached_articles(run)?;
        Ok(self.assembler.assemble(&articles, &run.categories))
    }

    /// Records the failure on the run, or propagates cancellation untouched.
    fn settle<T>(&self, run: &mut DigestRun, step: StepName, attempted: Attempted<T>) -> Result<Option<T>> {
        match attempted.result {
            Ok(value) => Ok(Some(value)),
            Err(Error::Cancelled(id)) => Err(Error::Cancelled(id)),
            Err(e) => {
                tracing::warn!(
                    run_id = %run.id,
                    step = %step,
                    attempts = attempted.attempts,
                    error = %e,
                    "Step gave up"
                );
                run.fail(step, &e, attempted.attempts)?;
                Ok(None)
            }
        }
    }

    async fn fetch_step(&self, run: &mut DigestRun, cancel: &CancellationToken) -> Result<()> {
        if !run.has_step(StepName::FetchNews) {
            let categories = run.categories.clone();
            let attempted = with_retry(
                &self.config.retry,
                self.config.timeouts.for_step(StepName::FetchNews),
                run.id,
                StepName::FetchNews,
                cancel,
                |_| self.source.fetch(&categories),
            )
            .await;

            let Some(articles) = self.settle(run, StepName::FetchNews, attempted)? else {
                return Ok(());
            };
            if cancel.is_cancelled() {
                return Err(Error::Cancelled(run.id));
            }
            tracing::debug!(run_id = %run.id, articles = articles.len(), "📰 Articles fetched");
            run.record_step(StepName::FetchNews, &articles)?;
        }
        run.transition(RunStatus::Assembling)
    }

    /// Fails the run when a cached step output can no longer be read back.
    fn reject_cache(&self, run: &mut DigestRun, step: StepName, error: Error) -> Result<()> {
        tracing::error!(run_id = %run.id, step = %step, error = %error, "Cached step output unreadable");
        run.fail(step, &error, 1)
    }

    fn assemble_step(&self, run: &mut DigestRun) -> Result<()> {
        let payload = match self.payload(run) {
            Ok(payload) => payload,
            Err(e) => return self.reject_cache(run, StepName::AssemblePrompt, e),
        };
        tracing::debug!(
            run_id = %run.id,
            articles = payload.article_count,
            prompt_chars = payload.user_content.len(),
            policy = %payload.policy_version,
            "Prompt assembled"
        );
        if !run.has_step(StepName::AssemblePrompt) {
            run.record_step(StepName::AssemblePrompt, &AssemblySummary::from(&payload))?;
        }
        run.transition(RunStatus::Summarizing)
    }

    async fn summarize_step(&self, run: &mut DigestRun, cancel: &CancellationToken) -> Result<()> {
        let cached = match run.step_output::<DigestResult>(StepName::SummarizeNews) {
            Ok(cached) => cached,
            Err(e) => return self.reject_cache(run, StepName::SummarizeNews, e),
        };
        let digest = match cached {
            Some(digest) => digest,
            None => {
                let Some(digest) = self.summarize(run, cancel).await? else {
                    return Ok(());
                };
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled(run.id));
                }
                run.record_step(StepName::SummarizeNews, &digest)?;
                // Persisted before delivery; a failed hand-off must not repeat inference.
                self.store.save_run(run).await?;
                digest
            }
        };

        if !run.has_step(StepName::DeliverDigest) {
            let Some(receipt) = self.deliver(run, &digest, cancel).await? else {
                return Ok(());
            };
            if cancel.is_cancelled() {
                return Err(Error::Cancelled(run.id));
            }
            run.record_step(StepName::DeliverDigest, &receipt)?;
        }
        run.transition(RunStatus::Completed)
    }

    async fn summarize(&self, run: &mut DigestRun, cancel: &CancellationToken) -> Result<Option<DigestResult>> {
        let payload = match self.payload(run) {
            Ok(payload) => payload,
            Err(e) => {
                self.reject_cache(run, StepName::SummarizeNews, e)?;
                return Ok(None);
            }
        };
        if payload.article_count == 0 {
            tracing::info!(run_id = %run.id, "No articles to summarize, skipping inference");
            return Ok(Some(DigestResult::empty(&run.categories)));
        }

        let attempted = with_retry(
            &self.config.retry,
            self.config.timeouts.for_step(StepName::SummarizeNews),
            run.id,
            StepName::SummarizeNews,
            cancel,
            |_| self.model.summarize(&payload),
        )
        .await;

        Ok(self.settle(run, StepName::SummarizeNews, attempted)?.map(|mut digest| {
            digest.article_count = payload.article_count;
            digest.source_categories = payload.categories.clone();
            digest
        }))
    }

    async fn deliver(
        &self,
        run: &mut DigestRun,
        digest: &DigestResult,
        cancel: &CancellationToken,
    ) -> Result<Option<DeliveryReceipt>> {
        let request = DeliveryRequest::new(run.id, digest, run.recipients());
        let attempted = with_retry(
            &self.config.retry,
            self.config.timeouts.for_step(StepName::DeliverDigest),
            run.id,
            StepName::DeliverDigest,
            cancel,
            |_| self.delivery.deliver(&request),
        )
        .await;
        self.settle(run, StepName::DeliverDigest, attempted)
    }
}
