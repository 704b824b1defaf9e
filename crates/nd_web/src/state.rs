use nd_core::{DigestRun, Error, PreferenceStore, Result, RunId};
use nd_pipeline::DigestRunner;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Runs started over HTTP that have not been collected yet.
#[derive(Clone, Default)]
pub struct BackgroundRuns {
    tasks: Arc<Mutex<JoinSet<Result<DigestRun>>>>,
}

impl BackgroundRuns {
    pub async fn start(&self, runner: &Arc<DigestRunner>, id: RunId, cancel: CancellationToken) {
        let mut tasks = self.tasks.lock().await;
        // Finished runs already logged their outcome.
        while tasks.try_join_next().is_some() {}
        tasks.spawn(Arc::clone(runner).execute_detached(id, cancel));
    }

    /// Waits for every run still in flight and returns their outcomes.
    pub async fn drain(&self) -> Vec<Result<DigestRun>> {
        let mut tasks = self.tasks.lock().await;
        let mut outcomes = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            outcomes.push(joined.unwrap_or_else(|e| {
                tracing::error!(error = %e, "Background run task aborted");
                Err(Error::Io(std::io::Error::other(e)))
            }));
        }
        outcomes
    }
}

pub struct AppState {
    pub runner: Arc<DigestRunner>,
    pub preferences: Arc<dyn PreferenceStore>,
    /// Parent token of every run started over HTTP
    pub shutdown: CancellationToken,
    pub background: BackgroundRuns,
}

impl AppState {
    pub fn new(runner: Arc<DigestRunner>, preferences: Arc<dyn PreferenceStore>) -> Self {
        Self {
            runner,
            preferences,
            shutdown: CancellationToken::new(),
            background: BackgroundRuns::default(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }
}
