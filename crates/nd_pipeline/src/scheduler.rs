use futures::future::join_all;
use nd_core::{Audience, CategorySet, DigestRun, Frequency, Preference, PreferenceStore, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::runner::{DigestRunner, TriggerEvent};

/// Subscribers of one frequency who asked for the same categories.
#[derive(Debug, Clone, PartialEq)]
pub struct Cohort {
    pub categories: CategorySet,
    pub frequency: Frequency,
    pub principals: Vec<String>,
}

/// Groups preferences by category set, keeping first-seen order.
pub fn group_cohorts(preferences: &[Preference]) -> Vec<Cohort> {
    let mut cohorts: Vec<Cohort> = Vec::new();
    for preference in preferences {
        match cohorts
            .iter_mut()
            .find(|c| c.frequency == preference.frequency && c.categories == preference.categories)
        {
            Some(cohort) => cohort.principals.push(preference.principal.clone()),
            None => cohorts.push(Cohort {
                categories: preference.categories.clone(),
                frequency: preference.frequency,
                principals: vec![preference.principal.clone()],
            }),
        }
    }
    cohorts
}

pub struct Scheduler {
    runner: Arc<DigestRunner>,
    preferences: Arc<dyn PreferenceStore>,
}

impl Scheduler {
    pub fn new(runner: Arc<DigestRunner>, preferences: Arc<dyn PreferenceStore>) -> Self {
        Self { runner, preferences }
    }

    /// Triggers and executes one run per cohort of `frequency` subscribers.
    /// Without subscribers a single run on the default categories is made.
    pub async fn tick(&self, frequency: Frequency, cancel: &CancellationToken) -> Result<Vec<DigestRun>> {
        let preferences = self.preferences.list_by_frequency(frequency).await?;
        let cohorts = group_cohorts(&preferences);

        let events: Vec<TriggerEvent> = if cohorts.is_empty() {
            vec![TriggerEvent {
                categories: None,
                audience: Audience {
                    frequency: Some(frequency),
                    principals: Vec::new(),
                },
            }]
        } else {
            cohorts
                .into_iter()
                .map(|cohort| TriggerEvent {
                    categories: Some(cohort.categories.into()),
                    audience: Audience {
                        frequency: Some(cohort.frequency),
                        principals: cohort.principals,
                    },
                })
                .collect()
        };

        tracing::info!(frequency = %frequency, runs = events.len(), subscribers = preferences.len(), "⏰ Scheduled tick");

        let mut triggered = Vec::with_capacity(events.len());
        for event in events {
            triggered.push(self.runner.trigger(event).await?);
        }

        let outcomes = join_all(triggered.iter().map(|run| self.runner.execute(run.id, cancel))).await;
        let mut finished = Vec::with_capacity(outcomes.len());
        for (run, outcome) in triggered.into_iter().zip(outcomes) {
            match outcome {
                Ok(done) => finished.push(done),
                Err(e) => {
                    tracing::warn!(run_id = %run.id, error = %e, "Scheduled run did not finish");
                    finished.push(run);
                }
            }
        }
        Ok(finished)
    }

    /// Ticks every `interval` until cancelled.
    pub async fn run_periodic(&self, frequency: Frequency, interval: Duration, cancel: &CancellationToken) -> Result<()> {
        tracing::info!(frequency = %frequency, "Running in periodic mode with {}s interval", interval.as_secs());
        loop {
            if let Err(e) = self.tick(frequency, cancel).await {
                tracing::error!(error = %e, "Scheduled tick failed");
            }
            if cancel.is_cancelled() {
                break;
            }

            tracing::info!("Waiting {}s before next digest", interval.as_secs());
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        tracing::info!("Scheduler stopped");
        Ok(())
    }
}
