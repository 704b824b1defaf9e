//! The persisted record of one digest run.
//!
//! A [`DigestRun`] moves forward through [`RunStatus`] one step at a time and
//! keeps the output of every completed step, keyed by [`StepName`]. A step's
//! output is written once; resuming a run reads it back instead of redoing
//! the work.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::delivery::RecipientCriteria;
use crate::error::{Error, ErrorKind};
use crate::preferences::Audience;
use crate::types::{CategorySet, RunId};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Fetching,
    Assembling,
    Summarizing,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// Forward-only transitions; `Failed` is reachable from any non-terminal state.
    pub fn can_transition_to(self, next: RunStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            RunStatus::Failed => true,
            _ => self.next() == Some(next),
        }
    }

    /// The status that follows this one on the success path.
    pub fn next(self) -> Option<RunStatus> {
        match self {
            RunStatus::Pending => Some(RunStatus::Fetching),
            RunStatus::Fetching => Some(RunStatus::Assembling),
            RunStatus::Assembling => Some(RunStatus::Summarizing),
            RunStatus::Summarizing => Some(RunStatus::Completed),
            RunStatus::Completed | RunStatus::Failed => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunStatus::Pending => "pending",
            RunStatus::Fetching => "fetching",
            RunStatus::Assembling => "assembling",
            RunStatus::Summarizing => "summarizing",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Checkpointed units of work whose outputs are cached on the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepName {
    FetchNews,
    AssemblePrompt,
    SummarizeNews,
    DeliverDigest,
}

impl StepName {
    pub fn as_str(self) -> &'static str {
        match self {
            StepName::FetchNews => "fetch-news",
            StepName::AssemblePrompt => "assemble-prompt",
            StepName::SummarizeNews => "summarize-news",
            StepName::DeliverDigest => "deliver-digest",
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an operator needs to diagnose a failed run without re-running it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
    pub step: StepName,
    pub kind: ErrorKind,
    pub message: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestRun {
    pub id: RunId,
    pub status: RunStatus,
    pub categories: CategorySet,
    #[serde(default)]
    pub audience: Audience,
    #[serde(default)]
    pub step_results: BTreeMap<StepName, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub failure: Option<RunFailure>,
}

impl DigestRun {
    pub fn new(categories: CategorySet) -> Self {
        let now = Utc::now();
        Self {
            id: RunId::new(),
            status: RunStatus::Pending,
            categories,
            audience: Audience::default(),
            step_results: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            failure: None,
        }
    }

    pub fn with_audience(mut self, audience: Audience) -> Self {
        self.audience = audience;
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn recipients(&self) -> RecipientCriteria {
        RecipientCriteria {
            categories: self.categories.clone(),
            frequency: self.audience.frequency,
            principals: self.audience.principals.clone(),
        }
    }

    pub fn has_step(&self, step: StepName) -> bool {
        self.step_results.contains_key(&step)
    }

    /// Reads back a cached step output.
    pub fn step_output<T: DeserializeOwned>(&self, step: StepName) -> Result<Option<T>> {
        self.step_results
            .get(&step)
            .map(|value| serde_json::from_value(value.clone()))
            .transpose()
            .map_err(Error::from)
    }

    /// Caches a step output. Each step may be recorded only once.
    pub fn record_step<T: Serialize>(&mut self, step: StepName, output: &T) -> Result<()> {
        if self.has_step(step) {
            return Err(Error::Storage(format!(
                "step '{}' of run {} is already recorded",
                step, self.id
            )));
        }
        let value = serde_json::to_value(output)?;
        self.step_results.insert(step, value);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Moves the run forward. Regressions and moves out of a terminal state are rejected.
    pub fn transition(&mut self, next: RunStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Error::Storage(format!(
                "run {} cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        let now = Utc::now();
        self.status = next;
        self.updated_at = now;
        if next == RunStatus::Completed {
            self.completed_at = Some(now);
        }
        Ok(())
    }

    pub fn fail(&mut self, step: StepName, error: &Error, attempts: u32) -> Result<()> {
        self.transition(RunStatus::Failed)?;
        self.failure = Some(RunFailure {
            step,
            kind: error.kind(),
            message: error.to_string(),
            attempts,
            failed_at: self.updated_at,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run() -> DigestRun {
        DigestRun::new(CategorySet::new(["technology"]).unwrap())
    }

    #[test]
    fn test_status_only_moves_forward() {
        let mut run = run();
        assert!(run.transition(RunStatus::Assembling).is_err());
        run.transition(RunStatus::Fetching).unwrap();
        run.transition(RunStatus::Assembling).unwrap();
        assert!(run.transition(RunStatus::Fetching).is_err());
        run.transition(RunStatus::Summarizing).unwrap();
        run.transition(RunStatus::Completed).unwrap();
        assert!(run.completed_at.is_some());
        assert!(run.transition(RunStatus::Failed).is_err());
    }

    #[test]
    fn test_failed_is_absorbing() {
        let mut run = run();
        run.transition(RunStatus::Fetching).unwrap();
        run.fail(StepName::FetchNews, &Error::Fetch("timeout".into()), 3).unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        let failure = run.failure.as_ref().unwrap();
        assert_eq!(failure.kind, ErrorKind::Fetch);
        assert_eq!(failure.attempts, 3);
        assert!(run.transition(RunStatus::Assembling).is_err());
    }

    #[test]
    fn test_step_written_once() {
        let mut run = run();
        run.record_step(StepName::FetchNews, &vec!["a".to_string()]).unwrap();
        assert!(run.record_step(StepName::FetchNews, &Vec::<String>::new()).is_err());
        let cached: Vec<String> = run.step_output(StepName::FetchNews).unwrap().unwrap();
        assert_eq!(cached, vec!["a".to_string()]);
        assert!(run.step_output::<String>(StepName::SummarizeNews).unwrap().is_none());
    }

    #[test]
    fn test_step_results_serialize_with_kebab_keys() {
        let mut run = run();
        run.record_step(StepName::FetchNews, &Vec::<String>::new()).unwrap();
        let json = serde_json::to_value(&run).unwrap();
        assert!(json["step_results"].get("fetch-news").is_some());
        let back: DigestRun = serde_json::from_value(json).unwrap();
        assert_eq!(back, run);
    }
}
