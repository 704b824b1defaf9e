use async_trait::async_trait;

use crate::preferences::{Frequency, Preference};
use crate::run::DigestRun;
use crate::types::RunId;
use crate::Result;

#[async_trait]
pub trait RunStore: Send + Sync {
    /// Persist a newly created run
    async fn insert_run(&self, run: &DigestRun) -> Result<()>;

    /// Overwrite the stored record of an existing run
    async fn save_run(&self, run: &DigestRun) -> Result<()>;

    async fn load_run(&self, id: RunId) -> Result<Option<DigestRun>>;

    /// All runs, oldest first
    async fn list_runs(&self) -> Result<Vec<DigestRun>>;
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Insert or replace the preference of `preference.principal` as a whole
    async fn save_preference(&self, preference: &Preference) -> Result<()>;

    async fn get_preference(&self, principal: &str) -> Result<Option<Preference>>;

    async fn list_by_frequency(&self, frequency: Frequency) -> Result<Vec<Preference>>;
}
