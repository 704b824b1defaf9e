pub mod assembler;
pub mod config;
pub mod delivery;
pub mod retry;
pub mod runner;
pub mod scheduler;

pub use assembler::{AssemblySummary, DigestAssembler, EditorialPolicy};
pub use config::PipelineConfig;
pub use delivery::{create_delivery, DeliveryConfig, DeliveryKind, FileDelivery, LogDelivery, MemoryDelivery};
pub use retry::{with_retry, Attempted, RetryPolicy, StepTimeouts};
pub use runner::{DigestRunner, TriggerEvent};
pub use scheduler::{group_cohorts, Cohort, Scheduler};

pub mod prelude {
    pub use super::{DigestRunner, PipelineConfig, Scheduler, TriggerEvent};
    pub use nd_core::{CategorySet, DigestResult, DigestRun, Error, Result, RunId, RunStatus};
    pub use tokio_util::sync::CancellationToken;
}
