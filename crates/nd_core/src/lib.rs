pub mod delivery;
pub mod error;
pub mod models;
pub mod preferences;
pub mod run;
pub mod source;
pub mod storage;
pub mod types;

pub use delivery::{DeliveryReceipt, DeliveryRequest, DeliverySink, RecipientCriteria};
pub use error::{Error, ErrorKind, Result};
pub use models::SummaryInference;
pub use preferences::{Audience, Frequency, Preference, RECOMMENDED_MIN_CATEGORIES};
pub use run::{DigestRun, RunFailure, RunStatus, StepName};
pub use source::ArticleSource;
pub use storage::{PreferenceStore, RunStore};
pub use types::{Article, Category, CategorySet, DigestResult, PromptPayload, RunId};
