use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::preferences::Frequency;
use crate::types::{CategorySet, DigestResult, RunId};
use crate::Result;

/// Who a digest is meant for. Resolving this to addresses is the sink's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientCriteria {
    pub categories: CategorySet,
    #[serde(default)]
    pub frequency: Option<Frequency>,
    #[serde(default)]
    pub principals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryRequest {
    pub run_id: RunId,
    pub subject: String,
    pub body: String,
    pub recipients: RecipientCriteria,
}

impl DeliveryRequest {
    pub fn new(run_id: RunId, digest: &DigestResult, recipients: RecipientCriteria) -> Self {
        Self {
            run_id,
            subject: digest.subject.clone(),
            body: digest.body.clone(),
            recipients,
        }
    }
}

/// Acknowledgement cached on the run once a sink accepted the digest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub sink: String,
    pub reference: Option<String>,
    pub delivered_at: chrono::DateTime<chrono::Utc>,
}

#[async_trait]
pub trait DeliverySink: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, request: &DeliveryRequest) -> Result<DeliveryReceipt>;
}
