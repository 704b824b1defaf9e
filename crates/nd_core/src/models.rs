use async_trait::async_trait;

use crate::types::{DigestResult, PromptPayload};
use crate::Result;

#[async_trait]
pub trait SummaryInference: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Turn an assembled prompt into a digest with a subject and a body
    async fn summarize(&self, payload: &PromptPayload) -> Result<DigestResult>;
}
