use async_trait::async_trait;
use chrono::Utc;
use nd_core::{DeliveryReceipt, DeliveryRequest, DeliverySink, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryKind {
    Log,
    File,
    Memory,
}

impl FromStr for DeliveryKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "log" => Ok(DeliveryKind::Log),
            "file" => Ok(DeliveryKind::File),
            "memory" => Ok(DeliveryKind::Memory),
            other => Err(Error::Configuration(format!("unknown delivery sink '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    pub kind: DeliveryKind,
    /// Output directory for the file sink
    pub directory: PathBuf,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            kind: DeliveryKind::Log,
            directory: PathBuf::from("digests"),
        }
    }
}

pub fn create_delivery(config: &DeliveryConfig) -> Arc<dyn DeliverySink> {
    match config.kind {
        DeliveryKind::Log => Arc::new(LogDelivery),
        DeliveryKind::File => Arc::new(FileDelivery::new(config.directory.clone())),
        DeliveryKind::Memory => Arc::new(MemoryDelivery::new()),
    }
}

/// Writes the digest to the tracing output.
#[derive(Debug, Default)]
pub struct LogDelivery;

#[async_trait]
impl DeliverySink for LogDelivery {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, request: &DeliveryRequest) -> Result<DeliveryReceipt> {
        tracing::info!(
            run_id = %request.run_id,
            categories = %request.recipients.categories,
            frequency = ?request.recipients.frequency,
            principals = request.recipients.principals.len(),
            "📬 {}\n\n{}",
            request.subject,
            request.body
        );
        Ok(DeliveryReceipt {
            sink: self.name().to_string(),
            reference: None,
            delivered_at: Utc::now(),
        })
    }
}

/// Writes one markdown file per run into a directory.
#[derive(Debug)]
pub struct FileDelivery {
    directory: PathBuf,
}

impl FileDelivery {
    pub fn new(directory: PathBuf) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl DeliverySink for FileDelivery {
    fn name(&self) -> &str {
        "file"
    }

    async fn deliver(&self, request: &DeliveryRequest) -> Result<DeliveryReceipt> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| Error::Delivery(format!("cannot create {}: {}", self.directory.display(), e)))?;

        let path = self.directory.join(format!("{}.md", request.run_id));
        let contents = format!(
            "# {}\n\n_Categories: {}_\n\n{}\n",
            request.subject, request.recipients.categories, request.body
        );
        // One file per run id; a retried delivery overwrites it.
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| Error::Delivery(format!("cannot write {}: {}", path.display(), e)))?;

        tracing::info!(run_id = %request.run_id, path = %path.display(), "📝 Digest written");
        Ok(DeliveryReceipt {
            sink: self.name().to_string(),
            reference: Some(path.display().to_string()),
            delivered_at: Utc::now(),
        })
    }
}

/// Keeps delivered requests in memory. Cloning shares the outbox.
#[derive(Debug, Clone, Default)]
pub struct MemoryDelivery {
    outbox: Arc<Mutex<Vec<DeliveryRequest>>>,
}

impl MemoryDelivery {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn delivered(&self) -> Vec<DeliveryRequest> {
        self.outbox.lock().await.clone()
    }
}

#[async_trait]
impl DeliverySink for MemoryDelivery {
    fn name(&self) -> &str {
        "memory"
    }

    async fn deliver(&self, request: &DeliveryRequest) -> Result<DeliveryReceipt> {
        let mut outbox = self.outbox.lock().await;
        outbox.push(request.clone());
        Ok(DeliveryReceipt {
            sink: self.name().to_string(),
            reference: Some(format!("outbox#{}", outbox.len())),
            delivered_at: Utc::now(),
        })
    }
}
