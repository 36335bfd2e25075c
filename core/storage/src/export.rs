//! Source of the backup payload.
//!
//! Producing the export (and encrypting it) belongs to the vault; providers
//! only ask for a snapshot and upload it.

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use tracing::warn;

use authbackup_common::{Error, Result};

/// Produces export snapshots.
#[async_trait]
pub trait ExportSource: Send + Sync {
    /// A fresh snapshot, encrypted if `encrypted` is set and the source can.
    async fn export(&self, encrypted: bool) -> Result<Value>;
}

/// Serialize a snapshot the way it is uploaded: JSON indented by two spaces.
pub fn serialize_backup(snapshot: &Value) -> Result<String> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}

/// Reads snapshots that another tool already exported to disk.
pub struct FileExportSource {
    plain: PathBuf,
    encrypted: Option<PathBuf>,
}

impl FileExportSource {
    pub fn new(plain: impl Into<PathBuf>) -> Self {
        Self {
            plain: plain.into(),
            encrypted: None,
        }
    }

    /// File to use when an encrypted backup is requested.
    pub fn with_encrypted(mut self, encrypted: impl Into<PathBuf>) -> Self {
        self.encrypted = Some(encrypted.into());
        self
    }
}

#[async_trait]
impl ExportSource for FileExportSource {
    async fn export(&self, encrypted: bool) -> Result<Value> {
        let path = match (&self.encrypted, encrypted) {
            (Some(path), true) => path,
            (None, true) => {
                warn!(
                    path = %self.plain.display(),
                    "Encrypted backup requested but no encrypted export given, using plain export"
                );
                &self.plain
            }
            (_, false) => &self.plain,
        };

        let contents = tokio::fs::read_to_string(path).await?;
        serde_json::from_str(&contents).map_err(|e| {
            Error::InvalidInput(format!("Export {} is not JSON: {}", path.display(), e))
        })
    }
}
