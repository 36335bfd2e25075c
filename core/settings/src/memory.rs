//! In-memory settings backend for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use authbackup_common::{Error, Result, StorageLocation};

use crate::backend::SettingsBackend;
use crate::record::SettingsRecord;

/// In-memory settings backend.
///
/// Clones share the same partitions, so a test can keep a handle and inspect
/// what a store wrote.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    partitions: Arc<RwLock<HashMap<StorageLocation, SettingsRecord>>>,
    failing: Arc<RwLock<Option<StorageLocation>>>,
}

impl MemoryBackend {
    /// Create a backend with both partitions empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one partition, bypassing any store logic.
    pub fn partition(&self, partition: StorageLocation) -> SettingsRecord {
        self.partitions
            .read()
            .map(|p| p.get(&partition).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Seed a partition directly.
    pub fn seed(&self, partition: StorageLocation, record: SettingsRecord) {
        if let Ok(mut partitions) = self.partitions.write() {
            partitions.insert(partition, record);
        }
    }

    /// Make every write to `partition` fail until cleared with `None`.
    pub fn fail_writes_to(&self, partition: Option<StorageLocation>) {
        if let Ok(mut failing) = self.failing.write() {
            *failing = partition;
        }
    }
}

#[async_trait]
impl SettingsBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn read(&self, partition: StorageLocation) -> Result<SettingsRecord> {
        let partitions = self
            .partitions
            .read()
            .map_err(|_| Error::Storage("settings lock poisoned".to_string()))?;
        Ok(partitions.get(&partition).cloned().unwrap_or_default())
    }

    async fn write(&self, partition: StorageLocation, record: &SettingsRecord) -> Result<()> {
        let failing = *self
            .failing
            .read()
            .map_err(|_| Error::Storage("settings lock poisoned".to_string()))?;
        if failing == Some(partition) {
            return Err(Error::Storage(format!(
                "write to {} partition rejected",
                partition
            )));
        }

        self.partitions
            .write()
            .map_err(|_| Error::Storage("settings lock poisoned".to_string()))?
            .insert(partition, record.clone());
        Ok(())
    }
}
