//! Partition storage abstraction.

use async_trait::async_trait;

use authbackup_common::{Result, StorageLocation};

use crate::record::SettingsRecord;

/// Storage for the two settings partitions.
///
/// Each partition holds one whole [`SettingsRecord`]. Implementations must
/// treat `write` as a replacement of the partition's record, not a merge.
#[async_trait]
pub trait SettingsBackend: Send + Sync {
    /// Backend name for diagnostics (e.g., "memory", "file").
    fn name(&self) -> &str;

    /// Read a partition. A partition that was never written reads as empty.
    async fn read(&self, partition: StorageLocation) -> Result<SettingsRecord>;

    /// Replace a partition's record.
    ///
    /// # Postconditions
    /// - A following `read` of the same partition returns `record`
    /// - The other partition is untouched
    async fn write(&self, partition: StorageLocation, record: &SettingsRecord) -> Result<()>;
}
