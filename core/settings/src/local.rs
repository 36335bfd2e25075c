//! Filesystem settings backend.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

use authbackup_common::{Error, Result, StorageLocation};

use crate::backend::SettingsBackend;
use crate::record::SettingsRecord;

const LOCAL_FILE: &str = "settings.local.json";
const SYNC_FILE: &str = "settings.sync.json";

/// Stores each partition as a pretty-printed JSON file.
///
/// The sync file can live in a directory that some other tool replicates
/// between devices; this backend only reads and writes it.
pub struct FileBackend {
    local_path: PathBuf,
    sync_path: PathBuf,
}

impl FileBackend {
    /// Keep both partitions in `dir`.
    ///
    /// # Postconditions
    /// - `dir` exists
    ///
    /// # Errors
    /// - Directory cannot be created
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        Self::with_paths(dir.join(LOCAL_FILE), dir.join(SYNC_FILE))
    }

    /// Use explicit file paths for each partition.
    pub fn with_paths(local_path: impl Into<PathBuf>, sync_path: impl Into<PathBuf>) -> Result<Self> {
        let local_path = local_path.into();
        let sync_path = sync_path.into();

        for path in [&local_path, &sync_path] {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        Ok(Self {
            local_path,
            sync_path,
        })
    }

    /// File backing a partition.
    pub fn path(&self, partition: StorageLocation) -> &Path {
        match partition {
            StorageLocation::Local => &self.local_path,
            StorageLocation::Sync => &self.sync_path,
        }
    }
}

#[async_trait]
impl SettingsBackend for FileBackend {
    fn name(&self) -> &str {
        "file"
    }

    async fn read(&self, partition: StorageLocation) -> Result<SettingsRecord> {
        let path = self.path(partition);

        let contents = match fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SettingsRecord::new());
            }
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            return Ok(SettingsRecord::new());
        }

        serde_json::from_str(&contents).map_err(|e| {
            Error::Storage(format!(
                "{} partition at {} is not a settings record: {}",
                partition,
                path.display(),
                e
            ))
        })
    }

    async fn write(&self, partition: StorageLocation, record: &SettingsRecord) -> Result<()> {
        let path = self.path(partition);
        let json = serde_json::to_string_pretty(record)?;

        // Write-then-rename so a crash never leaves a truncated partition.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json.as_bytes()).await?;
        fs::rename(&tmp, path).await?;

        tracing::debug!(partition = %partition, path = %path.display(), keys = record.len(), "Wrote settings partition");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::SettingKey;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let temp = TempDir::new().unwrap();
        let backend = FileBackend::new(temp.path()).unwrap();

        assert!(backend.read(StorageLocation::Local).await.unwrap().is_empty());
        assert!(backend.read(StorageLocation::Sync).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_and_read_partition() {
        let temp = TempDir::new().unwrap();
        let backend = FileBackend::new(temp.path()).unwrap();

        let mut record = SettingsRecord::new();
        record.set(SettingKey::DriveToken, "abc");
        record.set(SettingKey::DriveRevoked, false);
        backend.write(StorageLocation::Local, &record).await.unwrap();

        let stored = backend.read(StorageLocation::Local).await.unwrap();
        assert_eq!(stored, record);
        assert!(temp.path().join(LOCAL_FILE).exists());
        assert!(!temp.path().join(SYNC_FILE).exists());
    }

    #[tokio::test]
    async fn test_creates_nested_directories() {
        let temp = TempDir::new().unwrap();
        let local = temp.path().join("device").join("local.json");
        let sync = temp.path().join("shared").join("sync.json");

        let backend = FileBackend::with_paths(&local, &sync).unwrap();
        let mut record = SettingsRecord::new();
        record.set(SettingKey::Theme, "dark");
        backend.write(StorageLocation::Sync, &record).await.unwrap();

        assert!(sync.exists());
        assert_eq!(backend.path(StorageLocation::Local), local.as_path());
    }

    #[tokio::test]
    async fn test_corrupt_partition_is_storage_error() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join(SYNC_FILE), "not json").unwrap();
        let backend = FileBackend::new(temp.path()).unwrap();

        let result = backend.read(StorageLocation::Sync).await;
        assert!(matches!(result, Err(Error::Storage(_))));
    }
}
