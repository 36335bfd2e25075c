//! Settings store: merges and splits the two partitions.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use authbackup_common::{Result, StorageLocation};

use crate::backend::SettingsBackend;
use crate::keys::is_local_only;
use crate::legacy;
use crate::record::SettingsRecord;

/// Read/write access to the user settings.
///
/// Writes are whole-record: callers read with [`get_all`](Self::get_all),
/// change what they need and write everything back with
/// [`set_all`](Self::set_all). Two writers working from the same stale read
/// race, and the last one wins for the whole record.
#[derive(Clone)]
pub struct SettingsStore {
    backend: Arc<dyn SettingsBackend>,
}

impl SettingsStore {
    /// Create a store over a backend.
    pub fn new(backend: Arc<dyn SettingsBackend>) -> Self {
        Self { backend }
    }

    /// Current storage-location preference (default: local).
    pub async fn location(&self) -> Result<StorageLocation> {
        let local = self.backend.read(StorageLocation::Local).await?;
        Ok(local.storage_location().unwrap_or_default())
    }

    /// The full settings record.
    ///
    /// In sync mode the local partition wins over the sync partition for keys
    /// present in both.
    ///
    /// # Postconditions
    /// - Local-only keys come from the local partition alone; copies found in
    ///   the sync partition are ignored
    pub async fn get_all(&self) -> Result<SettingsRecord> {
        let local = self.backend.read(StorageLocation::Local).await?;
        let location = local.storage_location().unwrap_or_default();

        if location == StorageLocation::Local {
            return Ok(local);
        }

        let (_, syncable) = self.backend.read(StorageLocation::Sync).await?.split();
        Ok(SettingsRecord::merged(&syncable, &local))
    }

    /// Persist the full settings record.
    ///
    /// In sync mode the record is split by key and both halves are written
    /// concurrently. The writes are independent: if one fails the other is
    /// not rolled back, and the first error is returned.
    ///
    /// # Preconditions
    /// - `record` is a full record from [`get_all`](Self::get_all); keys
    ///   missing from it are deleted
    ///
    /// # Postconditions
    /// - Local-only keys are written to the local partition only
    /// - In sync mode the sync marker is kept even if `record` omits it
    pub async fn set_all(&self, record: &SettingsRecord) -> Result<()> {
        let location = self.location().await?;

        if location == StorageLocation::Local {
            return self.backend.write(StorageLocation::Local, record).await;
        }

        let (mut local, syncable) = record.split();
        if local.storage_location().is_none() {
            local.set_storage_location(StorageLocation::Sync);
        }

        let (local_result, sync_result) = futures::join!(
            self.backend.write(StorageLocation::Local, &local),
            self.backend.write(StorageLocation::Sync, &syncable),
        );

        match (local_result, sync_result) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(e), other) => {
                if other.is_ok() {
                    warn!("Local settings write failed after sync write succeeded: {}", e);
                }
                Err(e)
            }
            (Ok(()), Err(e)) => {
                warn!("Sync settings write failed after local write succeeded: {}", e);
                Err(e)
            }
        }
    }

    /// Read-modify-write the whole record.
    pub async fn update<F>(&self, f: F) -> Result<SettingsRecord>
    where
        F: FnOnce(&mut SettingsRecord),
    {
        let mut record = self.get_all().await?;
        f(&mut record);
        self.set_all(&record).await?;
        Ok(record)
    }

    /// Switch the storage-location preference and migrate existing values.
    ///
    /// Both partitions are merged with the target partition's existing
    /// values taking precedence. Local-only keys always come from, and stay
    /// in, the local partition. Moving back to local leaves the sync
    /// partition as it is for other devices.
    ///
    /// # Postconditions
    /// - [`location`](Self::location) returns `location`
    /// - The sync partition never holds local-only keys
    /// - If the sync write fails moving to sync, the preference is unchanged
    pub async fn set_location(&self, location: StorageLocation) -> Result<()> {
        let local = self.backend.read(StorageLocation::Local).await?;
        let syncable = self.backend.read(StorageLocation::Sync).await?;

        let (local_only, local_syncable) = local.split();
        let (_, sync_syncable) = syncable.split();

        match location {
            StorageLocation::Sync => {
                let merged = SettingsRecord::merged(&local_syncable, &sync_syncable);

                let mut new_local = local_only;
                new_local.set_storage_location(StorageLocation::Sync);

                // Sync half first: if it fails the preference is not flipped
                // and nothing is lost.
                self.backend.write(StorageLocation::Sync, &merged).await?;
                self.backend.write(StorageLocation::Local, &new_local).await?;
            }
            StorageLocation::Local => {
                let mut merged = SettingsRecord::merged(&sync_syncable, &local_syncable);
                merged.merge_from(&local_only);
                merged.set_storage_location(StorageLocation::Local);

                self.backend.write(StorageLocation::Local, &merged).await?;
            }
        }

        info!(location = %location, backend = self.backend.name(), "Settings storage location changed");
        Ok(())
    }

    /// Delete one key.
    ///
    /// Local-only keys resolve to the local partition even in sync mode.
    /// Only that partition is rewritten.
    ///
    /// # Postconditions
    /// - The key is absent from the partition it resolves to; removing a
    ///   missing key is not an error
    pub async fn remove_item(&self, key: impl AsRef<str>) -> Result<()> {
        let key = key.as_ref();
        let partition = if is_local_only(key) {
            StorageLocation::Local
        } else {
            self.location().await?
        };

        let mut record = self.backend.read(partition).await?;
        if record.remove(key).is_none() {
            debug!(key, partition = %partition, "Removed setting was not present");
        }
        self.backend.write(partition, &record).await
    }

    /// Import a legacy string-valued settings dump.
    ///
    /// Known keys are converted to their typed form and merged over the
    /// current record; unknown keys are dropped. Returns how many keys were
    /// imported.
    pub async fn import_legacy(&self, data: &HashMap<String, String>) -> Result<usize> {
        let imported = legacy::convert(data);
        let count = imported.len();

        self.update(|record| record.merge_from(&imported)).await?;

        info!(count, "Imported legacy settings");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::SettingKey;
    use crate::memory::MemoryBackend;
    use proptest::prelude::*;
    use serde_json::json;

    fn store_with(backend: &MemoryBackend) -> SettingsStore {
        SettingsStore::new(Arc::new(backend.clone()))
    }

    fn sync_backend() -> MemoryBackend {
        let backend = MemoryBackend::new();
        let mut local = SettingsRecord::new();
        local.set_storage_location(StorageLocation::Sync);
        backend.seed(StorageLocation::Local, local);
        backend
    }

    fn sample_record() -> SettingsRecord {
        let mut record = SettingsRecord::new();
        record.set(SettingKey::DropboxToken, "dropbox-secret");
        record.set(SettingKey::DriveRefreshToken, "drive-refresh");
        record.set(SettingKey::DriveFolder, "folder-id");
        record.set(SettingKey::OneDriveRevoked, true);
        record.set(SettingKey::Theme, "dark");
        record.set(SettingKey::Autolock, 5);
        record
    }

    #[tokio::test]
    async fn test_defaults_to_local() {
        let backend = MemoryBackend::new();
        let store = store_with(&backend);
        assert_eq!(store.location().await.unwrap(), StorageLocation::Local);
        assert!(store.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_local_mode_writes_everything_locally() {
        let backend = MemoryBackend::new();
        let store = store_with(&backend);

        let record = sample_record();
        store.set_all(&record).await.unwrap();

        assert_eq!(backend.partition(StorageLocation::Local), record);
        assert!(backend.partition(StorageLocation::Sync).is_empty());
        assert_eq!(store.get_all().await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_sync_mode_never_syncs_secrets() {
        let backend = sync_backend();
        let store = store_with(&backend);

        let mut record = sample_record();
        record.set_storage_location(StorageLocation::Sync);
        store.set_all(&record).await.unwrap();

        let synced = backend.partition(StorageLocation::Sync);
        for key in SettingKey::LOCAL_ONLY {
            assert!(!synced.contains(key), "{} leaked to sync", key.as_str());
        }
        assert_eq!(synced.get_str(SettingKey::Theme), Some("dark"));

        let local = backend.partition(StorageLocation::Local);
        assert_eq!(local.get_str(SettingKey::DropboxToken), Some("dropbox-secret"));
        assert!(!local.contains(SettingKey::Theme));

        assert_eq!(store.get_all().await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_sync_mode_local_wins_on_overlap() {
        let backend = sync_backend();
        let mut stray = SettingsRecord::new();
        stray.set(SettingKey::DropboxToken, "stale-synced-token");
        stray.set(SettingKey::Zoom, 90);
        backend.seed(StorageLocation::Sync, stray);

        let mut local = backend.partition(StorageLocation::Local);
        local.set(SettingKey::DropboxToken, "device-token");
        backend.seed(StorageLocation::Local, local);

        let store = store_with(&backend);
        let all = store.get_all().await.unwrap();
        assert_eq!(all.get_str(SettingKey::DropboxToken), Some("device-token"));
        assert_eq!(all.get_i64(SettingKey::Zoom), Some(90));
    }

    #[tokio::test]
    async fn test_sync_mode_ignores_synced_secrets() {
        let backend = sync_backend();
        let mut local = backend.partition(StorageLocation::Local);
        local.set(SettingKey::DropboxRevoked, true);
        backend.seed(StorageLocation::Local, local);
        let mut stray = SettingsRecord::new();
        stray.set(SettingKey::DropboxToken, "stale-synced-token");
        stray.set(SettingKey::DriveRefreshToken, "stale-refresh");
        stray.set(SettingKey::Theme, "dark");
        backend.seed(StorageLocation::Sync, stray);

        let store = store_with(&backend);
        let all = store.get_all().await.unwrap();
        assert!(!all.contains(SettingKey::DropboxToken));
        assert!(!all.contains(SettingKey::DriveRefreshToken));
        assert_eq!(all.get_bool(SettingKey::DropboxRevoked), Some(true));
        assert_eq!(all.get_str(SettingKey::Theme), Some("dark"));

        // A later write must not pull the stray into the local partition.
        store.update(|record| record.set(SettingKey::Zoom, 110)).await.unwrap();
        let local = backend.partition(StorageLocation::Local);
        assert!(!local.contains(SettingKey::DropboxToken));
        assert!(!local.contains(SettingKey::DriveRefreshToken));
    }

    #[tokio::test]
    async fn test_sync_mode_keeps_marker_when_record_omits_it() {
        let backend = sync_backend();
        let store = store_with(&backend);

        let mut record = SettingsRecord::new();
        record.set(SettingKey::Theme, "dark");
        store.set_all(&record).await.unwrap();

        assert_eq!(store.location().await.unwrap(), StorageLocation::Sync);
    }

    #[tokio::test]
    async fn test_partial_write_failure_is_surfaced_not_rolled_back() {
        let backend = sync_backend();
        let store = store_with(&backend);
        backend.fail_writes_to(Some(StorageLocation::Sync));

        let mut record = sample_record();
        record.set_storage_location(StorageLocation::Sync);
        let result = store.set_all(&record).await;

        assert!(result.is_err());
        let local = backend.partition(StorageLocation::Local);
        assert_eq!(local.get_str(SettingKey::DropboxToken), Some("dropbox-secret"));
        assert!(backend.partition(StorageLocation::Sync).is_empty());
    }

    #[tokio::test]
    async fn test_migrate_local_to_sync() {
        let backend = MemoryBackend::new();
        let mut local = sample_record();
        local.set(SettingKey::Zoom, 110);
        backend.seed(StorageLocation::Local, local);
        let mut remote = SettingsRecord::new();
        remote.set(SettingKey::Zoom, 125);
        remote.set(SettingKey::SmartFilter, false);
        backend.seed(StorageLocation::Sync, remote);

        let store = store_with(&backend);
        store.set_location(StorageLocation::Sync).await.unwrap();

        assert_eq!(store.location().await.unwrap(), StorageLocation::Sync);

        let all = store.get_all().await.unwrap();
        // Union of both partitions, target (sync) wins on conflict.
        assert_eq!(all.get_str(SettingKey::Theme), Some("dark"));
        assert_eq!(all.get_i64(SettingKey::Autolock), Some(5));
        assert_eq!(all.get_bool(SettingKey::SmartFilter), Some(false));
        assert_eq!(all.get_i64(SettingKey::Zoom), Some(125));
        assert_eq!(all.get_str(SettingKey::DropboxToken), Some("dropbox-secret"));

        let synced = backend.partition(StorageLocation::Sync);
        for key in SettingKey::LOCAL_ONLY {
            assert!(!synced.contains(key));
        }
        let local = backend.partition(StorageLocation::Local);
        assert_eq!(local.get_str(SettingKey::DriveFolder), Some("folder-id"));
        assert_eq!(local.get_str(SettingKey::DriveRefreshToken), Some("drive-refresh"));
        assert_eq!(local.get_bool(SettingKey::OneDriveRevoked), Some(true));
        assert!(!local.contains(SettingKey::Theme));
    }

    #[tokio::test]
    async fn test_migrate_sync_to_local() {
        let backend = sync_backend();
        let mut local = backend.partition(StorageLocation::Local);
        local.set(SettingKey::DriveToken, "drive-token");
        local.set(SettingKey::Theme, "light");
        backend.seed(StorageLocation::Local, local);
        let mut remote = SettingsRecord::new();
        remote.set(SettingKey::Theme, "dark");
        remote.set(SettingKey::Autofill, true);
        backend.seed(StorageLocation::Sync, remote.clone());

        let store = store_with(&backend);
        store.set_location(StorageLocation::Local).await.unwrap();

        assert_eq!(store.location().await.unwrap(), StorageLocation::Local);
        let all = store.get_all().await.unwrap();
        assert_eq!(all.get_str(SettingKey::Theme), Some("light"));
        assert_eq!(all.get_bool(SettingKey::Autofill), Some(true));
        assert_eq!(all.get_str(SettingKey::DriveToken), Some("drive-token"));
        assert_eq!(backend.partition(StorageLocation::Sync), remote);
    }

    #[tokio::test]
    async fn test_remove_local_only_key_in_sync_mode() {
        let backend = sync_backend();
        let store = store_with(&backend);
        let mut record = sample_record();
        record.set_storage_location(StorageLocation::Sync);
        store.set_all(&record).await.unwrap();

        store.remove_item(SettingKey::DropboxToken).await.unwrap();

        let all = store.get_all().await.unwrap();
        assert!(!all.contains(SettingKey::DropboxToken));
        // The sync partition is not touched by a local-only removal.
        assert_eq!(backend.partition(StorageLocation::Sync).get_str(SettingKey::Theme), Some("dark"));
        assert_eq!(store.location().await.unwrap(), StorageLocation::Sync);
    }

    #[tokio::test]
    async fn test_remove_syncable_key_in_sync_mode() {
        let backend = sync_backend();
        let store = store_with(&backend);
        let mut record = sample_record();
        record.set_storage_location(StorageLocation::Sync);
        store.set_all(&record).await.unwrap();

        store.remove_item(SettingKey::Theme).await.unwrap();

        assert!(!backend.partition(StorageLocation::Sync).contains(SettingKey::Theme));
        assert_eq!(
            backend.partition(StorageLocation::Local).get_str(SettingKey::DropboxToken),
            Some("dropbox-secret")
        );
    }

    #[tokio::test]
    async fn test_update_is_read_modify_write() {
        let backend = MemoryBackend::new();
        let store = store_with(&backend);
        store.set_all(&sample_record()).await.unwrap();

        let updated = store
            .update(|record| {
                record.set(SettingKey::Theme, "flat");
                record.remove(SettingKey::DropboxToken);
            })
            .await
            .unwrap();

        assert_eq!(updated.get_str(SettingKey::Theme), Some("flat"));
        let stored = store.get_all().await.unwrap();
        assert_eq!(stored, updated);
        assert_eq!(stored.get_str(SettingKey::DriveFolder), Some("folder-id"));
    }

    #[tokio::test]
    async fn test_import_legacy_merges_typed_values() {
        let backend = MemoryBackend::new();
        let store = store_with(&backend);
        store.set_all(&sample_record()).await.unwrap();

        let mut legacy = HashMap::new();
        legacy.insert("smartFilter".to_string(), "false".to_string());
        legacy.insert("zoom".to_string(), "125".to_string());
        legacy.insert("advisorIgnoreList".to_string(), "[\"autoLockNotSet\"]".to_string());
        legacy.insert("entries".to_string(), "{}".to_string());

        let count = store.import_legacy(&legacy).await.unwrap();
        assert_eq!(count, 3);

        let all = store.get_all().await.unwrap();
        assert_eq!(all.get_bool(SettingKey::SmartFilter), Some(false));
        assert_eq!(all.get_i64(SettingKey::Zoom), Some(125));
        assert_eq!(all.get(SettingKey::AdvisorIgnoreList), Some(&json!(["autoLockNotSet"])));
        assert!(!all.contains("entries"));
        assert_eq!(all.get_str(SettingKey::Theme), Some("dark"));
    }

    fn arb_record() -> impl Strategy<Value = SettingsRecord> {
        let key = prop_oneof![
            proptest::sample::select(
                SettingKey::LOCAL_ONLY
                    .iter()
                    .chain(SettingKey::SYNCABLE.iter())
                    .filter(|k| **k != SettingKey::StorageLocation)
                    .map(|k| k.as_str().to_string())
                    .collect::<Vec<_>>()
            ),
            "[a-z]{1,8}[A-Z][a-z]{1,8}",
        ];
        let value = prop_oneof![
            any::<bool>().prop_map(serde_json::Value::from),
            any::<i32>().prop_map(serde_json::Value::from),
            "[a-zA-Z0-9_-]{1,16}".prop_map(serde_json::Value::from),
        ];
        proptest::collection::btree_map(key, value, 0..12)
            .prop_map(|map| map.into_iter().collect::<SettingsRecord>())
    }

    proptest! {
        #[test]
        fn prop_set_all_then_get_all_round_trips(
            record in arb_record(),
            sync in any::<bool>(),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            runtime.block_on(async {
                let location = if sync { StorageLocation::Sync } else { StorageLocation::Local };
                let backend = MemoryBackend::new();
                let mut marker = SettingsRecord::new();
                marker.set_storage_location(location);
                backend.seed(StorageLocation::Local, marker);
                let store = store_with(&backend);

                let mut record = record;
                record.set_storage_location(location);
                store.set_all(&record).await.unwrap();

                prop_assert_eq!(store.get_all().await.unwrap(), record);
                Ok(())
            })?;
        }
    }
}
