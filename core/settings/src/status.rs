//! Per-provider backup status derived from the settings record.

use serde::Serialize;

use authbackup_common::ProviderKind;

use crate::keys::CredentialKeys;
use crate::record::SettingsRecord;

/// What the settings say about one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProviderStatus {
    pub provider: ProviderKind,
    /// An access token is stored.
    pub connected: bool,
    /// Backups to this provider are encrypted.
    pub encrypted: bool,
    /// The provider reported the credential as unrecoverable.
    pub revoked: bool,
}

/// Status of every provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupStatus {
    pub providers: Vec<ProviderStatus>,
}

impl BackupStatus {
    pub fn from_record(record: &SettingsRecord) -> Self {
        let providers = ProviderKind::ALL
            .iter()
            .map(|&provider| {
                let keys = CredentialKeys::for_provider(provider);
                ProviderStatus {
                    provider,
                    connected: record.get_str(keys.token).is_some(),
                    encrypted: record.get_bool(keys.encrypted) == Some(true),
                    revoked: record.get_bool(keys.revoked) == Some(true),
                }
            })
            .collect();

        Self { providers }
    }

    pub fn get(&self, provider: ProviderKind) -> Option<&ProviderStatus> {
        self.providers.iter().find(|s| s.provider == provider)
    }
}
