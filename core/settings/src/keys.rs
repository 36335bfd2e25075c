//! Settings schema: known keys and the local-only partition.

use authbackup_common::ProviderKind;

/// A setting key known to the schema.
///
/// Records may also carry keys outside this enum; those are preserved and
/// treated as syncable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    // Local-only
    DriveEncrypted,
    DriveFolder,
    DriveRefreshToken,
    DriveRevoked,
    DriveToken,
    DropboxEncrypted,
    DropboxRevoked,
    DropboxToken,
    LastRemindingBackupTime,
    Offset,
    OneDriveBusiness,
    OneDriveEncrypted,
    OneDriveRevoked,
    OneDriveRefreshToken,
    OneDriveToken,
    StorageLocation,

    // Syncable
    AdvisorIgnoreList,
    Autofill,
    Autolock,
    EnableContextMenu,
    EncodedPhrase,
    SmartFilter,
    Theme,
    Zoom,
}

/// Value shape of a known key, used when importing untyped data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Number,
    String,
    StringList,
}

impl SettingKey {
    /// Keys that must never be written to the syncable partition.
    pub const LOCAL_ONLY: [SettingKey; 16] = [
        SettingKey::DriveEncrypted,
        SettingKey::DriveFolder,
        SettingKey::DriveRefreshToken,
        SettingKey::DriveRevoked,
        SettingKey::DriveToken,
        SettingKey::DropboxEncrypted,
        SettingKey::DropboxRevoked,
        SettingKey::DropboxToken,
        SettingKey::LastRemindingBackupTime,
        SettingKey::Offset,
        SettingKey::OneDriveBusiness,
        SettingKey::OneDriveEncrypted,
        SettingKey::OneDriveRevoked,
        SettingKey::OneDriveRefreshToken,
        SettingKey::OneDriveToken,
        SettingKey::StorageLocation,
    ];

    /// Syncable keys known to the schema.
    pub const SYNCABLE: [SettingKey; 8] = [
        SettingKey::AdvisorIgnoreList,
        SettingKey::Autofill,
        SettingKey::Autolock,
        SettingKey::EnableContextMenu,
        SettingKey::EncodedPhrase,
        SettingKey::SmartFilter,
        SettingKey::Theme,
        SettingKey::Zoom,
    ];

    /// Name of the key as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::DriveEncrypted => "driveEncrypted",
            SettingKey::DriveFolder => "driveFolder",
            SettingKey::DriveRefreshToken => "driveRefreshToken",
            SettingKey::DriveRevoked => "driveRevoked",
            SettingKey::DriveToken => "driveToken",
            SettingKey::DropboxEncrypted => "dropboxEncrypted",
            SettingKey::DropboxRevoked => "dropboxRevoked",
            SettingKey::DropboxToken => "dropboxToken",
            SettingKey::LastRemindingBackupTime => "lastRemindingBackupTime",
            SettingKey::Offset => "offset",
            SettingKey::OneDriveBusiness => "oneDriveBusiness",
            SettingKey::OneDriveEncrypted => "oneDriveEncrypted",
            SettingKey::OneDriveRevoked => "oneDriveRevoked",
            SettingKey::OneDriveRefreshToken => "oneDriveRefreshToken",
            SettingKey::OneDriveToken => "oneDriveToken",
            SettingKey::StorageLocation => "storageLocation",
            SettingKey::AdvisorIgnoreList => "advisorIgnoreList",
            SettingKey::Autofill => "autofill",
            SettingKey::Autolock => "autolock",
            SettingKey::EnableContextMenu => "enableContextMenu",
            SettingKey::EncodedPhrase => "encodedPhrase",
            SettingKey::SmartFilter => "smartFilter",
            SettingKey::Theme => "theme",
            SettingKey::Zoom => "zoom",
        }
    }

    /// Look up a known key by its stored name.
    pub fn from_name(name: &str) -> Option<SettingKey> {
        Self::LOCAL_ONLY
            .iter()
            .chain(Self::SYNCABLE.iter())
            .copied()
            .find(|key| key.as_str() == name)
    }

    /// Whether this key belongs to the local partition.
    pub fn is_local_only(&self) -> bool {
        Self::LOCAL_ONLY.contains(self)
    }

    /// Expected value shape.
    pub fn value_kind(&self) -> ValueKind {
        match self {
            SettingKey::DriveEncrypted
            | SettingKey::DriveRevoked
            | SettingKey::DropboxEncrypted
            | SettingKey::DropboxRevoked
            | SettingKey::OneDriveBusiness
            | SettingKey::OneDriveEncrypted
            | SettingKey::OneDriveRevoked
            | SettingKey::Autofill
            | SettingKey::EnableContextMenu
            | SettingKey::SmartFilter => ValueKind::Bool,
            SettingKey::LastRemindingBackupTime
            | SettingKey::Offset
            | SettingKey::Autolock
            | SettingKey::Zoom => ValueKind::Number,
            SettingKey::AdvisorIgnoreList => ValueKind::StringList,
            _ => ValueKind::String,
        }
    }
}

impl AsRef<str> for SettingKey {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Whether a stored key name belongs to the local partition.
///
/// Unknown keys are syncable.
pub fn is_local_only(name: &str) -> bool {
    SettingKey::LOCAL_ONLY.iter().any(|key| key.as_str() == name)
}

/// The settings keys that make up one provider's credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialKeys {
    pub token: SettingKey,
    /// Absent for providers without a refresh path.
    pub refresh_token: Option<SettingKey>,
    pub revoked: SettingKey,
    pub encrypted: SettingKey,
}

impl CredentialKeys {
    /// Keys used by the given provider.
    pub fn for_provider(kind: ProviderKind) -> Self {
        match kind {
            ProviderKind::Dropbox => Self {
                token: SettingKey::DropboxToken,
                refresh_token: None,
                revoked: SettingKey::DropboxRevoked,
                encrypted: SettingKey::DropboxEncrypted,
            },
            ProviderKind::Drive => Self {
                token: SettingKey::DriveToken,
                refresh_token: Some(SettingKey::DriveRefreshToken),
                revoked: SettingKey::DriveRevoked,
                encrypted: SettingKey::DriveEncrypted,
            },
            ProviderKind::OneDrive => Self {
                token: SettingKey::OneDriveToken,
                refresh_token: Some(SettingKey::OneDriveRefreshToken),
                revoked: SettingKey::OneDriveRevoked,
                encrypted: SettingKey::OneDriveEncrypted,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secrets_are_local_only() {
        for kind in ProviderKind::ALL {
            let keys = CredentialKeys::for_provider(kind);
            assert!(keys.token.is_local_only());
            assert!(keys.revoked.is_local_only());
            assert!(keys.encrypted.is_local_only());
            if let Some(refresh) = keys.refresh_token {
                assert!(refresh.is_local_only());
            }
        }
        assert!(is_local_only("driveFolder"));
        assert!(is_local_only("storageLocation"));
    }

    #[test]
    fn test_partitions_are_disjoint() {
        for key in SettingKey::SYNCABLE {
            assert!(!key.is_local_only());
            assert!(!is_local_only(key.as_str()));
        }
    }

    #[test]
    fn test_unknown_keys_are_syncable() {
        assert!(!is_local_only("highContrast"));
        assert_eq!(SettingKey::from_name("highContrast"), None);
    }

    #[test]
    fn test_from_name() {
        for key in SettingKey::LOCAL_ONLY.iter().chain(SettingKey::SYNCABLE.iter()) {
            assert_eq!(SettingKey::from_name(key.as_str()), Some(*key));
        }
    }

    #[test]
    fn test_dropbox_has_no_refresh_key() {
        assert!(CredentialKeys::for_provider(ProviderKind::Dropbox)
            .refresh_token
            .is_none());
    }
}
