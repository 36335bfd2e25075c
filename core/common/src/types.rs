//! Common types used throughout AuthBackup.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cloud service a backup can be sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Dropbox,
    Drive,
    OneDrive,
}

impl ProviderKind {
    /// All supported providers.
    pub const ALL: [ProviderKind; 3] = [ProviderKind::Dropbox, ProviderKind::Drive, ProviderKind::OneDrive];

    /// Short lowercase name used in configuration and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Dropbox => "dropbox",
            ProviderKind::Drive => "drive",
            ProviderKind::OneDrive => "onedrive",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dropbox" => Ok(ProviderKind::Dropbox),
            "drive" | "gdrive" => Ok(ProviderKind::Drive),
            "onedrive" => Ok(ProviderKind::OneDrive),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown provider '{}'",
                other
            ))),
        }
    }
}

/// Partition that holds the syncable half of the user settings.
///
/// Local-only settings always live in the local partition; this preference
/// only decides where everything else goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageLocation {
    #[default]
    Local,
    Sync,
}

impl StorageLocation {
    /// Marker value as persisted in the settings record.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageLocation::Local => "local",
            StorageLocation::Sync => "sync",
        }
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StorageLocation {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "local" => Ok(StorageLocation::Local),
            "sync" => Ok(StorageLocation::Sync),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown storage location '{}'",
                other
            ))),
        }
    }
}
