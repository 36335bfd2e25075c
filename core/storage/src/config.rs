//! OAuth client credentials for the cloud providers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use authbackup_common::{Error, ProviderKind, Result};

/// OAuth2 client ID for the Drive API.
const DRIVE_CLIENT_ID: &str = "YOUR_DRIVE_CLIENT_ID";
/// OAuth2 client secret for the Drive API (supplied at build or deploy time).
const DRIVE_CLIENT_SECRET: &str = "YOUR_DRIVE_CLIENT_SECRET";
/// OAuth2 client ID for Microsoft Graph.
const ONEDRIVE_CLIENT_ID: &str = "YOUR_ONEDRIVE_CLIENT_ID";
/// OAuth2 client secret for Microsoft Graph.
const ONEDRIVE_CLIENT_SECRET: &str = "YOUR_ONEDRIVE_CLIENT_SECRET";

/// One OAuth client registration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    fn drive_default() -> Self {
        Self::new(DRIVE_CLIENT_ID, DRIVE_CLIENT_SECRET)
    }

    fn onedrive_default() -> Self {
        Self::new(ONEDRIVE_CLIENT_ID, ONEDRIVE_CLIENT_SECRET)
    }

    /// Whether these are still the compiled-in placeholders.
    pub fn is_placeholder(&self) -> bool {
        self.client_id.starts_with("YOUR_") || self.client_secret.starts_with("YOUR_")
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// Client registrations for every provider that refreshes tokens.
///
/// Dropbox has no refresh path and needs none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudCredentials {
    #[serde(default = "ClientCredentials::drive_default")]
    pub drive: ClientCredentials,
    #[serde(default = "ClientCredentials::onedrive_default")]
    pub onedrive: ClientCredentials,
}

impl Default for CloudCredentials {
    fn default() -> Self {
        Self {
            drive: ClientCredentials::drive_default(),
            onedrive: ClientCredentials::onedrive_default(),
        }
    }
}

impl CloudCredentials {
    /// Load from a JSON file; missing providers keep their defaults.
    ///
    /// # Errors
    /// - File cannot be read
    /// - File is not valid JSON for this structure
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(|e| {
            Error::Configuration(format!("Invalid credentials file {}: {}", path.display(), e))
        })
    }

    /// Credentials for a provider, if it uses any.
    pub fn for_provider(&self, kind: ProviderKind) -> Option<&ClientCredentials> {
        match kind {
            ProviderKind::Dropbox => None,
            ProviderKind::Drive => Some(&self.drive),
            ProviderKind::OneDrive => Some(&self.onedrive),
        }
    }
}
