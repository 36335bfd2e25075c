//! Token probe and refresh-token grant for Google Drive.

use url::Url;
use zeroize::Zeroizing;

use authbackup_common::{Error, ProviderKind, Result};
use authbackup_settings::SettingsRecord;

use crate::auth::TokenStrategy;
use crate::config::ClientCredentials;
use crate::transport::HttpRequest;

/// Cheapest authenticated Drive call.
const PROBE_URL: &str = "https://www.googleapis.com/drive/v3/files";
/// OAuth2 token endpoint.
const TOKEN_URL: &str = "https://www.googleapis.com/oauth2/v4/token";

/// Drive token handling.
///
/// The grant parameters go in the query string, as the v4 token endpoint
/// accepts them there.
pub struct DriveStrategy {
    credentials: ClientCredentials,
}

impl DriveStrategy {
    pub fn new(credentials: ClientCredentials) -> Self {
        Self { credentials }
    }
}

impl TokenStrategy for DriveStrategy {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Drive
    }

    fn probe(&self, token: &str) -> Option<HttpRequest> {
        Some(HttpRequest::get(PROBE_URL).bearer(token))
    }

    fn refresh_request(
        &self,
        refresh_token: &str,
        _settings: &SettingsRecord,
    ) -> Result<Option<HttpRequest>> {
        let client_secret = Zeroizing::new(self.credentials.client_secret.clone());
        let url = Url::parse_with_params(
            TOKEN_URL,
            &[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ],
        )
        .map_err(|e| Error::Configuration(format!("Invalid token URL: {}", e)))?;

        Ok(Some(
            HttpRequest::post(url.as_str()).header("Accept", "application/json"),
        ))
    }
}
