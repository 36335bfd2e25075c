//! Token lifecycle shared by every provider.
//!
//! A [`TokenManager`] owns one provider's credential and moves it through
//! `NoToken -> Valid -> Expired -> Revoked`. What differs per provider (how
//! to probe a token, how to refresh it) lives behind [`TokenStrategy`].
//!
//! Authentication failures are never returned as errors. They change the
//! stored credential and the caller sees `None` or `false`. Only transport
//! failures propagate.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use authbackup_common::{ProviderKind, Result};
use authbackup_settings::{CredentialKeys, SettingsRecord, SettingsStore};

use crate::provider::{missing_field, ApiError, ErrorEnvelope};
use crate::transport::{HttpRequest, HttpResponse, Transport};

/// Where a provider's credential stands, as far as the settings know.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// Nothing stored.
    NoToken,
    /// An access token is stored. It has not necessarily been probed.
    Valid,
    /// The access token is gone but a refresh token remains.
    Expired,
    /// Automatic recovery is impossible until the user consents again.
    Revoked,
}

impl CredentialState {
    pub fn from_record(record: &SettingsRecord, keys: &CredentialKeys) -> Self {
        if record.get_str(keys.token).is_some() {
            CredentialState::Valid
        } else if record.get_bool(keys.revoked) == Some(true) {
            CredentialState::Revoked
        } else if keys
            .refresh_token
            .is_some_and(|key| record.get_str(key).is_some())
        {
            CredentialState::Expired
        } else {
            CredentialState::NoToken
        }
    }
}

/// Platform-mediated, non-interactive token acquisition.
#[async_trait]
pub trait SilentReauth: Send + Sync {
    /// Obtain a fresh access token without user interaction, or `None`.
    async fn acquire_token(&self) -> Option<String>;

    /// Drop a token the provider rejected from any platform cache.
    async fn invalidate(&self, _token: &str) {}
}

/// Provider-specific parts of the token lifecycle.
pub trait TokenStrategy: Send + Sync {
    fn provider(&self) -> ProviderKind;

    /// Cheap authenticated request used to validate a cached token.
    /// `None` means the token is trusted until an API call rejects it.
    fn probe(&self, _token: &str) -> Option<HttpRequest> {
        None
    }

    /// Refresh-token grant request. `None` means the provider has no
    /// refresh path.
    fn refresh_request(
        &self,
        _refresh_token: &str,
        _settings: &SettingsRecord,
    ) -> Result<Option<HttpRequest>> {
        Ok(None)
    }

    /// Whether a probe response means the token was rejected.
    ///
    /// # Errors
    /// - `Error::Transport` if a non-401 response is not JSON
    fn probe_rejected(&self, response: &HttpResponse) -> Result<bool> {
        if response.is_unauthorized() {
            return Ok(true);
        }
        let body: ErrorEnvelope = response.json()?;
        Ok(body.status_code() == Some(401))
    }
}

/// Token endpoint reply, success or OAuth error.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    error: Option<ApiError>,
    error_description: Option<String>,
}

/// Owns one provider's credential state machine.
pub struct TokenManager {
    strategy: Box<dyn TokenStrategy>,
    keys: CredentialKeys,
    settings: SettingsStore,
    transport: Arc<dyn Transport>,
    silent: Option<Arc<dyn SilentReauth>>,
}

impl TokenManager {
    /// Create a token manager for the strategy's provider.
    pub fn new(
        strategy: impl TokenStrategy + 'static,
        settings: SettingsStore,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let keys = CredentialKeys::for_provider(strategy.provider());
        Self {
            strategy: Box::new(strategy),
            keys,
            settings,
            transport,
            silent: None,
        }
    }

    /// Try this capability before the refresh-token grant.
    pub fn with_silent_reauth(mut self, silent: Arc<dyn SilentReauth>) -> Self {
        self.silent = Some(silent);
        self
    }

    pub fn provider(&self) -> ProviderKind {
        self.strategy.provider()
    }

    pub fn keys(&self) -> &CredentialKeys {
        &self.keys
    }

    /// Current credential state from the stored settings.
    pub async fn state(&self) -> Result<CredentialState> {
        let record = self.settings.get_all().await?;
        Ok(CredentialState::from_record(&record, &self.keys))
    }

    /// A usable access token, or `None`.
    ///
    /// A cached token is probed first when the provider supports it. If the
    /// probe is rejected the token is cleared and exactly one refresh is
    /// attempted; its result is final for this call.
    ///
    /// # Postconditions
    /// - A revoked credential with no access token returns `None` without
    ///   any network activity
    /// - At most one probe and one refresh are sent
    ///
    /// # Errors
    /// - Transport failures of the probe or the refresh
    /// - Settings storage failures
    pub async fn get_token(&self) -> Result<Option<String>> {
        let provider = self.provider();
        let record = self.settings.get_all().await?;

        let Some(token) = record.get_str(self.keys.token).map(str::to_string) else {
            if record.get_bool(self.keys.revoked) == Some(true) {
                debug!(%provider, "Credential revoked, not attempting refresh");
                return Ok(None);
            }
            self.refresh_token().await?;
            return self.stored_token().await;
        };

        let Some(probe) = self.strategy.probe(&token) else {
            return Ok(Some(token));
        };

        let response = self.transport.send(probe).await?;
        if !self.strategy.probe_rejected(&response)? {
            return Ok(Some(token));
        }

        info!(%provider, "Access token rejected, refreshing once");
        self.expire().await?;
        if let Some(silent) = &self.silent {
            silent.invalidate(&token).await;
        }

        self.refresh_token().await?;
        self.stored_token().await
    }

    /// Try to obtain a new access token without user interaction.
    ///
    /// Returns whether a new token was stored.
    ///
    /// # Postconditions
    /// - On success the new access token (and a rotated refresh token, if
    ///   one came back) is stored and the revoked flag is cleared
    /// - On 401 or `invalid_grant` the refresh token is dropped and the
    ///   credential is marked revoked
    /// - On any other grant failure the stored credential is unchanged
    ///
    /// # Errors
    /// - Transport failure or non-JSON body from the token endpoint
    /// - Settings storage failures
    pub async fn refresh_token(&self) -> Result<bool> {
        let provider = self.provider();

        if let Some(silent) = &self.silent {
            match silent.acquire_token().await {
                Some(token) if !token.is_empty() => {
                    self.store_token(token, None).await?;
                    info!(%provider, "Obtained token through silent reauthentication");
                    return Ok(true);
                }
                _ => debug!(%provider, "Silent reauthentication failed, falling back to refresh token"),
            }
        }

        let Some(refresh_key) = self.keys.refresh_token else {
            debug!(%provider, "Provider has no refresh path");
            return Ok(false);
        };

        let record = self.settings.get_all().await?;
        let Some(refresh_token) = record
            .get_str(refresh_key)
            .map(|t| Zeroizing::new(t.to_string()))
        else {
            debug!(%provider, "No refresh token stored");
            return Ok(false);
        };

        let Some(request) = self.strategy.refresh_request(&refresh_token, &record)? else {
            return Ok(false);
        };

        let response = self.transport.send(request).await?;
        if response.is_unauthorized() {
            warn!(%provider, "Token endpoint returned 401, credential revoked");
            self.drop_refresh_token().await?;
            return Ok(false);
        }

        let grant: TokenResponse = response.json()?;
        if let Some(error) = &grant.error {
            let description = grant.error_description.as_deref().unwrap_or_default();
            if error.is("invalid_grant") {
                warn!(%provider, description, "Refresh token rejected, credential revoked");
                self.drop_refresh_token().await?;
            } else {
                warn!(%provider, error = %error.message(), description, "Token refresh failed");
            }
            return Ok(false);
        }

        let Some(access_token) = grant.access_token.filter(|t| !t.is_empty()) else {
            warn!(%provider, error = %missing_field("access_token"), "Token refresh failed");
            return Ok(false);
        };
        let rotated = grant.refresh_token.filter(|t| !t.is_empty());

        self.store_token(access_token, rotated).await?;
        info!(%provider, "Access token refreshed");
        Ok(true)
    }

    /// Clear the access token. A refresh token, if any, stays.
    pub async fn expire(&self) -> Result<()> {
        let token_key = self.keys.token;
        self.settings
            .update(|record| {
                record.remove(token_key);
            })
            .await?;
        Ok(())
    }

    /// Clear the access token and mark the credential revoked.
    pub async fn revoke(&self) -> Result<()> {
        let keys = self.keys;
        self.settings
            .update(|record| {
                record.remove(keys.token);
                record.set(keys.revoked, true);
            })
            .await?;
        info!(provider = %self.provider(), "Credential revoked");
        Ok(())
    }

    async fn stored_token(&self) -> Result<Option<String>> {
        let record = self.settings.get_all().await?;
        Ok(record.get_str(self.keys.token).map(str::to_string))
    }

    async fn store_token(&self, access_token: String, refresh_token: Option<String>) -> Result<()> {
        let keys = self.keys;
        self.settings
            .update(|record| {
                record.set(keys.token, access_token);
                record.remove(keys.revoked);
                if let (Some(key), Some(refresh)) = (keys.refresh_token, refresh_token) {
                    record.set(key, refresh);
                }
            })
            .await?;
        Ok(())
    }

    async fn drop_refresh_token(&self) -> Result<()> {
        let keys = self.keys;
        self.settings
            .update(|record| {
                if let Some(key) = keys.refresh_token {
                    record.remove(key);
                }
                record.set(keys.revoked, true);
            })
            .await?;
        Ok(())
    }
}
