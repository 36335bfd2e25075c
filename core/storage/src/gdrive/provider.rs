//! Google Drive backup provider.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use authbackup_common::{ProviderKind, Result};
use authbackup_settings::SettingKey;

use crate::auth::{SilentReauth, TokenManager};
use crate::config::ClientCredentials;
use crate::provider::{prepare_backup, AccountLookup, ApiOutcome, BackupProvider, ProviderContext};

use super::auth::DriveStrategy;
use super::client::{DriveClient, FolderState};

/// Google Drive backup provider.
///
/// Backups go into a dedicated folder whose id is cached in the settings.
/// The folder is recreated when the cached one is deleted or trashed.
pub struct DriveProvider {
    ctx: ProviderContext,
    tokens: TokenManager,
    client: DriveClient,
}

impl DriveProvider {
    pub fn new(
        ctx: ProviderContext,
        credentials: ClientCredentials,
        silent: Option<Arc<dyn SilentReauth>>,
    ) -> Self {
        let mut tokens = TokenManager::new(
            DriveStrategy::new(credentials),
            ctx.settings.clone(),
            ctx.transport.clone(),
        );
        if let Some(silent) = silent {
            tokens = tokens.with_silent_reauth(silent);
        }
        let client = DriveClient::new(ctx.transport.clone());

        Self { ctx, tokens, client }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Id of a usable backup folder, creating one if needed.
    async fn ensure_folder(&self, token: &str) -> Result<ApiOutcome<String>> {
        let record = self.ctx.settings.get_all().await?;

        if let Some(folder_id) = record.get_str(SettingKey::DriveFolder) {
            match self.client.folder_state(token, folder_id).await? {
                ApiOutcome::Success(FolderState::Present) => {
                    debug!(folder_id, "Reusing backup folder");
                    return Ok(ApiOutcome::Success(folder_id.to_string()));
                }
                ApiOutcome::Success(FolderState::Gone) => {
                    info!(folder_id, "Backup folder is gone, creating a new one");
                    self.ctx
                        .settings
                        .update(|record| {
                            record.remove(SettingKey::DriveFolder);
                        })
                        .await?;
                }
                ApiOutcome::Unauthorized => return Ok(ApiOutcome::Unauthorized),
                ApiOutcome::Failed(message) => return Ok(ApiOutcome::Failed(message)),
            }
        }

        let created = self.client.create_folder(token).await?;
        if let ApiOutcome::Success(folder_id) = &created {
            let folder_id = folder_id.clone();
            info!(folder_id = folder_id.as_str(), "Created backup folder");
            self.ctx
                .settings
                .update(|record| record.set(SettingKey::DriveFolder, folder_id))
                .await?;
        }
        Ok(created)
    }
}

#[async_trait]
impl BackupProvider for DriveProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Drive
    }

    async fn upload(&self) -> Result<bool> {
        let backup = prepare_backup(&self.ctx, self.tokens.keys()).await?;

        let Some(token) = self.tokens.get_token().await? else {
            info!(provider = %self.kind(), "No access token, skipping backup");
            return Ok(false);
        };

        let folder_id = match self.ensure_folder(&token).await? {
            ApiOutcome::Success(folder_id) => folder_id,
            ApiOutcome::Unauthorized => {
                self.tokens.expire().await?;
                return Ok(false);
            }
            ApiOutcome::Failed(reason) => {
                warn!(provider = %self.kind(), reason = reason.as_str(), "Backup folder unavailable");
                return Ok(false);
            }
        };

        let name = self.ctx.backup_file_name();
        match self.client.upload(&token, &folder_id, &name, &backup).await? {
            ApiOutcome::Success(()) => {
                info!(provider = %self.kind(), file = name.as_str(), "Backup uploaded");
                Ok(true)
            }
            ApiOutcome::Unauthorized => {
                self.tokens.expire().await?;
                Ok(false)
            }
            ApiOutcome::Failed(reason) => {
                warn!(provider = %self.kind(), reason = reason.as_str(), "Backup upload failed");
                Ok(false)
            }
        }
    }

    async fn account(&self) -> Result<AccountLookup> {
        let Some(token) = self.tokens.get_token().await? else {
            return Ok(AccountLookup::NoToken);
        };

        Ok(match self.client.about(&token).await? {
            ApiOutcome::Success(email) => AccountLookup::Account(email),
            ApiOutcome::Unauthorized => {
                self.tokens.expire().await?;
                AccountLookup::Unauthorized
            }
            ApiOutcome::Failed(reason) => AccountLookup::Failed(reason),
        })
    }
}
