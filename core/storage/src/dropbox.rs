//! Dropbox backup provider.
//!
//! Dropbox tokens are long-lived and have no refresh path: a 401 revokes the
//! credential and the user has to connect again.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use authbackup_common::{ProviderKind, Result};

use crate::auth::{TokenManager, TokenStrategy};
use crate::provider::{
    missing_field, prepare_backup, AccountLookup, ApiOutcome, BackupProvider, ProviderContext,
};
use crate::transport::HttpRequest;

const UPLOAD_URL: &str = "https://content.dropboxapi.com/2/files/upload";
const ACCOUNT_URL: &str = "https://api.dropboxapi.com/2/users/get_current_account";

/// Dropbox token handling: no probe, no refresh.
pub struct DropboxStrategy;

impl TokenStrategy for DropboxStrategy {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Dropbox
    }
}

/// Upload arguments passed in the `Dropbox-API-Arg` header.
#[derive(Debug, Serialize)]
struct UploadArg<'a> {
    path: &'a str,
    mode: &'a str,
    autorename: bool,
}

/// Reply to an upload: the stored file's metadata, or an error.
#[derive(Debug, Deserialize)]
struct DropboxMetadata {
    name: Option<String>,
    error_summary: Option<String>,
}

/// Reply to `get_current_account`.
#[derive(Debug, Deserialize)]
struct DropboxAccount {
    email: Option<String>,
    error_summary: Option<String>,
}

pub struct DropboxProvider {
    ctx: ProviderContext,
    tokens: TokenManager,
}

impl DropboxProvider {
    pub fn new(ctx: ProviderContext) -> Self {
        let tokens = TokenManager::new(DropboxStrategy, ctx.settings.clone(), ctx.transport.clone());
        Self { ctx, tokens }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    async fn put_file(&self, token: &str, name: &str, contents: String) -> Result<ApiOutcome<String>> {
        let path = format!("/{}", name);
        let arg = serde_json::to_string(&UploadArg {
            path: &path,
            mode: "add",
            autorename: true,
        })?;

        let request = HttpRequest::post(UPLOAD_URL)
            .bearer(token)
            .header("Content-type", "application/octet-stream")
            .header("Dropbox-API-Arg", arg)
            .body(contents);

        let response = self.ctx.transport.send(request).await?;
        if response.is_unauthorized() {
            return Ok(ApiOutcome::Unauthorized);
        }

        let metadata: DropboxMetadata = response.json()?;
        Ok(match metadata.name {
            Some(stored) => ApiOutcome::Success(stored),
            None => ApiOutcome::Failed(failure_reason(metadata.error_summary, "name")),
        })
    }
}

#[async_trait]
impl BackupProvider for DropboxProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Dropbox
    }

    async fn upload(&self) -> Result<bool> {
        let backup = prepare_backup(&self.ctx, self.tokens.keys()).await?;

        let Some(token) = self.tokens.get_token().await? else {
            info!(provider = %self.kind(), "No access token, skipping backup");
            return Ok(false);
        };

        let name = self.ctx.backup_file_name();
        match self.put_file(&token, &name, backup).await? {
            ApiOutcome::Success(stored) => {
                info!(provider = %self.kind(), file = stored.as_str(), "Backup uploaded");
                Ok(true)
            }
            ApiOutcome::Unauthorized => {
                self.tokens.revoke().await?;
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

        let response = self
            .ctx
            .transport
            .send(HttpRequest::post(ACCOUNT_URL).bearer(&token))
            .await?;
        if response.is_unauthorized() {
            self.tokens.revoke().await?;
            return Ok(AccountLookup::Unauthorized);
        }

        let account: DropboxAccount = response.json()?;
        Ok(match account.email {
            Some(email) => AccountLookup::Account(email),
            None => AccountLookup::Failed(failure_reason(account.error_summary, "email")),
        })
    }
}

/// Dropbox errors carry a machine-readable `error_summary`; without one the
/// reply just lacked the field we needed.
fn failure_reason(error_summary: Option<String>, field: &str) -> String {
    error_summary.unwrap_or_else(|| missing_field(field).to_string())
}
