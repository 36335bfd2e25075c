//! OneDrive backup provider over Microsoft Graph.
//!
//! Backups are written to the app folder and overwrite any file with the
//! same name. Business accounts cannot use the app-folder scope, so the
//! refresh grant asks for full `Files.ReadWrite` for them. Tokens are only
//! renewed through the refresh-token grant.

use async_trait::async_trait;
use serde::de::IgnoredAny;
use serde::Deserialize;
use tracing::{info, warn};
use url::form_urlencoded;
use zeroize::Zeroizing;

use authbackup_common::{ProviderKind, Result};
use authbackup_settings::{SettingKey, SettingsRecord};

use crate::auth::{TokenManager, TokenStrategy};
use crate::config::ClientCredentials;
use crate::provider::{
    api_outcome, prepare_backup, AccountLookup, ApiOutcome, BackupProvider, ProviderContext,
};
use crate::transport::HttpRequest;

const GRAPH_BASE: &str = "https://graph.microsoft.com/v1.0";
const TOKEN_URL: &str = "https://login.microsoftonline.com/common/oauth2/v2.0/token";

/// Graph scopes requested on refresh.
fn scope(business: bool) -> String {
    let files = if business {
        "https://graph.microsoft.com/Files.ReadWrite"
    } else {
        "https://graph.microsoft.com/Files.ReadWrite.AppFolder"
    };
    format!("{} https://graph.microsoft.com/User.Read offline_access", files)
}

/// OneDrive token handling.
pub struct OneDriveStrategy {
    credentials: ClientCredentials,
}

impl OneDriveStrategy {
    pub fn new(credentials: ClientCredentials) -> Self {
        Self { credentials }
    }
}

impl TokenStrategy for OneDriveStrategy {
    fn provider(&self) -> ProviderKind {
        ProviderKind::OneDrive
    }

    fn probe(&self, token: &str) -> Option<HttpRequest> {
        Some(HttpRequest::get(format!("{}/me/drive/special/approot", GRAPH_BASE)).bearer(token))
    }

    fn refresh_request(
        &self,
        refresh_token: &str,
        settings: &SettingsRecord,
    ) -> Result<Option<HttpRequest>> {
        let business = settings.get_bool(SettingKey::OneDriveBusiness) == Some(true);
        let body = Zeroizing::new(
            form_urlencoded::Serializer::new(String::new())
                .append_pair("client_id", &self.credentials.client_id)
                .append_pair("refresh_token", refresh_token)
                .append_pair("client_secret", &self.credentials.client_secret)
                .append_pair("grant_type", "refresh_token")
                .append_pair("scope", &scope(business))
                .finish(),
        );

        Ok(Some(
            HttpRequest::post(TOKEN_URL)
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(body.as_bytes()),
        ))
    }
}

/// `GET /me/`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphUser {
    user_principal_name: Option<String>,
}

pub struct OneDriveProvider {
    ctx: ProviderContext,
    tokens: TokenManager,
}

impl OneDriveProvider {
    pub fn new(ctx: ProviderContext, credentials: ClientCredentials) -> Self {
        let tokens = TokenManager::new(
            OneDriveStrategy::new(credentials),
            ctx.settings.clone(),
            ctx.transport.clone(),
        );
        Self { ctx, tokens }
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }
}

#[async_trait]
impl BackupProvider for OneDriveProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OneDrive
    }

    async fn upload(&self) -> Result<bool> {
        let backup = prepare_backup(&self.ctx, self.tokens.keys()).await?;

        let Some(token) = self.tokens.get_token().await? else {
            info!(provider = %self.kind(), "No access token, skipping backup");
            return Ok(false);
        };

        let name = self.ctx.backup_file_name();
        let request = HttpRequest::put(format!(
            "{}/me/drive/special/approot:/{}:/content",
            GRAPH_BASE, name
        ))
        .bearer(&token)
        .header("Content-type", "application/octet-stream")
        .body(backup);

        let response = self.ctx.transport.send(request).await?;
        match api_outcome::<IgnoredAny>(&response)? {
            ApiOutcome::Success(_) => {
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

        let response = self
            .ctx
            .transport
            .send(HttpRequest::get(format!("{}/me/", GRAPH_BASE)).bearer(&token))
            .await?;

        let outcome = api_outcome::<GraphUser>(&response)?
            .require("userPrincipalName", |user| user.user_principal_name);
        Ok(match outcome {
            ApiOutcome::Success(principal) => AccountLookup::Account(principal),
            ApiOutcome::Unauthorized => {
                self.tokens.expire().await?;
                AccountLookup::Unauthorized
            }
            ApiOutcome::Failed(reason) => AccountLookup::Failed(reason),
        })
    }
}
