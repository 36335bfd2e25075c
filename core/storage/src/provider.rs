//! Backup provider trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use authbackup_common::{Error, ProviderKind, Result};
use authbackup_settings::{CredentialKeys, SettingsStore};

use crate::export::{serialize_backup, ExportSource};
use crate::transport::{HttpResponse, Transport};

/// Source of the current time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Collaborators every provider is built from.
#[derive(Clone)]
pub struct ProviderContext {
    pub settings: SettingsStore,
    pub transport: Arc<dyn Transport>,
    pub export: Arc<dyn ExportSource>,
    clock: Clock,
}

impl ProviderContext {
    pub fn new(
        settings: SettingsStore,
        transport: Arc<dyn Transport>,
        export: Arc<dyn ExportSource>,
    ) -> Self {
        Self {
            settings,
            transport,
            export,
            clock: Arc::new(Utc::now),
        }
    }

    /// Replace the clock used to name backup files.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// `<YYYYMMDD>.json` for the current UTC date.
    pub fn backup_file_name(&self) -> String {
        format!("{}.json", self.now().format("%Y%m%d"))
    }
}

/// Outcome of a single authenticated API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiOutcome<T> {
    Success(T),
    /// HTTP 401.
    Unauthorized,
    /// Any other failure the API reported, with its message.
    Failed(String),
}

impl<T> ApiOutcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiOutcome<U> {
        match self {
            ApiOutcome::Success(value) => ApiOutcome::Success(f(value)),
            ApiOutcome::Unauthorized => ApiOutcome::Unauthorized,
            ApiOutcome::Failed(message) => ApiOutcome::Failed(message),
        }
    }

    /// Take a field a successful response must carry.
    ///
    /// # Postconditions
    /// - A missing field turns `Success` into `Failed` with an
    ///   `Error::Protocol` message; other outcomes pass through
    pub(crate) fn require<U>(self, field: &str, f: impl FnOnce(T) -> Option<U>) -> ApiOutcome<U> {
        match self {
            ApiOutcome::Success(body) => match f(body) {
                Some(value) => ApiOutcome::Success(value),
                None => ApiOutcome::Failed(missing_field(field).to_string()),
            },
            ApiOutcome::Unauthorized => ApiOutcome::Unauthorized,
            ApiOutcome::Failed(message) => ApiOutcome::Failed(message),
        }
    }
}

/// Protocol error for a well-formed response that lacks `field`.
pub(crate) fn missing_field(field: &str) -> Error {
    Error::Protocol(format!("Response has no {}", field))
}

/// Result of looking up the connected account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountLookup {
    /// Human-readable account identifier (usually an email address).
    Account(String),
    /// No usable token and none could be obtained.
    NoToken,
    /// The provider rejected the token during the lookup.
    Unauthorized,
    /// The lookup failed for another reason.
    Failed(String),
}

/// Presentation form: the account name, or an `Error: ...` string.
impl fmt::Display for AccountLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountLookup::Account(name) => write!(f, "{}", name),
            AccountLookup::NoToken => write!(f, "Error: Access revoked or expired."),
            AccountLookup::Unauthorized => write!(
                f,
                "Error: Response was 401. You will be logged out the next time you open Authenticator."
            ),
            AccountLookup::Failed(_) => write!(f, "Error"),
        }
    }
}

/// A cloud service that can receive backups.
///
/// Missing or unusable credentials are a normal outcome: `upload` returns
/// `Ok(false)` and `account` returns [`AccountLookup::NoToken`]. Errors are
/// reserved for transport failures and malformed responses.
#[async_trait]
pub trait BackupProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Export, serialize and upload one backup.
    ///
    /// # Postconditions
    /// - An unset encryption preference is stored as enabled
    /// - No backup request is sent without an access token
    ///
    /// # Returns
    /// - `Ok(true)` if the provider accepted the file
    /// - `Ok(false)` if no token was available or the provider refused
    ///
    /// # Errors
    /// - Transport failures and non-JSON responses
    /// - Export or settings failures
    async fn upload(&self) -> Result<bool>;

    /// Look up the connected account.
    async fn account(&self) -> Result<AccountLookup>;

    /// [`account`](Self::account) formatted for display.
    async fn get_user(&self) -> String {
        match self.account().await {
            Ok(lookup) => {
                if let AccountLookup::Failed(reason) = &lookup {
                    warn!(provider = %self.kind(), reason = reason.as_str(), "Account lookup failed");
                }
                lookup.to_string()
            }
            Err(e) => {
                warn!(provider = %self.kind(), error = %e, "Account lookup failed");
                AccountLookup::Failed(e.to_string()).to_string()
            }
        }
    }
}

/// Steps shared by every upload: settle the encryption preference, export,
/// serialize.
///
/// An unset encryption preference defaults to enabled and is persisted.
pub(crate) async fn prepare_backup(ctx: &ProviderContext, keys: &CredentialKeys) -> Result<String> {
    let record = ctx.settings.get_all().await?;

    let encrypted = match record.get_bool(keys.encrypted) {
        Some(encrypted) => encrypted,
        None => {
            let key = keys.encrypted;
            ctx.settings
                .update(|record| record.set(key, true))
                .await?;
            true
        }
    };

    let snapshot = ctx.export.export(encrypted).await?;
    serialize_backup(&snapshot)
}

/// Numeric or symbolic `error.code`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(crate) enum ErrorCode {
    Number(i64),
    Text(String),
}

/// The `error` member of an API or token-endpoint response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub(crate) enum ApiError {
    /// Google and Graph: `{"code": 401, "message": "..."}`.
    Detailed {
        code: Option<ErrorCode>,
        message: Option<String>,
    },
    /// OAuth token endpoints: `"invalid_grant"`.
    Plain(String),
    Other(Value),
}

impl ApiError {
    /// HTTP-style numeric code, if the body carries one.
    pub(crate) fn status_code(&self) -> Option<i64> {
        match self {
            ApiError::Detailed {
                code: Some(ErrorCode::Number(code)),
                ..
            } => Some(*code),
            _ => None,
        }
    }

    /// Whether this is the OAuth error `name`.
    pub(crate) fn is(&self, name: &str) -> bool {
        matches!(self, ApiError::Plain(code) if code == name)
    }

    pub(crate) fn message(&self) -> String {
        match self {
            ApiError::Detailed {
                message: Some(message),
                ..
            } => message.clone(),
            ApiError::Detailed {
                code: Some(ErrorCode::Number(code)),
                ..
            } => format!("error code {}", code),
            ApiError::Detailed {
                code: Some(ErrorCode::Text(code)),
                ..
            } => code.clone(),
            ApiError::Detailed { .. } => "unspecified error".to_string(),
            ApiError::Plain(code) => code.clone(),
            ApiError::Other(value) => value.to_string(),
        }
    }
}

/// Just the `error` member of a response body.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: Option<ApiError>,
}

impl ErrorEnvelope {
    pub(crate) fn status_code(&self) -> Option<i64> {
        self.error.as_ref().and_then(ApiError::status_code)
    }
}

/// Classify a Google/Graph-style response and decode its body as `T`.
///
/// A 401 status or `error.code == 401` is an authentication failure, any
/// other `error` is an API failure.
///
/// # Errors
/// - `Error::Transport` if the body is not JSON or not shaped like `T`
pub(crate) fn api_outcome<T: DeserializeOwned>(response: &HttpResponse) -> Result<ApiOutcome<T>> {
    if response.is_unauthorized() {
        return Ok(ApiOutcome::Unauthorized);
    }

    let envelope: ErrorEnvelope = response.json()?;
    Ok(match envelope.error {
        Some(error) if error.status_code() == Some(401) => ApiOutcome::Unauthorized,
        Some(error) => ApiOutcome::Failed(error.message()),
        None => ApiOutcome::Success(response.json()?),
    })
}
