//! Cloud backup providers for AuthBackup.
//!
//! Each provider exports the vault through an [`ExportSource`], serializes
//! it, and uploads it to one cloud service. Credentials live in the
//! settings store and are driven through a shared [`TokenManager`].
//!
//! # Design Principles
//! - Provider isolation: per-service behavior sits behind [`TokenStrategy`]
//!   and [`BackupProvider`]
//! - Injected collaborators: settings, transport and export come in through
//!   [`ProviderContext`], never globals
//! - Auth failures are state transitions, not errors

pub mod auth;
pub mod config;
pub mod dropbox;
pub mod export;
pub mod gdrive;
pub mod onedrive;
pub mod provider;
pub mod registry;
pub mod transport;

#[cfg(test)]
mod testing;

pub use auth::{CredentialState, SilentReauth, TokenManager, TokenStrategy};
pub use config::{ClientCredentials, CloudCredentials};
pub use dropbox::{DropboxProvider, DropboxStrategy};
pub use export::{serialize_backup, ExportSource, FileExportSource};
pub use gdrive::{DriveProvider, DriveStrategy};
pub use onedrive::{OneDriveProvider, OneDriveStrategy};
pub use provider::{AccountLookup, ApiOutcome, BackupProvider, Clock, ProviderContext};
pub use registry::{create_default_registry, ProviderFactory, ProviderRegistry};
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};
