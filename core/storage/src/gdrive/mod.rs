//! Google Drive backup provider.
//!
//! - Access tokens are probed before use and refreshed with the
//!   refresh-token grant
//! - Backups are multipart uploads into a cached backup folder

pub mod auth;
pub mod client;
pub mod provider;

pub use auth::DriveStrategy;
pub use client::{DriveClient, FolderState, BACKUP_FOLDER_NAME};
pub use provider::DriveProvider;
