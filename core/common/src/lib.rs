//! Common types shared across the AuthBackup crates.
//!
//! This crate holds the error taxonomy and the small enums that both the
//! settings layer and the cloud providers need to agree on.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{ProviderKind, StorageLocation};
