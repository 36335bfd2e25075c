//! User settings persistence for AuthBackup.
//!
//! Settings are one flat record split across two partitions:
//! - a local partition that never leaves the device, and
//! - a syncable partition that may propagate to the user's other devices.
//!
//! Which keys are local-only is fixed by [`SettingKey::LOCAL_ONLY`]. Tokens,
//! refresh tokens and revocation flags are always local-only, whatever the
//! user's storage-location preference says.

pub mod backend;
pub mod keys;
pub mod legacy;
pub mod local;
pub mod memory;
pub mod record;
pub mod status;
pub mod store;

pub use backend::SettingsBackend;
pub use keys::{is_local_only, CredentialKeys, SettingKey};
pub use local::FileBackend;
pub use memory::MemoryBackend;
pub use record::SettingsRecord;
pub use status::{BackupStatus, ProviderStatus};
pub use store::SettingsStore;
