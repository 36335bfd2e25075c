//! Provider registry for resolving backup providers by name.

use std::collections::HashMap;
use std::sync::Arc;

use authbackup_common::{Error, ProviderKind, Result};

use crate::auth::SilentReauth;
use crate::config::CloudCredentials;
use crate::dropbox::DropboxProvider;
use crate::gdrive::DriveProvider;
use crate::onedrive::OneDriveProvider;
use crate::provider::{BackupProvider, ProviderContext};

/// Factory function type for creating providers.
pub type ProviderFactory =
    Box<dyn Fn(ProviderContext) -> Result<Arc<dyn BackupProvider>> + Send + Sync>;

/// Registry of backup provider factories.
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a provider factory.
    ///
    /// # Errors
    /// - `Error::InvalidInput` if the name is already registered
    pub fn register(&mut self, name: impl Into<String>, factory: ProviderFactory) -> Result<()> {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(Error::InvalidInput(format!(
                "Provider '{}' is already registered",
                name
            )));
        }
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Build the named provider over the given collaborators.
    ///
    /// # Errors
    /// - `Error::InvalidInput` if no provider has that name
    /// - Whatever the factory reports
    pub fn resolve(&self, name: &str, ctx: ProviderContext) -> Result<Arc<dyn BackupProvider>> {
        let factory = self.factories.get(name).ok_or_else(|| {
            Error::InvalidInput(format!("Provider '{}' is not registered", name))
        })?;
        factory(ctx)
    }

    /// Registered provider names, sorted.
    pub fn providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a provider is registered.
    pub fn has_provider(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a registry with Dropbox, Drive and OneDrive.
///
/// `silent` is handed to Drive, the only provider that can reauthenticate
/// without a refresh token.
pub fn create_default_registry(
    credentials: CloudCredentials,
    silent: Option<Arc<dyn SilentReauth>>,
) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new();

    registry.factories.insert(
        ProviderKind::Dropbox.name().to_string(),
        Box::new(|ctx| Ok(Arc::new(DropboxProvider::new(ctx)))),
    );

    let drive = credentials.drive;
    registry.factories.insert(
        ProviderKind::Drive.name().to_string(),
        Box::new(move |ctx| {
            Ok(Arc::new(DriveProvider::new(ctx, drive.clone(), silent.clone())))
        }),
    );

    let onedrive = credentials.onedrive;
    registry.factories.insert(
        ProviderKind::OneDrive.name().to_string(),
        Box::new(move |ctx| Ok(Arc::new(OneDriveProvider::new(ctx, onedrive.clone())))),
    );

    registry
}
