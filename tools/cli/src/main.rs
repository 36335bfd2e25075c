//! AuthBackup CLI - back up exported vaults to cloud storage.
//!
//! Settings (tokens included) are read from and written to the settings
//! directory; the vault export itself is produced by another tool and
//! handed in as a file.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use authbackup_common::{ProviderKind, StorageLocation};
use authbackup_settings::{BackupStatus, FileBackend, SettingKey, SettingsStore};
use authbackup_storage::{
    create_default_registry, CloudCredentials, FileExportSource, ProviderContext, ReqwestTransport,
};

#[derive(Parser)]
#[command(name = "authbackup")]
#[command(about = "AuthBackup - Cloud backups for authenticator vaults")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// OAuth client credentials (JSON).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the settings partitions.
    #[arg(long, global = true)]
    settings_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a backup to a provider.
    Upload {
        /// Provider: dropbox, drive or onedrive.
        #[arg(short, long)]
        provider: ProviderKind,

        /// Exported vault (JSON).
        #[arg(short, long)]
        export: PathBuf,

        /// Encrypted export, used when the provider's encryption is enabled.
        #[arg(long)]
        encrypted_export: Option<PathBuf>,
    },

    /// Show the account connected to a provider.
    User {
        /// Provider: dropbox, drive or onedrive.
        #[arg(short, long)]
        provider: ProviderKind,
    },

    /// Show the backup status of every provider.
    Status,

    /// Inspect or change settings.
    #[command(subcommand)]
    Settings(SettingsCommand),

    /// Print shell completions.
    Completions {
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Print all settings, or one key.
    Get {
        key: Option<String>,
    },

    /// Set a key. The value is parsed as JSON, falling back to a string.
    Set {
        key: String,
        value: String,
    },

    /// Remove a key.
    Remove {
        key: String,
    },

    /// Move syncable settings to the local or sync partition.
    Location {
        location: StorageLocation,
    },

    /// Import a flat string-to-string settings dump.
    ImportLegacy {
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "authbackup", &mut io::stdout());
        return Ok(());
    }

    let settings = open_settings(cli.settings_dir.as_deref())?;

    match cli.command {
        Commands::Upload {
            provider,
            export,
            encrypted_export,
        } => {
            cmd_upload(
                &settings,
                cli.config.as_deref(),
                provider,
                &export,
                encrypted_export.as_deref(),
            )
            .await
        }

        Commands::User { provider } => cmd_user(&settings, cli.config.as_deref(), provider).await,

        Commands::Status => cmd_status(&settings).await,

        Commands::Settings(command) => cmd_settings(&settings, command).await,

        Commands::Completions { .. } => Ok(()),
    }
}

fn open_settings(dir: Option<&Path>) -> Result<SettingsStore> {
    let dir = match dir {
        Some(dir) => dir.to_path_buf(),
        None => dirs::data_dir()
            .context("No data directory on this platform, pass --settings-dir")?
            .join("authbackup"),
    };

    let backend = FileBackend::new(&dir)
        .with_context(|| format!("Failed to open settings in {}", dir.display()))?;
    Ok(SettingsStore::new(Arc::new(backend)))
}

fn load_credentials(path: Option<&Path>, provider: ProviderKind) -> Result<CloudCredentials> {
    let credentials = match path {
        Some(path) => CloudCredentials::from_json_file(path)
            .with_context(|| format!("Failed to load credentials from {}", path.display()))?,
        None => CloudCredentials::default(),
    };

    if credentials
        .for_provider(provider)
        .is_some_and(|c| c.is_placeholder())
    {
        warn!(%provider, "Using placeholder OAuth client credentials, token refresh will fail");
    }
    Ok(credentials)
}

/// Build a provider context around the given export.
fn context(settings: &SettingsStore, export: FileExportSource) -> Result<ProviderContext> {
    let transport = ReqwestTransport::new().context("Failed to create HTTP transport")?;
    Ok(ProviderContext::new(
        settings.clone(),
        Arc::new(transport),
        Arc::new(export),
    ))
}

/// Upload one backup.
async fn cmd_upload(
    settings: &SettingsStore,
    config: Option<&Path>,
    provider: ProviderKind,
    export: &Path,
    encrypted_export: Option<&Path>,
) -> Result<()> {
    info!("Uploading backup to {}", provider);

    let mut source = FileExportSource::new(export);
    if let Some(encrypted) = encrypted_export {
        source = source.with_encrypted(encrypted);
    }

    let registry = create_default_registry(load_credentials(config, provider)?, None);
    let backup = registry
        .resolve(provider.name(), context(settings, source)?)
        .context("Failed to create provider")?;

    if backup.upload().await.context("Backup upload failed")? {
        println!("Backup uploaded to {}.", provider);
    } else {
        anyhow::bail!(
            "Backup was not uploaded to {}. Reconnect the account if this persists.",
            provider
        );
    }

    Ok(())
}

/// Show the connected account.
async fn cmd_user(settings: &SettingsStore, config: Option<&Path>, provider: ProviderKind) -> Result<()> {
    let registry = create_default_registry(load_credentials(config, provider)?, None);
    // Account lookups never export.
    let backup = registry
        .resolve(provider.name(), context(settings, FileExportSource::new("/dev/null"))?)
        .context("Failed to create provider")?;

    println!("{}", backup.get_user().await);
    Ok(())
}

/// Show provider status.
async fn cmd_status(settings: &SettingsStore) -> Result<()> {
    let record = settings.get_all().await.context("Failed to read settings")?;
    let status = BackupStatus::from_record(&record);

    println!("Settings location: {}", record.storage_location().unwrap_or_default());
    for entry in &status.providers {
        let state = match (entry.connected, entry.revoked) {
            (true, _) => "connected",
            (false, true) => "revoked",
            (false, false) => "not connected",
        };
        println!(
            "  {:<9} {:<14} encrypted: {}",
            entry.provider.name(),
            state,
            if entry.encrypted { "yes" } else { "no" }
        );
    }

    Ok(())
}

/// Settings subcommands.
async fn cmd_settings(settings: &SettingsStore, command: SettingsCommand) -> Result<()> {
    match command {
        SettingsCommand::Get { key } => {
            let record = settings.get_all().await.context("Failed to read settings")?;
            match key {
                Some(key) => match record.get(&key) {
                    Some(value) => println!("{}", value),
                    None => anyhow::bail!("Setting '{}' is not set", key),
                },
                None => println!("{}", serde_json::to_string_pretty(&record)?),
            }
        }

        SettingsCommand::Set { key, value } => {
            check_writable(&key)?;
            if SettingKey::from_name(&key).is_none() {
                warn!(key = key.as_str(), "Not a known setting, storing as syncable");
            }
            let value = parse_value(&value);
            settings
                .update(|record| record.set(&key, value))
                .await
                .context("Failed to write settings")?;
            println!("Set {}.", key);
        }

        SettingsCommand::Remove { key } => {
            check_writable(&key)?;
            settings
                .remove_item(&key)
                .await
                .context("Failed to write settings")?;
            println!("Removed {}.", key);
        }

        SettingsCommand::Location { location } => {
            settings
                .set_location(location)
                .await
                .context("Failed to move settings")?;
            println!("Settings location is now {}.", location);
        }

        SettingsCommand::ImportLegacy { file } => {
            let contents = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let data: HashMap<String, String> = serde_json::from_str(&contents)
                .context("Legacy settings must be a JSON object of strings")?;

            let imported = settings
                .import_legacy(&data)
                .await
                .context("Failed to import settings")?;
            println!("Imported {} of {} settings.", imported, data.len());
        }
    }

    Ok(())
}

/// The storage marker only changes through `settings location`, which
/// migrates values between partitions.
fn check_writable(key: &str) -> Result<()> {
    if SettingKey::from_name(key) == Some(SettingKey::StorageLocation) {
        anyhow::bail!(
            "'{}' cannot be edited directly, use `authbackup settings location <local|sync>`",
            key
        );
    }
    Ok(())
}

/// `true`, `3`, `["a"]` are JSON; anything else is a plain string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("true"), json!(true));
        assert_eq!(parse_value("15"), json!(15));
        assert_eq!(parse_value(r#"["a","b"]"#), json!(["a", "b"]));
        assert_eq!(parse_value("dark"), json!("dark"));
        assert_eq!(parse_value("\"quoted\""), json!("quoted"));
    }

    #[test]
    fn test_storage_marker_is_not_writable() {
        let err = check_writable("storageLocation").unwrap_err();
        assert!(err.to_string().contains("settings location"));

        assert!(check_writable("theme").is_ok());
        assert!(check_writable("dropboxToken").is_ok());
        assert!(check_writable("somethingNew").is_ok());
    }

    #[test]
    fn test_cli_parses() {
        Cli::command().debug_assert();

        let cli = Cli::try_parse_from([
            "authbackup",
            "upload",
            "--provider",
            "onedrive",
            "--export",
            "vault.json",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Upload { provider: ProviderKind::OneDrive, .. }
        ));

        let cli = Cli::try_parse_from(["authbackup", "settings", "location", "sync"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Settings(SettingsCommand::Location { location: StorageLocation::Sync })
        ));
    }
}
