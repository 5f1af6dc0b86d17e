//! solvault: non-custodial Solana key vault CLI
//!
//! Vault commands:
//!   init                    - write a default config and create the data dir
//!   create / import         - add a recovery-phrase wallet
//!   import-key / watch      - add a raw-key or watch-only wallet
//!   list / select / rename / remove
//!   export-mnemonic / export-key / change-password
//!
//! Offline commands (no vault needed):
//!   derive                  - print the public key at a path
//!   accounts                - list the first accounts of a phrase
//!   config show             - display the active configuration

mod prompt;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};

use solvault_core::config::{expand_tilde, SolvaultConfig};
use solvault_core::{DerivationScheme, SystemClock, VaultError, WalletId};
use solvault_crypto::{
    generate_mnemonic, mnemonic_to_keypair_with_path, parse_mnemonic, DerivationPath, Keypair,
};
use solvault_discovery::default_accounts;
use solvault_store::{AutoLock, Store};
use solvault_vault::{Vault, VaultOptions};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "solvault",
    version,
    about = "Non-custodial Solana key vault",
    long_about = "solvault: keep Solana keys encrypted at rest, derive accounts, and sign"
)]
struct Cli {
    /// Path to solvault.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "SOLVAULT_CONFIG",
        default_value = "~/.config/solvault/config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides log.level
    #[arg(long, env = "SOLVAULT_LOG")]
    log: Option<String>,

    /// Log format; overrides log.format
    #[arg(long, env = "SOLVAULT_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq)]
enum Scheme {
    /// m/44'/501'/{account}'/0'
    Standard,
    /// m/44'/501'/{account}'
    Legacy,
}

impl From<Scheme> for DerivationScheme {
    fn from(s: Scheme) -> Self {
        match s {
            Scheme::Standard => DerivationScheme::Standard,
            Scheme::Legacy => DerivationScheme::Legacy,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default config file and create the data directory
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
        /// Auto-lock timeout in minutes (0, 1, 5, 15, 30, 60, 1440)
        #[arg(long)]
        auto_lock: Option<i64>,
    },

    /// Generate a new recovery phrase and store it
    Create {
        #[arg(long, short = 'n', default_value = "Wallet")]
        name: String,
        /// Phrase length: 12 or 24 words
        #[arg(long, default_value_t = 12)]
        words: usize,
    },

    /// Import accounts of an existing recovery phrase
    ///
    /// The phrase is read from the terminal without echo.
    Import {
        #[arg(long, short = 'n', default_value = "Wallet")]
        name: String,
        /// First account index
        #[arg(long, default_value_t = 0)]
        index: u32,
        /// Number of consecutive accounts to import
        #[arg(long, default_value_t = 1)]
        count: u32,
        #[arg(long, value_enum, default_value_t = Scheme::Standard)]
        scheme: Scheme,
    },

    /// Import a raw private key (base58 prompt or Solana CLI keypair file)
    #[command(name = "import-key")]
    ImportKey {
        #[arg(long, short = 'n', default_value = "Imported")]
        name: String,
        /// Expected public key; import fails if it does not match
        #[arg(long)]
        public_key: Option<String>,
        /// JSON keypair file (`[u8; 64]`)
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Track an address without its key
    Watch {
        public_key: String,
        #[arg(long, short = 'n', default_value = "Watched")]
        name: String,
    },

    /// List stored wallets
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Make a wallet the active one
    Select { id: String },

    Rename { id: String, name: String },

    Remove { id: String },

    /// Print a wallet's recovery phrase (asks for the password)
    #[command(name = "export-mnemonic")]
    ExportMnemonic { id: String },

    /// Print a wallet's base58 keypair (asks for the password)
    #[command(name = "export-key")]
    ExportKey { id: String },

    /// Re-key the vault under a new password
    #[command(name = "change-password")]
    ChangePassword,

    /// Derive the public key at an account or explicit path
    Derive {
        #[arg(long, default_value_t = 0)]
        account: u32,
        #[arg(long, value_enum, default_value_t = Scheme::Standard)]
        scheme: Scheme,
        /// Explicit path, e.g. m/44'/501'/3'/0' (overrides --account/--scheme)
        #[arg(long)]
        path: Option<String>,
    },

    /// List the first standard accounts of a phrase without probing balances
    Accounts {
        /// Defaults to discovery.default_count
        #[arg(long)]
        count: Option<u32>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config = SolvaultConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, format);
    debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "solvault starting"
    );

    match cli.command {
        Commands::Init { force, auto_lock } => cmd_init(&config, &config_path, force, auto_lock).await,
        Commands::Create { name, words } => cmd_create(&config, &name, words).await,
        Commands::Import {
            name,
            index,
            count,
            scheme,
        } => cmd_import(&config, &name, index, count, scheme.into()).await,
        Commands::ImportKey {
            name,
            public_key,
            file,
        } => cmd_import_key(&config, &name, public_key.as_deref(), file.as_deref()).await,
        Commands::Watch { public_key, name } => cmd_watch(&config, &public_key, &name).await,
        Commands::List { json } => cmd_list(&config, json).await,
        Commands::Select { id } => {
            let vault = unlocked_vault(&config).await?;
            vault.select(&WalletId::from(id)).await?;
            println!("active wallet changed");
            Ok(())
        }
        Commands::Rename { id, name } => {
            let vault = unlocked_vault(&config).await?;
            vault.rename(&WalletId::from(id), &name).await?;
            println!("renamed to {}", name.trim());
            Ok(())
        }
        Commands::Remove { id } => {
            let vault = unlocked_vault(&config).await?;
            vault.remove(&WalletId::from(id.as_str())).await?;
            println!("removed {id}");
            Ok(())
        }
        Commands::ExportMnemonic { id } => cmd_export(&config, &id, Export::Mnemonic).await,
        Commands::ExportKey { id } => cmd_export(&config, &id, Export::PrivateKey).await,
        Commands::ChangePassword => cmd_change_password(&config).await,
        Commands::Derive {
            account,
            scheme,
            path,
        } => cmd_derive(account, scheme.into(), path.as_deref()),
        Commands::Accounts { count } => {
            cmd_accounts(count.unwrap_or(config.discovery.default_count))
        }
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &config_path),
    }
}

fn init_logging(level: &str, format: LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries command output
    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Vault access ──────────────────────────────────────────────────────────────

async fn open_vault(config: &SolvaultConfig) -> Result<Vault> {
    let dir = config.data_dir();
    let store = Store::open_fs(&dir)
        .await
        .with_context(|| format!("opening vault store: {}", dir.display()))?;
    let vault = Vault::open(
        Arc::new(store),
        Arc::new(SystemClock),
        VaultOptions::from_config(config),
    )
    .await?;
    Ok(vault)
}

/// Unlock, surfacing only the sanitized message on failure.
async fn unlock(vault: &Vault, pw: &SecretString) -> Result<()> {
    let info = vault
        .unlock(pw)
        .await
        .map_err(|e: VaultError| anyhow::anyhow!(e.user_message()))?;
    if info.tamper_reset {
        eprintln!("warning: {}", VaultError::TamperingDetected.user_message());
    }
    Ok(())
}

/// Open the vault and unlock it if it is password protected.
async fn unlocked_vault(config: &SolvaultConfig) -> Result<Vault> {
    let vault = open_vault(config).await?;
    if !vault.is_unlocked().await {
        let pw = prompt::password("Vault password: ")?;
        unlock(&vault, &pw).await?;
    }
    Ok(vault)
}

/// Password for an operation that seals secrets: the existing one (which
/// also unlocks) or, for a fresh vault, a new one.
async fn write_password(vault: &Vault) -> Result<SecretString> {
    if !vault.has_password().await? {
        println!("Choose a password to encrypt the vault.");
        return prompt::new_password();
    }
    let pw = prompt::password("Vault password: ")?;
    if !vault.is_unlocked().await {
        unlock(vault, &pw).await?;
    }
    Ok(pw)
}

// ── `solvault init` ──────────────────────────────────────────────────────────

async fn cmd_init(
    config: &SolvaultConfig,
    config_path: &Path,
    force: bool,
    auto_lock: Option<i64>,
) -> Result<()> {
    if config_path.exists() && !force {
        println!("config exists: {} (use --force to overwrite)", config_path.display());
    } else {
        if let Some(parent) = config_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating config dir: {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(config).context("serializing config")?;
        tokio::fs::write(config_path, text)
            .await
            .with_context(|| format!("writing config: {}", config_path.display()))?;
        println!("wrote {}", config_path.display());
    }

    let dir = config.data_dir();
    let store = Store::open_fs(&dir)
        .await
        .with_context(|| format!("opening vault store: {}", dir.display()))?;
    if let Some(minutes) = auto_lock {
        store.set_auto_lock(AutoLock::try_from(minutes)?).await?;
    }
    info!(data_dir = %dir.display(), "vault initialized");
    println!("data dir: {}", dir.display());
    println!("auto-lock: {} min", store.auto_lock().await?.minutes());
    Ok(())
}

// ── `solvault create` / `import` ─────────────────────────────────────────────

async fn cmd_create(config: &SolvaultConfig, name: &str, words: usize) -> Result<()> {
    let mnemonic = generate_mnemonic(words)?;
    let vault = open_vault(config).await?;
    let pw = write_password(&vault).await?;
    let id = vault.create_wallet(mnemonic.phrase(), name, &pw).await?;

    println!("Recovery phrase (write it down, it is shown once):");
    println!();
    println!("  {}", mnemonic.phrase());
    println!();
    println!("wallet:  {id}");
    println!("address: {}", vault.active_public_key().await?);
    Ok(())
}

async fn cmd_import(
    config: &SolvaultConfig,
    name: &str,
    index: u32,
    count: u32,
    scheme: DerivationScheme,
) -> Result<()> {
    let phrase = prompt::mnemonic()?;
    // fail before asking for the password
    parse_mnemonic(phrase.expose_secret())?;

    let vault = open_vault(config).await?;
    let pw = write_password(&vault).await?;
    let last = index
        .checked_add(count.max(1) - 1)
        .context("account range overflows")?;
    let accounts: Vec<_> = (index..=last).map(|i| (scheme, i)).collect();
    let report = vault
        .import_accounts(phrase.expose_secret(), name, &pw, &accounts)
        .await?;

    let wallets = vault.list_wallets().await?;
    for id in &report.imported {
        if let Some(w) = wallets.iter().find(|w| &w.id == id) {
            println!("imported {}  {}  {}", w.id, w.public_key, w.name);
        }
    }
    for s in &report.skipped {
        println!(
            "skipped  {} #{} (already stored as \"{}\")",
            s.scheme, s.index, s.existing_name
        );
    }
    Ok(())
}

// ── `solvault import-key` / `watch` ──────────────────────────────────────────

async fn cmd_import_key(
    config: &SolvaultConfig,
    name: &str,
    public_key: Option<&str>,
    file: Option<&Path>,
) -> Result<()> {
    let secret = match file {
        Some(path) => {
            let json = tokio::fs::read(path)
                .await
                .with_context(|| format!("reading keypair file: {}", path.display()))?;
            let keypair = Keypair::from_json_bytes(&json)?;
            SecretString::from(keypair.to_base58().as_str().to_owned())
        }
        None => prompt::private_key()?,
    };

    let vault = open_vault(config).await?;
    let pw = write_password(&vault).await?;
    let id = vault
        .import_private_key(public_key, secret.expose_secret(), name, &pw)
        .await?;
    println!("imported {id}");
    Ok(())
}

async fn cmd_watch(config: &SolvaultConfig, public_key: &str, name: &str) -> Result<()> {
    let vault = open_vault(config).await?;
    let pw = if vault.has_password().await? {
        Some(write_password(&vault).await?)
    } else {
        None
    };
    let id = vault.import_watch_only(public_key, name, pw.as_ref()).await?;
    println!("watching {public_key} as {id}");
    Ok(())
}

// ── `solvault list` ──────────────────────────────────────────────────────────

async fn cmd_list(config: &SolvaultConfig, json: bool) -> Result<()> {
    let vault = unlocked_vault(config).await?;
    let wallets = vault.list_wallets().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&wallets)?);
        return Ok(());
    }
    if wallets.is_empty() {
        println!("no wallets");
        return Ok(());
    }
    for w in &wallets {
        let marker = if w.active { "*" } else { " " };
        println!(
            "{marker} {}  {:<11}  {}  {}",
            w.id, w.kind, w.public_key, w.name
        );
    }
    Ok(())
}

// ── `solvault export-*` / `change-password` ──────────────────────────────────

enum Export {
    Mnemonic,
    PrivateKey,
}

async fn cmd_export(config: &SolvaultConfig, id: &str, what: Export) -> Result<()> {
    let vault = open_vault(config).await?;
    let pw = prompt::password("Vault password: ")?;
    if !vault.is_unlocked().await {
        unlock(&vault, &pw).await?;
    }
    let id = WalletId::from(id);
    let secret = match what {
        Export::Mnemonic => vault.export_mnemonic(&id, &pw).await?,
        Export::PrivateKey => vault.export_private_key(&id, &pw).await?,
    };
    println!("{}", secret.as_str());
    Ok(())
}

async fn cmd_change_password(config: &SolvaultConfig) -> Result<()> {
    let vault = open_vault(config).await?;
    if !vault.has_password().await? {
        anyhow::bail!("vault has no password yet; add a wallet first");
    }
    let old = prompt::password("Current password: ")?;
    unlock(&vault, &old).await?;
    let new = prompt::new_password()?;
    vault.change_password(&old, &new).await?;
    println!("password changed");
    Ok(())
}

// ── `solvault derive` / `accounts` ───────────────────────────────────────────

fn cmd_derive(account: u32, scheme: DerivationScheme, path: Option<&str>) -> Result<()> {
    let path = match path {
        Some(p) => DerivationPath::parse(p, true)?,
        None => DerivationPath::for_scheme(scheme, account),
    };
    let phrase = prompt::mnemonic()?;
    let mnemonic = parse_mnemonic(phrase.expose_secret())?;
    let keypair = mnemonic_to_keypair_with_path(&mnemonic, &path)?;
    println!("{path}  {}", keypair.public_key_base58());
    Ok(())
}

fn cmd_accounts(count: u32) -> Result<()> {
    let phrase = prompt::mnemonic()?;
    let mnemonic = parse_mnemonic(phrase.expose_secret())?;
    for account in default_accounts(&mnemonic, count)? {
        println!(
            "{:>3}  {}  {}",
            account.index,
            account.scheme.path(account.index),
            account.public_key
        );
    }
    Ok(())
}

// ── `solvault config show` ───────────────────────────────────────────────────

fn cmd_config_show(config: &SolvaultConfig, path: &Path) -> Result<()> {
    println!("# config: {}", path.display());
    println!("{}", toml::to_string_pretty(config).context("serializing config")?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn import_defaults() {
        let cli = Cli::try_parse_from(["solvault", "import", "--count", "3"]).unwrap();
        match cli.command {
            Commands::Import {
                name,
                index,
                count,
                scheme,
            } => {
                assert_eq!(name, "Wallet");
                assert_eq!(index, 0);
                assert_eq!(count, 3);
                assert_eq!(scheme, Scheme::Standard);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn legacy_scheme_maps_through() {
        let cli = Cli::try_parse_from(["solvault", "derive", "--account", "2", "--scheme", "legacy"])
            .unwrap();
        let Commands::Derive { account, scheme, path } = cli.command else {
            panic!("expected derive");
        };
        assert_eq!(account, 2);
        assert_eq!(DerivationScheme::from(scheme), DerivationScheme::Legacy);
        assert!(path.is_none());
    }

    #[test]
    fn secrets_are_not_flags() {
        assert!(Cli::try_parse_from(["solvault", "import", "--mnemonic", "abandon"]).is_err());
        assert!(Cli::try_parse_from(["solvault", "export-key", "id", "--password", "x"]).is_err());
    }
}
