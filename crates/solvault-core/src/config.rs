use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{VaultError, VaultResult};

/// Lowest PBKDF2 iteration count accepted from a config file.
pub const MIN_KDF_ITERATIONS: u32 = 100_000;

/// Default PBKDF2-HMAC-SHA256 iteration count for new auth records and blobs.
pub const DEFAULT_KDF_ITERATIONS: u32 = 600_000;

/// Top-level configuration (loaded from solvault.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SolvaultConfig {
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub session: SessionConfig,
    pub gatekeeper: GatekeeperConfig,
    pub discovery: DiscoveryConfig,
    pub hardware: HardwareConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the key/value store (default: ~/.local/share/solvault)
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// PBKDF2-HMAC-SHA256 iterations for new records (default: 600000)
    pub kdf_iterations: u32,
    /// Failed-attempt lockout policy
    pub lockout_policy: LockoutPolicy,
}

/// Lockout thresholds for repeated password failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockoutPolicy {
    /// Lock for 1 hour after 10 failures
    #[default]
    Minimal,
    /// Lock for 24 hours after 20 failures
    Extended,
}

impl LockoutPolicy {
    pub fn max_attempts(self) -> u32 {
        match self {
            LockoutPolicy::Minimal => 10,
            LockoutPolicy::Extended => 20,
        }
    }

    pub fn lockout_ms(self) -> u64 {
        match self {
            LockoutPolicy::Minimal => 60 * 60 * 1000,
            LockoutPolicy::Extended => 24 * 60 * 60 * 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Minutes of inactivity before the session locks (0 = never)
    pub auto_lock_minutes: i64,
    /// Ask for the password when the app opens even if a session could be resumed
    pub require_password_on_open: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatekeeperConfig {
    /// Seconds a session stays fresh for signing; None = reauth on every sign
    pub reauth_window_secs: Option<u64>,
    /// Seconds before an unanswered dApp request is auto-rejected
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Upper bound on accounts probed per derivation scheme
    pub max_accounts: u32,
    /// Consecutive empty accounts that end a sweep
    pub max_empty: u32,
    /// Per-probe timeout in seconds
    pub probe_timeout_secs: u64,
    /// Funded accounts pre-selected for import
    pub max_preselected: usize,
    /// Accounts produced by the default (non-scanning) mode
    pub default_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareConfig {
    /// Per-instruction device timeout in seconds
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("~/.local/share/solvault"),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            lockout_policy: LockoutPolicy::Minimal,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auto_lock_minutes: 15,
            require_password_on_open: true,
        }
    }
}

impl Default for GatekeeperConfig {
    fn default() -> Self {
        Self {
            reauth_window_secs: None,
            request_timeout_secs: 60,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            max_accounts: 20,
            max_empty: 5,
            probe_timeout_secs: 30,
            max_preselected: 10,
            default_count: 5,
        }
    }
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl SolvaultConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml(s: &str) -> VaultResult<Self> {
        let config: SolvaultConfig =
            toml::from_str(s).map_err(|e| VaultError::Config(format!("parsing config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file is missing.
    pub fn load(path: &Path) -> VaultResult<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| VaultError::Config(format!("reading config {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> VaultResult<()> {
        if self.auth.kdf_iterations < MIN_KDF_ITERATIONS {
            return Err(VaultError::Config(format!(
                "auth.kdf_iterations must be at least {MIN_KDF_ITERATIONS}, got {}",
                self.auth.kdf_iterations
            )));
        }
        if self.discovery.max_empty == 0 || self.discovery.max_empty > self.discovery.max_accounts {
            return Err(VaultError::Config(format!(
                "discovery.max_empty must be in 1..={}",
                self.discovery.max_accounts
            )));
        }
        if !matches!(self.log.format.as_str(), "json" | "text") {
            return Err(VaultError::Config(format!(
                "log.format must be \"json\" or \"text\", got {:?}",
                self.log.format
            )));
        }
        Ok(())
    }

    /// The data directory with a leading `~/` expanded.
    pub fn data_dir(&self) -> PathBuf {
        expand_tilde(&self.storage.data_dir)
    }
}

pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(rest) = path.to_str().and_then(|s| s.strip_prefix("~/")) {
        let home = std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"));
        return home.join(rest);
    }
    path.to_path_buf()
}
