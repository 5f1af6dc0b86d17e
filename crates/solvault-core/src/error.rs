use thiserror::Error;

pub type VaultResult<T> = Result<T, VaultError>;

/// Why a mnemonic phrase was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MnemonicError {
    /// A word is not in the BIP39 English list
    BadWord,
    /// The embedded checksum bits do not match
    BadChecksum,
    /// Word count is not 12 or 24
    BadLength,
}

impl std::fmt::Display for MnemonicError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MnemonicError::BadWord => "unknown word",
            MnemonicError::BadChecksum => "checksum mismatch",
            MnemonicError::BadLength => "unsupported word count",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("weak password: {0}")]
    WeakPassword(String),

    #[error("account locked until {until_ms} (retry in {retry_after_ms} ms)")]
    AccountLocked { until_ms: u64, retry_after_ms: u64 },

    #[error("invalid password")]
    InvalidPassword,

    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(MnemonicError),

    #[error("invalid derivation path: {0}")]
    InvalidPath(String),

    #[error("invalid child index: {0}")]
    InvalidChildIndex(String),

    #[error("invalid path modifier: {0}")]
    InvalidModifier(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("wallet already imported as '{0}'")]
    DuplicateWallet(String),

    #[error("wallet not found: {0}")]
    WalletNotFound(String),

    #[error("wallet {0} has no signing key")]
    NoSigningKey(String),

    #[error("vault is locked")]
    NotUnlocked,

    #[error("secret material cannot be saved without an unlocked session")]
    EncryptionRequired,

    #[error("device returned status 0x{0:04x}")]
    DeviceError(u16),

    #[error("blind signing is disabled on the device; enable it in the Solana app settings")]
    BlindSigningRequired,

    #[error("device did not answer in time")]
    DeviceTimeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("origin not connected: {0}")]
    Unauthorized(String),

    #[error("request {0} expired")]
    RequestExpired(u64),

    #[error("request {0} not found")]
    RequestNotFound(u64),

    #[error("request {0} requires re-authentication")]
    ReauthRequired(u64),

    #[error("request {request_id} rejected: {reason}")]
    Rejected { request_id: u64, reason: String },

    #[error("rate-limit state was tampered with; counter reset")]
    TamperingDetected,

    #[error("operation cancelled")]
    Cancelled,

    #[error("config error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VaultError {
    /// Text safe to show to an end user.
    ///
    /// Unlock failures collapse into one message so the UI cannot tell a wrong
    /// password from a missing vault. Lockouts always carry the wait time.
    pub fn user_message(&self) -> String {
        match self {
            VaultError::InvalidPassword | VaultError::WalletNotFound(_) | VaultError::NotUnlocked => {
                "Unable to unlock. Check your password and try again.".into()
            }
            VaultError::AccountLocked { retry_after_ms, .. } => {
                let secs = retry_after_ms.div_ceil(1000);
                format!("Too many attempts. Try again in {secs} seconds.")
            }
            VaultError::Storage(_) | VaultError::Other(_) => {
                "Something went wrong while accessing the vault.".into()
            }
            other => other.to_string(),
        }
    }

    /// True for errors produced by the rate limiter.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, VaultError::AccountLocked { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unlock_failures_share_one_message() {
        let a = VaultError::InvalidPassword.user_message();
        let b = VaultError::WalletNotFound("w1".into()).user_message();
        let c = VaultError::NotUnlocked.user_message();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn lockout_message_carries_wait() {
        let err = VaultError::AccountLocked {
            until_ms: 10_000,
            retry_after_ms: 4_500,
        };
        assert!(err.user_message().contains("5 seconds"));
        assert!(err.is_rate_limited());
    }

    #[test]
    fn device_error_formats_status_word() {
        assert_eq!(
            VaultError::DeviceError(0x6a80).to_string(),
            "device returned status 0x6a80"
        );
    }
}
