//! Unlocked vault state. Lives only in process memory.

use serde::Serialize;

use solvault_core::WalletId;
use solvault_crypto::{VaultKey, SALT_SIZE};

use crate::wallet::WalletCollection;

/// The key that seals the collection, with the KDF inputs that produced it.
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    pub key: VaultKey,
    pub salt: [u8; SALT_SIZE],
    pub iterations: u32,
}

/// Decrypted collection plus the vault key.
///
/// Dropping a session wipes both: `VaultKey` and every `SecretText` in the
/// collection zeroize themselves.
#[derive(Debug)]
pub struct Session {
    pub(crate) collection: WalletCollection,
    /// None only for a plaintext vault that has never had a password
    pub(crate) key: Option<KeyMaterial>,
    pub(crate) unlocked_at_ms: u64,
    pub(crate) last_auth_ms: u64,
    /// Last password check found a forged rate-limit record
    pub(crate) tamper_reset: bool,
}

impl Session {
    pub(crate) fn new(collection: WalletCollection, key: Option<KeyMaterial>, now_ms: u64) -> Self {
        Self {
            collection,
            key,
            unlocked_at_ms: now_ms,
            last_auth_ms: now_ms,
            tamper_reset: false,
        }
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            wallet_count: self.collection.wallets.len(),
            active_wallet_id: self.collection.active_wallet_id.clone(),
            unlocked_at_ms: self.unlocked_at_ms,
            last_auth_ms: self.last_auth_ms,
            encrypted: self.key.is_some(),
            tamper_reset: self.tamper_reset,
        }
    }
}

/// Non-secret view of the current session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub wallet_count: usize,
    pub active_wallet_id: Option<WalletId>,
    pub unlocked_at_ms: u64,
    /// Last time the password was checked in this session
    pub last_auth_ms: u64,
    pub encrypted: bool,
    /// The failed-attempt counter was found edited and has been reset
    pub tamper_reset: bool,
}
