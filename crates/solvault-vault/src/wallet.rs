//! Wallet collection model

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use solvault_core::{DerivationScheme, VaultError, VaultResult, WalletId};

/// A secret string (mnemonic phrase or base58 keypair) wiped on drop.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecretText(String);

impl SecretText {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub index: u32,
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<SecretText>,
    pub name: String,
}

impl Address {
    pub fn public(index: u32, public_key: String, name: String) -> Self {
        Self {
            index,
            public_key,
            private_key: None,
            name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoredWallet {
    Mnemonic {
        id: WalletId,
        name: String,
        mnemonic: SecretText,
        #[serde(default)]
        scheme: DerivationScheme,
        created_at: u64,
        active_address_index: u32,
        addresses: Vec<Address>,
    },
    PrivateKey {
        id: WalletId,
        name: String,
        public_key: String,
        /// base58 of the 64-byte `secret ‖ public` keypair
        private_key: SecretText,
        created_at: u64,
        addresses: Vec<Address>,
    },
    Hardware {
        id: WalletId,
        name: String,
        public_key: String,
        path: String,
        device_id: String,
        created_at: u64,
        addresses: Vec<Address>,
    },
    WatchOnly {
        id: WalletId,
        name: String,
        public_key: String,
        created_at: u64,
        addresses: Vec<Address>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletKind {
    Mnemonic,
    PrivateKey,
    Hardware,
    WatchOnly,
}

impl std::fmt::Display for WalletKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            WalletKind::Mnemonic => "mnemonic",
            WalletKind::PrivateKey => "private-key",
            WalletKind::Hardware => "hardware",
            WalletKind::WatchOnly => "watch-only",
        };
        f.write_str(s)
    }
}

impl StoredWallet {
    pub fn id(&self) -> &WalletId {
        match self {
            StoredWallet::Mnemonic { id, .. }
            | StoredWallet::PrivateKey { id, .. }
            | StoredWallet::Hardware { id, .. }
            | StoredWallet::WatchOnly { id, .. } => id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            StoredWallet::Mnemonic { name, .. }
            | StoredWallet::PrivateKey { name, .. }
            | StoredWallet::Hardware { name, .. }
            | StoredWallet::WatchOnly { name, .. } => name,
        }
    }

    pub fn set_name(&mut self, new_name: String) {
        match self {
            StoredWallet::Mnemonic { name, .. }
            | StoredWallet::PrivateKey { name, .. }
            | StoredWallet::Hardware { name, .. }
            | StoredWallet::WatchOnly { name, .. } => *name = new_name,
        }
    }

    pub fn created_at(&self) -> u64 {
        match self {
            StoredWallet::Mnemonic { created_at, .. }
            | StoredWallet::PrivateKey { created_at, .. }
            | StoredWallet::Hardware { created_at, .. }
            | StoredWallet::WatchOnly { created_at, .. } => *created_at,
        }
    }

    pub fn addresses(&self) -> &[Address] {
        match self {
            StoredWallet::Mnemonic { addresses, .. }
            | StoredWallet::PrivateKey { addresses, .. }
            | StoredWallet::Hardware { addresses, .. }
            | StoredWallet::WatchOnly { addresses, .. } => addresses,
        }
    }

    pub fn addresses_mut(&mut self) -> &mut Vec<Address> {
        match self {
            StoredWallet::Mnemonic { addresses, .. }
            | StoredWallet::PrivateKey { addresses, .. }
            | StoredWallet::Hardware { addresses, .. }
            | StoredWallet::WatchOnly { addresses, .. } => addresses,
        }
    }

    pub fn kind(&self) -> WalletKind {
        match self {
            StoredWallet::Mnemonic { .. } => WalletKind::Mnemonic,
            StoredWallet::PrivateKey { .. } => WalletKind::PrivateKey,
            StoredWallet::Hardware { .. } => WalletKind::Hardware,
            StoredWallet::WatchOnly { .. } => WalletKind::WatchOnly,
        }
    }

    /// True for variants that carry secret material.
    pub fn has_secret(&self) -> bool {
        matches!(
            self,
            StoredWallet::Mnemonic { .. } | StoredWallet::PrivateKey { .. }
        )
    }

    /// Public key of the active address.
    pub fn active_public_key(&self) -> Option<&str> {
        match self {
            StoredWallet::Mnemonic {
                active_address_index,
                addresses,
                ..
            } => addresses
                .iter()
                .find(|a| a.index == *active_address_index)
                .or_else(|| addresses.first())
                .map(|a| a.public_key.as_str()),
            StoredWallet::PrivateKey { public_key, .. }
            | StoredWallet::Hardware { public_key, .. }
            | StoredWallet::WatchOnly { public_key, .. } => Some(public_key),
        }
    }

    /// Every public key this wallet answers for.
    pub fn public_keys(&self) -> impl Iterator<Item = &str> {
        let own = match self {
            StoredWallet::Mnemonic { .. } => None,
            StoredWallet::PrivateKey { public_key, .. }
            | StoredWallet::Hardware { public_key, .. }
            | StoredWallet::WatchOnly { public_key, .. } => Some(public_key.as_str()),
        };
        own.into_iter()
            .chain(self.addresses().iter().map(|a| a.public_key.as_str()))
    }

    pub fn summary(&self, active: bool) -> WalletSummary {
        WalletSummary {
            id: self.id().clone(),
            name: self.name().to_string(),
            kind: self.kind(),
            public_key: self.active_public_key().unwrap_or_default().to_string(),
            address_count: self.addresses().len(),
            created_at: self.created_at(),
            active,
        }
    }
}

/// What `list_wallets` hands out: no secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletSummary {
    pub id: WalletId,
    pub name: String,
    pub kind: WalletKind,
    pub public_key: String,
    pub address_count: usize,
    pub created_at: u64,
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletCollection {
    pub wallets: Vec<StoredWallet>,
    #[serde(default)]
    pub active_wallet_id: Option<WalletId>,
}

/// Earlier versions persisted a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredCollection {
    Current(WalletCollection),
    Legacy(Vec<StoredWallet>),
}

impl WalletCollection {
    /// Parse the plaintext JSON form, current or legacy.
    pub fn from_json(bytes: &[u8]) -> Option<Self> {
        match serde_json::from_slice::<StoredCollection>(bytes).ok()? {
            StoredCollection::Current(c) => Some(c),
            StoredCollection::Legacy(wallets) => {
                let active_wallet_id = wallets.first().map(|w| w.id().clone());
                Some(Self {
                    wallets,
                    active_wallet_id,
                })
            }
        }
    }

    pub fn to_json(&self) -> VaultResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| anyhow::anyhow!("serializing wallets: {e}").into())
    }

    pub fn has_secrets(&self) -> bool {
        self.wallets.iter().any(StoredWallet::has_secret)
    }

    pub fn get(&self, id: &WalletId) -> VaultResult<&StoredWallet> {
        self.wallets
            .iter()
            .find(|w| w.id() == id)
            .ok_or_else(|| VaultError::WalletNotFound(id.to_string()))
    }

    pub fn get_mut(&mut self, id: &WalletId) -> VaultResult<&mut StoredWallet> {
        self.wallets
            .iter_mut()
            .find(|w| w.id() == id)
            .ok_or_else(|| VaultError::WalletNotFound(id.to_string()))
    }

    pub fn active(&self) -> Option<&StoredWallet> {
        let id = self.active_wallet_id.as_ref()?;
        self.wallets.iter().find(|w| w.id() == id)
    }

    /// Name of the wallet already holding `public_key`, if any.
    pub fn owner_of(&self, public_key: &str) -> Option<&str> {
        self.wallets
            .iter()
            .find(|w| w.public_keys().any(|pk| pk == public_key))
            .map(StoredWallet::name)
    }

    pub fn ensure_unique(&self, public_key: &str) -> VaultResult<()> {
        match self.owner_of(public_key) {
            Some(existing) => Err(VaultError::DuplicateWallet(existing.to_string())),
            None => Ok(()),
        }
    }

    /// Append; the first wallet added becomes active.
    pub fn push(&mut self, wallet: StoredWallet) {
        if self.active_wallet_id.is_none() {
            self.active_wallet_id = Some(wallet.id().clone());
        }
        self.wallets.push(wallet);
    }

    /// Remove by id. If it was active, the first remaining wallet takes over.
    pub fn remove(&mut self, id: &WalletId) -> VaultResult<StoredWallet> {
        let pos = self
            .wallets
            .iter()
            .position(|w| w.id() == id)
            .ok_or_else(|| VaultError::WalletNotFound(id.to_string()))?;
        let removed = self.wallets.remove(pos);
        if self.active_wallet_id.as_ref() == Some(id) {
            self.active_wallet_id = self.wallets.first().map(|w| w.id().clone());
        }
        Ok(removed)
    }

    pub fn summaries(&self) -> Vec<WalletSummary> {
        self.wallets
            .iter()
            .map(|w| w.summary(self.active_wallet_id.as_ref() == Some(w.id())))
            .collect()
    }

    /// Names for `count` accounts imported under `base`.
    ///
    /// A trailing number on `base` is dropped, then the lowest positive
    /// numbers not already used as `<base> N` are assigned in order.
    pub fn numbered_names(&self, base: &str, count: usize) -> Vec<String> {
        let stem = strip_number(base);
        let used: Vec<u32> = self
            .wallets
            .iter()
            .filter_map(|w| numbered_suffix(w.name(), stem))
            .collect();

        (1u32..)
            .filter(|n| !used.contains(n))
            .take(count)
            .map(|n| format!("{stem} {n}"))
            .collect()
    }
}

fn strip_number(name: &str) -> &str {
    let trimmed = name.trim_end();
    let without_digits = trimmed.trim_end_matches(|c: char| c.is_ascii_digit());
    if without_digits.len() == trimmed.len() {
        return trimmed;
    }
    let stem = without_digits.trim_end();
    // only strip a separated suffix ("Main 2"), not "Account2x" style names
    if stem.is_empty() || stem.len() == without_digits.len() {
        trimmed
    } else {
        stem
    }
}

/// `Some(n)` iff `name` is `<stem>` + whitespace + digits.
fn numbered_suffix(name: &str, stem: &str) -> Option<u32> {
    let rest = name.strip_prefix(stem)?;
    let digits = rest.trim_start();
    if digits.len() == rest.len() || digits.is_empty() {
        return None;
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
