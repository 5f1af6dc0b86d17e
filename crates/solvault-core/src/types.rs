use serde::{Deserialize, Serialize};

/// Stable identifier of a stored wallet (UUID v4 text).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletId(String);

impl WalletId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for WalletId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for WalletId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for WalletId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// BIP44 path convention used to derive Solana accounts from a seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DerivationScheme {
    /// `m/44'/501'/{account}'/0'`
    #[default]
    Standard,
    /// `m/44'/501'/{account}'`
    Legacy,
}

impl DerivationScheme {
    pub const PURPOSE: u32 = 44;
    pub const SOLANA_COIN: u32 = 501;

    /// Unhardened indices for `account`; derivation hardens every level.
    pub fn indices(self, account: u32) -> Vec<u32> {
        match self {
            DerivationScheme::Standard => vec![Self::PURPOSE, Self::SOLANA_COIN, account, 0],
            DerivationScheme::Legacy => vec![Self::PURPOSE, Self::SOLANA_COIN, account],
        }
    }

    pub fn path(self, account: u32) -> String {
        match self {
            DerivationScheme::Standard => format!("m/44'/501'/{account}'/0'"),
            DerivationScheme::Legacy => format!("m/44'/501'/{account}'"),
        }
    }
}

impl std::fmt::Display for DerivationScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DerivationScheme::Standard => f.write_str("standard"),
            DerivationScheme::Legacy => f.write_str("legacy"),
        }
    }
}

/// What the vault stores for a hardware account: no secret, only where to find it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareDescriptor {
    pub name: String,
    /// Base58 public key reported by the device
    pub public_key: String,
    /// Textual derivation path, e.g. `m/44'/501'/0'/0'`
    pub path: String,
    pub device_id: String,
}
