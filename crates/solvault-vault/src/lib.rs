//! solvault-vault: password authentication and the encrypted wallet vault
//!
//! ```text
//! password ──► Authenticator ──► RateLimiter (HMAC-checked record)
//!                   │
//!                   ▼
//!   PBKDF2 ──► VaultKey ──► AES-256-GCM ──► "wallets" blob in the Store
//!                   │
//!                   ▼
//!               Session { WalletCollection, VaultKey }  (memory only)
//! ```

pub mod auth;
pub mod device;
pub mod policy;
pub mod rate_limit;
pub mod session;
pub mod vault;
pub mod wallet;

pub use auth::{AuthRecord, Authenticator, Verification};
pub use policy::check_password;
pub use rate_limit::{RateLimitState, RateLimiter};
pub use session::{KeyMaterial, Session, SessionInfo};
pub use vault::{ImportReport, Signature, SkippedAccount, Vault, VaultOptions};
pub use wallet::{
    Address, SecretText, StoredWallet, WalletCollection, WalletKind, WalletSummary,
};
