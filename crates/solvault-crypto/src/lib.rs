//! solvault-crypto: key material for the solvault key vault
//!
//! Two independent pipelines live here:
//!
//! ```text
//! Vault at rest
//!   password ──PBKDF2-HMAC-SHA256(salt, iter)──▶ VaultKey (256-bit)
//!   WalletCollection JSON ──AES-256-GCM(VaultKey, iv)──▶ EncryptedBlob {salt, iv, ct, tag, iter}
//!
//! Account keys
//!   mnemonic ──BIP39 PBKDF2-HMAC-SHA512──▶ seed (64 B)
//!   seed ──SLIP-0010 ed25519, hardened only──▶ m/44'/501'/a'/0' ──▶ Keypair
//! ```

pub mod blob;
pub mod derivation;
pub mod kdf;
pub mod keypair;
pub mod mnemonic;
pub mod path;
pub mod slip10;

pub use blob::EncryptedBlob;
pub use derivation::{
    derive_account, mnemonic_to_keypair, mnemonic_to_keypair_with_path, seed_to_keypair,
};
pub use kdf::{derive_vault_key, pbkdf2_sha256, random_salt, VaultKey};
pub use keypair::{decode_public_key, encode_public_key, verify_signature, Keypair};
pub use mnemonic::{generate_mnemonic, parse_mnemonic, Mnemonic};
pub use path::DerivationPath;

/// Size of a vault key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of a PBKDF2 salt
pub const SALT_SIZE: usize = 16;

/// Size of an AES-GCM nonce (96-bit)
pub const IV_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;
