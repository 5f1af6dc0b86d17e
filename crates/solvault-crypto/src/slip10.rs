//! SLIP-0010 Ed25519 derivation (hardened children only)

use hmac::{Hmac, Mac};
use sha2::Sha512;
use zeroize::Zeroize;

use solvault_core::VaultResult;

use crate::path::HARDENED;

type HmacSha512 = Hmac<Sha512>;

const ED25519_SEED_KEY: &[u8] = b"ed25519 seed";

/// Private key plus chain code at one node of the tree.
#[derive(Clone)]
pub struct ExtendedKey {
    key: [u8; 32],
    chain_code: [u8; 32],
}

impl ExtendedKey {
    /// Master node: `HMAC-SHA512("ed25519 seed", seed)`.
    pub fn master(seed: &[u8]) -> VaultResult<Self> {
        hmac_split(ED25519_SEED_KEY, &[seed])
    }

    /// Child at `index`. Ed25519 has no public derivation, so bit 31 is always set.
    pub fn child(&self, index: u32) -> VaultResult<Self> {
        let hardened = (index | HARDENED).to_be_bytes();
        hmac_split(&self.chain_code, &[&[0u8], &self.key, &hardened])
    }

    pub fn derive(seed: &[u8], indices: &[u32]) -> VaultResult<Self> {
        let mut node = Self::master(seed)?;
        for &index in indices {
            node = node.child(index)?;
        }
        Ok(node)
    }

    pub fn secret(&self) -> &[u8; 32] {
        &self.key
    }

    pub fn chain_code(&self) -> &[u8; 32] {
        &self.chain_code
    }
}

impl Drop for ExtendedKey {
    fn drop(&mut self) {
        self.key.zeroize();
        self.chain_code.zeroize();
    }
}

impl std::fmt::Debug for ExtendedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtendedKey")
            .field("key", &"[REDACTED]")
            .field("chain_code", &"[REDACTED]")
            .finish()
    }
}

fn hmac_split(key: &[u8], parts: &[&[u8]]) -> VaultResult<ExtendedKey> {
    let mut mac = HmacSha512::new_from_slice(key)
        .map_err(|e| anyhow::anyhow!("HMAC-SHA512 key rejected: {e}"))?;
    for part in parts {
        mac.update(part);
    }
    let mut out = mac.finalize().into_bytes();

    let mut node = ExtendedKey {
        key: [0u8; 32],
        chain_code: [0u8; 32],
    };
    node.key.copy_from_slice(&out[..32]);
    node.chain_code.copy_from_slice(&out[32..]);
    out.as_mut_slice().zeroize();
    Ok(node)
}
