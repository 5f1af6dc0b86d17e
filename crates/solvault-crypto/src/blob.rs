//! AES-256-GCM envelope for the wallet collection
//!
//! JSON form (what the store persists):
//! ```text
//! {"v":1, "salt":b64(16), "iv":b64(12), "ct":b64(N), "tag":b64(16), "iter":u32}
//! ```
//!
//! Compact binary form, accepted when the stored value is not JSON:
//! ```text
//! [4 bytes: iter BE][16 bytes: salt][12 bytes: iv][N bytes: ciphertext][16 bytes: tag]
//! ```

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use anyhow::Context;
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use rand::RngCore;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use solvault_core::{VaultError, VaultResult};

use crate::kdf::{derive_vault_key, random_salt, VaultKey};
use crate::{IV_SIZE, SALT_SIZE, TAG_SIZE};

pub const BLOB_VERSION: u8 = 1;

#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedBlob {
    pub salt: [u8; SALT_SIZE],
    pub iv: [u8; IV_SIZE],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_SIZE],
    pub iterations: u32,
}

impl std::fmt::Debug for EncryptedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedBlob")
            .field("ciphertext_len", &self.ciphertext.len())
            .field("iterations", &self.iterations)
            .finish()
    }
}

#[derive(Serialize, Deserialize)]
struct BlobJson {
    v: u8,
    salt: String,
    iv: String,
    ct: String,
    tag: String,
    iter: u32,
}

impl EncryptedBlob {
    /// Encrypt under a fresh salt; returns the blob and the derived key so the
    /// caller can keep it in a session.
    pub fn encrypt(
        password: &SecretString,
        iterations: u32,
        plaintext: &[u8],
    ) -> VaultResult<(Self, VaultKey)> {
        let salt = random_salt();
        let key = derive_vault_key(password, &salt, iterations);
        let blob = Self::seal(&key, salt, iterations, plaintext)?;
        Ok((blob, key))
    }

    /// Encrypt with an already-derived key. A new IV is drawn on every call.
    pub fn seal(
        key: &VaultKey,
        salt: [u8; SALT_SIZE],
        iterations: u32,
        plaintext: &[u8],
    ) -> VaultResult<Self> {
        let cipher = Aes256Gcm::new(key.as_bytes().into());

        let mut iv = [0u8; IV_SIZE];
        rand::thread_rng().fill_bytes(&mut iv);

        let mut sealed = cipher
            .encrypt(Nonce::from_slice(&iv), plaintext)
            .map_err(|e| anyhow::anyhow!("vault encryption failed: {e}"))?;

        let split = sealed.len() - TAG_SIZE;
        let mut tag = [0u8; TAG_SIZE];
        tag.copy_from_slice(&sealed[split..]);
        sealed.truncate(split);

        Ok(Self {
            salt,
            iv,
            ciphertext: sealed,
            tag,
            iterations,
        })
    }

    /// Derive the key from `password` and decrypt.
    pub fn decrypt(&self, password: &SecretString) -> VaultResult<(Zeroizing<Vec<u8>>, VaultKey)> {
        let key = derive_vault_key(password, &self.salt, self.iterations);
        let plaintext = self.open(&key)?;
        Ok((plaintext, key))
    }

    /// Decrypt with a known key. A failed tag check reads as a wrong password.
    pub fn open(&self, key: &VaultKey) -> VaultResult<Zeroizing<Vec<u8>>> {
        let cipher = Aes256Gcm::new(key.as_bytes().into());

        let mut sealed = Vec::with_capacity(self.ciphertext.len() + TAG_SIZE);
        sealed.extend_from_slice(&self.ciphertext);
        sealed.extend_from_slice(&self.tag);

        cipher
            .decrypt(Nonce::from_slice(&self.iv), sealed.as_slice())
            .map(Zeroizing::new)
            .map_err(|_| VaultError::InvalidPassword)
    }

    pub fn to_json(&self) -> VaultResult<Vec<u8>> {
        let json = BlobJson {
            v: BLOB_VERSION,
            salt: B64.encode(self.salt),
            iv: B64.encode(self.iv),
            ct: B64.encode(&self.ciphertext),
            tag: B64.encode(self.tag),
            iter: self.iterations,
        };
        Ok(serde_json::to_vec(&json).context("serializing encrypted blob")?)
    }

    pub fn from_json(bytes: &[u8]) -> VaultResult<Self> {
        let json: BlobJson = serde_json::from_slice(bytes).context("parsing encrypted blob")?;
        if json.v != BLOB_VERSION {
            return Err(anyhow::anyhow!("unsupported blob version {}", json.v).into());
        }
        Ok(Self {
            salt: decode_fixed(&json.salt, "salt")?,
            iv: decode_fixed(&json.iv, "iv")?,
            ciphertext: B64.decode(&json.ct).context("decoding ct")?,
            tag: decode_fixed(&json.tag, "tag")?,
            iterations: json.iter,
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + SALT_SIZE + IV_SIZE + self.ciphertext.len() + TAG_SIZE);
        out.extend_from_slice(&self.iterations.to_be_bytes());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> VaultResult<Self> {
        const HEADER: usize = 4 + SALT_SIZE + IV_SIZE;
        if bytes.len() < HEADER + TAG_SIZE {
            return Err(anyhow::anyhow!(
                "encrypted blob too short: {} bytes (minimum {})",
                bytes.len(),
                HEADER + TAG_SIZE
            )
            .into());
        }
        let (header, rest) = bytes.split_at(HEADER);
        let (ciphertext, tag) = rest.split_at(rest.len() - TAG_SIZE);

        let mut iter = [0u8; 4];
        iter.copy_from_slice(&header[..4]);
        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&header[4..4 + SALT_SIZE]);
        let mut iv = [0u8; IV_SIZE];
        iv.copy_from_slice(&header[4 + SALT_SIZE..]);
        let mut tag_arr = [0u8; TAG_SIZE];
        tag_arr.copy_from_slice(tag);

        Ok(Self {
            salt,
            iv,
            ciphertext: ciphertext.to_vec(),
            tag: tag_arr,
            iterations: u32::from_be_bytes(iter),
        })
    }

    /// Parse either stored form: JSON first, then the compact binary layout.
    pub fn parse(bytes: &[u8]) -> VaultResult<Self> {
        match Self::from_json(bytes) {
            Ok(blob) => Ok(blob),
            Err(_) => Self::from_bytes(bytes),
        }
    }
}

fn decode_fixed<const N: usize>(s: &str, field: &str) -> VaultResult<[u8; N]> {
    let raw = B64
        .decode(s)
        .with_context(|| format!("decoding {field}"))?;
    raw.as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("{field}: expected {N} bytes, got {}", raw.len()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITER: u32 = 1_000;

    fn pw(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let plaintext = br#"{"wallets":[],"active_wallet_id":null}"#;
        let (blob, _key) = EncryptedBlob::encrypt(&pw("Hunter22!"), ITER, plaintext).unwrap();

        let (decrypted, _key) = blob.decrypt(&pw("Hunter22!")).unwrap();
        assert_eq!(decrypted.as_slice(), plaintext);
    }

    #[test]
    fn test_wrong_password_is_invalid_password() {
        let (blob, _) = EncryptedBlob::encrypt(&pw("Hunter22!"), ITER, b"secret").unwrap();
        let err = blob.decrypt(&pw("Hunter23!")).unwrap_err();
        assert!(matches!(err, VaultError::InvalidPassword));
    }

    #[test]
    fn test_fresh_iv_per_seal() {
        let (first, key) = EncryptedBlob::encrypt(&pw("Hunter22!"), ITER, b"same").unwrap();
        let second = EncryptedBlob::seal(&key, first.salt, ITER, b"same").unwrap();

        assert_ne!(first.iv, second.iv);
        assert_ne!(first.ciphertext, second.ciphertext);
        assert_eq!(second.open(&key).unwrap().as_slice(), b"same");
    }

    #[test]
    fn test_tampered_tag_rejected() {
        let (mut blob, key) = EncryptedBlob::encrypt(&pw("Hunter22!"), ITER, b"data").unwrap();
        blob.tag[0] ^= 1;
        assert!(blob.open(&key).is_err());
    }

    #[test]
    fn test_json_shape() {
        let (blob, _) = EncryptedBlob::encrypt(&pw("Hunter22!"), ITER, b"data").unwrap();
        let json: serde_json::Value = serde_json::from_slice(&blob.to_json().unwrap()).unwrap();

        assert_eq!(json["v"], 1);
        assert_eq!(json["iter"], ITER);
        for field in ["salt", "iv", "ct", "tag"] {
            assert!(json[field].is_string(), "missing {field}");
        }
        assert_eq!(EncryptedBlob::from_json(&blob.to_json().unwrap()).unwrap(), blob);
    }

    #[test]
    fn test_parse_accepts_binary_form() {
        let (blob, key) = EncryptedBlob::encrypt(&pw("Hunter22!"), ITER, b"compact").unwrap();
        let parsed = EncryptedBlob::parse(&blob.to_bytes()).unwrap();
        assert_eq!(parsed, blob);
        assert_eq!(parsed.open(&key).unwrap().as_slice(), b"compact");
    }

    #[test]
    fn test_short_binary_rejected() {
        assert!(EncryptedBlob::from_bytes(&[0u8; 10]).is_err());
    }

    #[test]
    fn test_bad_field_length_rejected() {
        let json = r#"{"v":1,"salt":"AAAA","iv":"AAAAAAAAAAAAAAAA","ct":"","tag":"AAAAAAAAAAAAAAAAAAAAAA==","iter":1}"#;
        assert!(EncryptedBlob::from_json(json.as_bytes()).is_err());
    }
}
