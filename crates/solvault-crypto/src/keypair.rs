//! Ed25519 keypair with Solana's 64-byte `secret ‖ public` storage form

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use zeroize::Zeroizing;

use solvault_core::{VaultError, VaultResult};

pub const PUBLIC_KEY_SIZE: usize = 32;
pub const SECRET_KEY_SIZE: usize = 32;
pub const KEYPAIR_SIZE: usize = 64;
pub const SIGNATURE_SIZE: usize = 64;

/// `SigningKey` zeroizes itself on drop (dalek `zeroize` feature).
#[derive(Clone)]
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    pub fn from_secret(secret: &[u8; SECRET_KEY_SIZE]) -> Self {
        Self {
            signing: SigningKey::from_bytes(secret),
        }
    }

    /// Parse `secret ‖ public`, checking that the public half matches.
    pub fn from_keypair_bytes(bytes: &[u8]) -> VaultResult<Self> {
        let arr: &[u8; KEYPAIR_SIZE] = bytes.try_into().map_err(|_| {
            VaultError::InvalidKey(format!("expected {KEYPAIR_SIZE} bytes, got {}", bytes.len()))
        })?;
        let signing = SigningKey::from_keypair_bytes(arr)
            .map_err(|_| VaultError::InvalidKey("public key does not match secret".into()))?;
        Ok(Self { signing })
    }

    /// Base58 text of either a 64-byte keypair or a bare 32-byte secret.
    pub fn from_base58(s: &str) -> VaultResult<Self> {
        let raw = Zeroizing::new(
            bs58::decode(s.trim())
                .into_vec()
                .map_err(|e| VaultError::InvalidKey(format!("base58: {e}")))?,
        );
        match raw.len() {
            KEYPAIR_SIZE => Self::from_keypair_bytes(&raw),
            SECRET_KEY_SIZE => {
                let mut secret = Zeroizing::new([0u8; SECRET_KEY_SIZE]);
                secret.copy_from_slice(&raw);
                Ok(Self::from_secret(&secret))
            }
            n => Err(VaultError::InvalidKey(format!(
                "decoded key is {n} bytes, expected 32 or 64"
            ))),
        }
    }

    /// The `[u8; 64]` JSON array written by `solana-keygen`.
    pub fn from_json_bytes(json: &[u8]) -> VaultResult<Self> {
        let raw: Zeroizing<Vec<u8>> = Zeroizing::new(
            serde_json::from_slice(json)
                .map_err(|e| VaultError::InvalidKey(format!("keypair JSON: {e}")))?,
        );
        Self::from_keypair_bytes(&raw)
    }

    pub fn public_key(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.signing.verifying_key().to_bytes()
    }

    pub fn public_key_base58(&self) -> String {
        bs58::encode(self.public_key()).into_string()
    }

    pub fn secret_bytes(&self) -> Zeroizing<[u8; SECRET_KEY_SIZE]> {
        Zeroizing::new(self.signing.to_bytes())
    }

    pub fn to_keypair_bytes(&self) -> Zeroizing<[u8; KEYPAIR_SIZE]> {
        Zeroizing::new(self.signing.to_keypair_bytes())
    }

    pub fn to_base58(&self) -> Zeroizing<String> {
        Zeroizing::new(bs58::encode(self.to_keypair_bytes().as_slice()).into_string())
    }

    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_SIZE] {
        self.signing.sign(message).to_bytes()
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public", &self.public_key_base58())
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Decode a base58 public key, rejecting anything that is not 32 bytes.
pub fn decode_public_key(s: &str) -> VaultResult<[u8; PUBLIC_KEY_SIZE]> {
    let raw = bs58::decode(s.trim())
        .into_vec()
        .map_err(|e| VaultError::InvalidKey(format!("base58: {e}")))?;
    raw.as_slice()
        .try_into()
        .map_err(|_| VaultError::InvalidKey(format!("public key is {} bytes, expected 32", raw.len())))
}

pub fn encode_public_key(pk: &[u8; PUBLIC_KEY_SIZE]) -> String {
    bs58::encode(pk).into_string()
}

/// Check an Ed25519 signature against a raw public key.
pub fn verify_signature(public_key: &[u8; PUBLIC_KEY_SIZE], message: &[u8], signature: &[u8]) -> bool {
    let Ok(sig) = <&[u8; SIGNATURE_SIZE]>::try_from(signature) else {
        return false;
    };
    let Ok(vk) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    vk.verify(message, &Signature::from_bytes(sig)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Keypair {
        Keypair::from_secret(&[9u8; 32])
    }

    #[test]
    fn test_keypair_bytes_layout() {
        let kp = sample();
        let bytes = kp.to_keypair_bytes();
        assert_eq!(&bytes[..32], &[9u8; 32]);
        assert_eq!(&bytes[32..], &kp.public_key());
    }

    #[test]
    fn test_from_base58_accepts_both_lengths() {
        let kp = sample();
        let full = Keypair::from_base58(&kp.to_base58()).unwrap();
        let short = Keypair::from_base58(&bs58::encode([9u8; 32]).into_string()).unwrap();

        assert_eq!(full.public_key(), kp.public_key());
        assert_eq!(short.public_key(), kp.public_key());
        assert!(Keypair::from_base58("abc").is_err());
    }

    #[test]
    fn test_mismatched_public_half_rejected() {
        let mut bytes = *sample().to_keypair_bytes();
        bytes[40] ^= 0xff;
        assert!(Keypair::from_keypair_bytes(&bytes).is_err());
    }

    #[test]
    fn test_from_json_bytes() {
        let kp = sample();
        let json = serde_json::to_vec(&kp.to_keypair_bytes().to_vec()).unwrap();
        assert_eq!(Keypair::from_json_bytes(&json).unwrap().public_key(), kp.public_key());
    }

    #[test]
    fn test_sign_verify() {
        let kp = sample();
        let sig = kp.sign(b"hello");
        assert!(verify_signature(&kp.public_key(), b"hello", &sig));
        assert!(!verify_signature(&kp.public_key(), b"hellp", &sig));
        assert!(!verify_signature(&kp.public_key(), b"hello", &sig[..10]));
    }

    #[test]
    fn test_public_key_codec() {
        let kp = sample();
        let text = kp.public_key_base58();
        assert_eq!(decode_public_key(&text).unwrap(), kp.public_key());
        assert_eq!(encode_public_key(&kp.public_key()), text);
        assert!(decode_public_key("11111").is_err());
    }

    #[test]
    fn test_debug_hides_secret() {
        let dbg = format!("{:?}", sample());
        assert!(dbg.contains("REDACTED"));
    }
}
