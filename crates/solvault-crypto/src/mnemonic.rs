//! BIP-39 mnemonic handling
//!
//! Only 12- and 24-word English phrases are accepted. The BIP-39 passphrase
//! is always empty.

use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

use solvault_core::{MnemonicError, VaultError, VaultResult};

/// A validated phrase. The normalized text is wiped on drop.
#[derive(Clone)]
pub struct Mnemonic {
    phrase: Zeroizing<String>,
}

impl Mnemonic {
    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    pub fn word_count(&self) -> usize {
        self.phrase.split(' ').count()
    }

    /// 64-byte BIP-39 seed: PBKDF2-HMAC-SHA512(phrase, "mnemonic", 2048).
    pub fn to_seed(&self) -> VaultResult<Zeroizing<[u8; 64]>> {
        let parsed = bip39::Mnemonic::parse_in_normalized(bip39::Language::English, &self.phrase)
            .map_err(map_bip39_error)?;
        Ok(Zeroizing::new(parsed.to_seed_normalized("")))
    }
}

impl std::fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mnemonic")
            .field("words", &self.word_count())
            .field("phrase", &"[REDACTED]")
            .finish()
    }
}

/// Validate wordlist membership and checksum.
///
/// Whitespace runs collapse to single spaces and letters are lowercased
/// before validation.
pub fn parse_mnemonic(input: &str) -> VaultResult<Mnemonic> {
    let mut normalized = input
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ");

    let count = normalized.split(' ').filter(|w| !w.is_empty()).count();
    if count != 12 && count != 24 {
        normalized.zeroize();
        return Err(VaultError::InvalidMnemonic(MnemonicError::BadLength));
    }

    if let Err(e) = bip39::Mnemonic::parse_in_normalized(bip39::Language::English, &normalized) {
        normalized.zeroize();
        return Err(map_bip39_error(e));
    }

    Ok(Mnemonic {
        phrase: Zeroizing::new(normalized),
    })
}

/// Generate a new phrase from OS randomness (12 words = 128 bits, 24 = 256).
pub fn generate_mnemonic(words: usize) -> VaultResult<Mnemonic> {
    let entropy_len = match words {
        12 => 16,
        24 => 32,
        _ => return Err(VaultError::InvalidMnemonic(MnemonicError::BadLength)),
    };
    let mut entropy = Zeroizing::new([0u8; 32]);
    rand::thread_rng().fill_bytes(&mut entropy[..entropy_len]);

    let mnemonic = bip39::Mnemonic::from_entropy(&entropy[..entropy_len])
        .map_err(|e| anyhow::anyhow!("BIP-39 mnemonic generation failed: {e}"))?;

    Ok(Mnemonic {
        phrase: Zeroizing::new(mnemonic.to_string()),
    })
}

fn map_bip39_error(e: bip39::Error) -> VaultError {
    let reason = match e {
        bip39::Error::UnknownWord(_) => MnemonicError::BadWord,
        bip39::Error::InvalidChecksum => MnemonicError::BadChecksum,
        _ => MnemonicError::BadLength,
    };
    VaultError::InvalidMnemonic(reason)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon \
                           abandon abandon abandon abandon abandon about";

    #[test]
    fn test_known_seed() {
        let m = parse_mnemonic(ABANDON).unwrap();
        let seed = m.to_seed().unwrap();
        assert_eq!(
            hex::encode(seed.as_slice()),
            "5eb00bbddcf069084889a8ab9155568165f5c453ccb85e70811aaed6f6da5fc1\
             9a5ac40b389cd370d086206dec8aa6c43daea6690f20ad3d8d48b2d2ce9e38e4"
        );
    }

    #[test]
    fn test_normalizes_whitespace_and_case() {
        let messy = format!("  {}\n", ABANDON.to_uppercase().replace(' ', "   "));
        let m = parse_mnemonic(&messy).unwrap();
        assert_eq!(m.phrase(), parse_mnemonic(ABANDON).unwrap().phrase());
    }

    #[test]
    fn test_bad_word() {
        let phrase = ABANDON.replace("about", "abcxyz");
        let err = parse_mnemonic(&phrase).unwrap_err();
        assert!(matches!(err, VaultError::InvalidMnemonic(MnemonicError::BadWord)));
    }

    #[test]
    fn test_bad_checksum() {
        let phrase = ABANDON.replace("about", "abandon");
        let err = parse_mnemonic(&phrase).unwrap_err();
        assert!(matches!(err, VaultError::InvalidMnemonic(MnemonicError::BadChecksum)));
    }

    #[test]
    fn test_bad_length() {
        let err = parse_mnemonic("abandon abandon abandon").unwrap_err();
        assert!(matches!(err, VaultError::InvalidMnemonic(MnemonicError::BadLength)));

        // 15 words is valid BIP-39 but not accepted here
        let fifteen = "abandon ".repeat(14) + "address";
        let err = parse_mnemonic(&fifteen).unwrap_err();
        assert!(matches!(err, VaultError::InvalidMnemonic(MnemonicError::BadLength)));
    }

    #[test]
    fn test_generate() {
        let twelve = generate_mnemonic(12).unwrap();
        let twenty_four = generate_mnemonic(24).unwrap();

        assert_eq!(twelve.word_count(), 12);
        assert_eq!(twenty_four.word_count(), 24);
        assert!(parse_mnemonic(twelve.phrase()).is_ok());
        assert!(generate_mnemonic(18).is_err());
    }

    #[test]
    fn test_debug_redacts() {
        let m = parse_mnemonic(ABANDON).unwrap();
        assert!(!format!("{m:?}").contains("abandon"));
    }
}
