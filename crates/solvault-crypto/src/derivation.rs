//! Mnemonic → Solana account keypair

use solvault_core::{DerivationScheme, VaultResult};

use crate::keypair::Keypair;
use crate::mnemonic::Mnemonic;
use crate::path::DerivationPath;
use crate::slip10::ExtendedKey;

/// Standard-scheme keypair for `account`: `m/44'/501'/{account}'/0'`.
pub fn mnemonic_to_keypair(mnemonic: &Mnemonic, account: u32) -> VaultResult<Keypair> {
    mnemonic_to_keypair_with_path(
        mnemonic,
        &DerivationPath::for_scheme(DerivationScheme::Standard, account),
    )
}

/// Keypair at an arbitrary path. Every level is derived hardened.
pub fn mnemonic_to_keypair_with_path(
    mnemonic: &Mnemonic,
    path: &DerivationPath,
) -> VaultResult<Keypair> {
    let seed = mnemonic.to_seed()?;
    seed_to_keypair(seed.as_slice(), path)
}

pub fn seed_to_keypair(seed: &[u8], path: &DerivationPath) -> VaultResult<Keypair> {
    let node = ExtendedKey::derive(seed, path.indices())?;
    Ok(Keypair::from_secret(node.secret()))
}

/// Keypair for `account` under either scheme.
pub fn derive_account(
    mnemonic: &Mnemonic,
    scheme: DerivationScheme,
    account: u32,
) -> VaultResult<Keypair> {
    mnemonic_to_keypair_with_path(mnemonic, &DerivationPath::for_scheme(scheme, account))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mnemonic::parse_mnemonic;
    use crate::path::HARDENED;
    use proptest::prelude::*;

    const ABANDON: &str = "abandon abandon abandon abandon abandon abandon \
                           abandon abandon abandon abandon abandon about";

    #[test]
    fn test_slip10_vector_public_key() {
        let seed = hex::decode("000102030405060708090a0b0c0d0e0f").unwrap();
        let root = seed_to_keypair(&seed, &DerivationPath::parse("m", true).unwrap()).unwrap();
        assert_eq!(
            hex::encode(root.public_key()),
            "a4b2856bfec510abab89753fac1ac0e1112364e7d250545963f135f2a33188ed"
        );

        let child = seed_to_keypair(&seed, &DerivationPath::hardened(&[0])).unwrap();
        assert_eq!(
            hex::encode(child.public_key()),
            "8c8a13df77a28f3445213a0f432fde644acaa215fc72dcdf300d5efaa85d350c"
        );
    }

    #[test]
    fn test_abandon_account_zero_known_address() {
        let m = parse_mnemonic(ABANDON).unwrap();
        let a = mnemonic_to_keypair(&m, 0).unwrap();
        let b = mnemonic_to_keypair_with_path(
            &m,
            &DerivationPath::parse("m/44'/501'/0'/0'", true).unwrap(),
        )
        .unwrap();

        assert_eq!(a.public_key(), b.public_key());
        assert_eq!(
            a.public_key_base58(),
            "HAgk14JpMQLgt6rVgv7cBQFJWFto5Dqxi472uT3DKpqk"
        );
    }

    #[test]
    fn test_schemes_differ() {
        let m = parse_mnemonic(ABANDON).unwrap();
        let standard = derive_account(&m, DerivationScheme::Standard, 0).unwrap();
        let legacy = derive_account(&m, DerivationScheme::Legacy, 0).unwrap();
        assert_ne!(standard.public_key(), legacy.public_key());
    }

    #[test]
    fn test_unhardened_path_is_forced() {
        let m = parse_mnemonic(ABANDON).unwrap();
        let soft = DerivationPath::parse("m/44/501/0/0", true).unwrap();
        let a = mnemonic_to_keypair_with_path(&m, &soft).unwrap();
        let b = mnemonic_to_keypair(&m, 0).unwrap();
        assert_eq!(a.public_key(), b.public_key());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn distinct_accounts_distinct_keys(a in 0u32..HARDENED, b in 0u32..HARDENED) {
            prop_assume!(a != b);
            let seed = [7u8; 64];
            let ka = seed_to_keypair(&seed, &DerivationPath::for_scheme(DerivationScheme::Standard, a)).unwrap();
            let kb = seed_to_keypair(&seed, &DerivationPath::for_scheme(DerivationScheme::Standard, b)).unwrap();
            prop_assert_ne!(ka.public_key(), kb.public_key());
        }
    }
}
