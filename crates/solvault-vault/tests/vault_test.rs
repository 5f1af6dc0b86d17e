//! End-to-end vault flows over memory and filesystem stores.

use std::sync::Arc;

use secrecy::SecretString;
use tempfile::TempDir;

use solvault_core::config::LockoutPolicy;
use solvault_core::{Clock, DerivationScheme, HardwareDescriptor, ManualClock, VaultError};
use solvault_crypto::{decode_public_key, verify_signature, Keypair};
use solvault_store::{keys, Store};
use solvault_vault::{RateLimitState, Vault, VaultOptions, WalletCollection, WalletKind};

const ABANDON: &str = "abandon abandon abandon abandon abandon abandon \
                       abandon abandon abandon abandon abandon about";
const LEGAL: &str = "legal winner thank year wave sausage worth useful \
                     legal winner thank yellow";
const START: u64 = 1_700_000_000_000;

fn options() -> VaultOptions {
    VaultOptions {
        kdf_iterations: 1_000,
        lockout_policy: LockoutPolicy::Minimal,
    }
}

fn pw(s: &str) -> SecretString {
    SecretString::from(s.to_string())
}

async fn memory_vault() -> (Vault, Arc<Store>, Arc<ManualClock>) {
    let store = Arc::new(Store::memory().await.unwrap());
    let clock = Arc::new(ManualClock::new(START));
    let vault = Vault::open(store.clone(), clock.clone(), options())
        .await
        .unwrap();
    (vault, store, clock)
}

fn raw_private_key() -> String {
    Keypair::from_secret(&[7u8; 32]).to_base58().to_string()
}

#[tokio::test]
async fn lockout_after_ten_spaced_failures() {
    let (vault, _, clock) = memory_vault().await;
    vault
        .create_wallet(ABANDON, "Main", &pw("Hunter22!"))
        .await
        .unwrap();
    vault.lock().await;

    for _ in 0..10 {
        clock.advance_ms(31_000);
        let err = vault.unlock(&pw("Wrong123!")).await.unwrap_err();
        assert!(matches!(err, VaultError::InvalidPassword), "{err:?}");
    }

    let now = clock.now_ms();
    match vault.unlock(&pw("Wrong123!")).await {
        Err(VaultError::AccountLocked { until_ms, .. }) => {
            assert_eq!(until_ms - now, 3_600_000);
        }
        other => panic!("expected lockout, got {other:?}"),
    }

    // the right password does not bypass the lockout
    let err = vault.unlock(&pw("Hunter22!")).await.unwrap_err();
    assert!(err.is_rate_limited());
    assert!(!vault.is_unlocked().await);

    clock.advance_ms(3_600_000);
    vault.unlock(&pw("Hunter22!")).await.unwrap();
}

#[tokio::test]
async fn lockout_after_ten_back_to_back_failures() {
    let (vault, _, clock) = memory_vault().await;
    vault
        .create_wallet(ABANDON, "Main", &pw("Hunter22!"))
        .await
        .unwrap();
    vault.lock().await;

    for _ in 0..10 {
        let err = vault.unlock(&pw("Wrong123!")).await.unwrap_err();
        assert!(
            matches!(err, VaultError::InvalidPassword) || err.is_rate_limited(),
            "{err:?}"
        );
    }

    match vault.unlock(&pw("Wrong123!")).await {
        Err(VaultError::AccountLocked { until_ms, .. }) => {
            assert_eq!(until_ms - clock.now_ms(), 3_600_000);
        }
        other => panic!("expected lockout, got {other:?}"),
    }
    let err = vault.unlock(&pw("Hunter22!")).await.unwrap_err();
    assert!(matches!(err, VaultError::AccountLocked { .. }));
    assert!(!vault.is_unlocked().await);
}

#[tokio::test]
async fn unlock_reports_forged_attempt_counter() {
    let (vault, store, _) = memory_vault().await;
    vault
        .create_wallet(ABANDON, "Main", &pw("Hunter22!"))
        .await
        .unwrap();
    vault.lock().await;
    vault.unlock(&pw("Wrong123!")).await.unwrap_err();

    let mut record: RateLimitState = store.get_json(keys::RATE_LIMIT).await.unwrap().unwrap();
    record.attempts = 0;
    store.put_json(keys::RATE_LIMIT, &record).await.unwrap();

    let info = vault.unlock(&pw("Hunter22!")).await.unwrap();
    assert!(info.tamper_reset);
    assert!(vault.session_info().await.unwrap().tamper_reset);

    vault.lock().await;
    let info = vault.unlock(&pw("Hunter22!")).await.unwrap();
    assert!(!info.tamper_reset);
}

#[tokio::test]
async fn encrypted_vault_survives_reopen() {
    let tmp = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(START));

    let (mnemonic_id, key_id, before) = {
        let store = Arc::new(Store::open_fs(tmp.path()).await.unwrap());
        let vault = Vault::open(store, clock.clone(), options()).await.unwrap();
        let m = vault
            .create_wallet(ABANDON, "Main", &pw("Hunter22!"))
            .await
            .unwrap();
        let k = vault
            .import_private_key(None, &raw_private_key(), "Hot", &pw("Hunter22!"))
            .await
            .unwrap();
        let before = (
            vault.get_wallet_for_backup(&m).await.unwrap(),
            vault.get_wallet_for_backup(&k).await.unwrap(),
        );
        (m, k, before)
    };

    let store = Arc::new(Store::open_fs(tmp.path()).await.unwrap());
    let raw = store.get(keys::WALLETS).await.unwrap().unwrap();
    assert!(WalletCollection::from_json(&raw).is_none(), "blob must be sealed");
    assert_eq!(
        store.get(keys::ENCRYPTED).await.unwrap().as_deref(),
        Some(b"true".as_slice())
    );

    let vault = Vault::open(store, clock, options()).await.unwrap();
    assert!(!vault.is_unlocked().await);
    assert!(matches!(
        vault.list_wallets().await,
        Err(VaultError::NotUnlocked)
    ));

    let info = vault.unlock(&pw("Hunter22!")).await.unwrap();
    assert_eq!(info.wallet_count, 2);
    assert!(info.encrypted);

    let after = (
        vault.get_wallet_for_backup(&mnemonic_id).await.unwrap(),
        vault.get_wallet_for_backup(&key_id).await.unwrap(),
    );
    assert_eq!(before, after);
    assert_eq!(
        after.1.active_public_key(),
        Some(Keypair::from_secret(&[7u8; 32]).public_key_base58().as_str())
    );
}

#[tokio::test]
async fn duplicate_import_is_rejected() {
    let (vault, _, _) = memory_vault().await;
    vault
        .import_wallet(ABANDON, "Wallet 1", &pw("Hunter22!"), 0)
        .await
        .unwrap();

    let err = vault
        .import_wallet(ABANDON, "Wallet 2", &pw("Hunter22!"), 0)
        .await
        .unwrap_err();
    match err {
        VaultError::DuplicateWallet(name) => assert_eq!(name, "Wallet 1"),
        other => panic!("expected duplicate, got {other:?}"),
    }
    assert_eq!(vault.list_wallets().await.unwrap().len(), 1);
}

#[tokio::test]
async fn first_secret_wallet_needs_strong_password() {
    let (vault, store, _) = memory_vault().await;
    let err = vault
        .create_wallet(ABANDON, "Main", &pw("password"))
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::WeakPassword(_)));
    assert_eq!(store.get(keys::AUTH).await.unwrap(), None);
    assert_eq!(store.get(keys::WALLETS).await.unwrap(), None);
}

#[tokio::test]
async fn watch_only_vault_stays_plaintext_until_a_secret_arrives() {
    let (vault, store, _) = memory_vault().await;
    let watched = Keypair::from_secret(&[9u8; 32]).public_key_base58();

    vault.import_watch_only(&watched, "Cold", None).await.unwrap();
    let raw = store.get(keys::WALLETS).await.unwrap().unwrap();
    assert_eq!(WalletCollection::from_json(&raw).unwrap().wallets.len(), 1);
    assert!(!vault.has_password().await.unwrap());

    let err = vault
        .import_private_key(None, &raw_private_key(), "Hot", &pw(""))
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::WeakPassword(_)));

    vault
        .import_wallet(LEGAL, "Main", &pw("Hunter22!"), 0)
        .await
        .unwrap();
    assert!(vault.has_password().await.unwrap());
    let raw = store.get(keys::WALLETS).await.unwrap().unwrap();
    assert!(WalletCollection::from_json(&raw).is_none());

    vault.lock().await;
    let info = vault.unlock(&pw("Hunter22!")).await.unwrap();
    assert_eq!(info.wallet_count, 2);
}

#[tokio::test]
async fn locked_vault_refuses_work() {
    let (vault, _, _) = memory_vault().await;
    vault
        .create_wallet(ABANDON, "Main", &pw("Hunter22!"))
        .await
        .unwrap();
    vault.lock().await;

    assert!(matches!(
        vault.sign_message(b"hi").await,
        Err(VaultError::NotUnlocked)
    ));
    let watched = Keypair::from_secret(&[9u8; 32]).public_key_base58();
    assert!(matches!(
        vault.import_watch_only(&watched, "Cold", None).await,
        Err(VaultError::NotUnlocked)
    ));
}

#[tokio::test]
async fn signing_uses_active_wallet() {
    let (vault, _, _) = memory_vault().await;
    let main = vault
        .create_wallet(ABANDON, "Main", &pw("Hunter22!"))
        .await
        .unwrap();
    let hot = vault
        .import_private_key(None, &raw_private_key(), "Hot", &pw("Hunter22!"))
        .await
        .unwrap();

    let pk = decode_public_key(&vault.active_public_key().await.unwrap()).unwrap();
    let sig = vault.sign_message(b"gm").await.unwrap();
    assert!(verify_signature(&pk, b"gm", &sig));

    vault.select(&hot).await.unwrap();
    let pk = decode_public_key(&vault.active_public_key().await.unwrap()).unwrap();
    let sigs = vault
        .sign_all(&[b"tx-1".to_vec(), b"tx-2".to_vec()])
        .await
        .unwrap();
    assert!(verify_signature(&pk, b"tx-1", &sigs[0]));
    assert!(verify_signature(&pk, b"tx-2", &sigs[1]));

    vault.remove(&hot).await.unwrap();
    assert_eq!(
        vault.session_info().await.unwrap().active_wallet_id,
        Some(main)
    );
}

#[tokio::test]
async fn hardware_and_watch_only_cannot_sign() {
    let (vault, _, _) = memory_vault().await;
    let device_key = Keypair::from_secret(&[3u8; 32]).public_key_base58();
    let id = vault
        .add_hardware_wallet(
            HardwareDescriptor {
                name: "Ledger".into(),
                public_key: device_key,
                path: "44'/501'/2'".into(),
                device_id: "nano-x".into(),
            },
            None,
        )
        .await
        .unwrap();

    let summary = vault.active_wallet_summary().await.unwrap();
    assert_eq!(summary.kind, WalletKind::Hardware);
    assert!(matches!(
        vault.sign_transaction(b"tx").await,
        Err(VaultError::NoSigningKey(w)) if w == id.to_string()
    ));
}

#[tokio::test]
async fn mismatched_public_key_rejected() {
    let (vault, _, _) = memory_vault().await;
    let other = Keypair::from_secret(&[1u8; 32]).public_key_base58();
    let err = vault
        .import_private_key(Some(&other), &raw_private_key(), "Hot", &pw("Hunter22!"))
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::InvalidKey(_)));
}

#[tokio::test]
async fn import_accounts_numbers_and_skips() {
    let (vault, _, _) = memory_vault().await;
    let report = vault
        .import_accounts(
            ABANDON,
            "Wallet",
            &pw("Hunter22!"),
            &[
                (DerivationScheme::Standard, 0),
                (DerivationScheme::Standard, 1),
                (DerivationScheme::Legacy, 0),
            ],
        )
        .await
        .unwrap();
    assert_eq!(report.imported.len(), 3);
    assert!(report.skipped.is_empty());

    let report = vault
        .import_accounts(
            ABANDON,
            "Wallet 7",
            &pw("Hunter22!"),
            &[
                (DerivationScheme::Standard, 1),
                (DerivationScheme::Standard, 2),
            ],
        )
        .await
        .unwrap();
    assert_eq!(report.imported.len(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].existing_name, "Wallet 2");

    let names: Vec<String> = vault
        .list_wallets()
        .await
        .unwrap()
        .into_iter()
        .map(|w| w.name)
        .collect();
    assert_eq!(names, ["Wallet 1", "Wallet 2", "Wallet 3", "Wallet 4"]);
}

#[tokio::test]
async fn import_accounts_collapses_repeated_paths() {
    let (vault, _, _) = memory_vault().await;
    let report = vault
        .import_accounts(
            ABANDON,
            "Wallet",
            &pw("Hunter22!"),
            &[
                (DerivationScheme::Standard, 0),
                (DerivationScheme::Standard, 0),
            ],
        )
        .await
        .unwrap();
    assert_eq!(report.imported.len(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].existing_name, "Wallet 1");
    assert_eq!(vault.list_wallets().await.unwrap().len(), 1);
}

#[tokio::test]
async fn change_password_rekeys() {
    let (vault, store, _) = memory_vault().await;
    let id = vault
        .create_wallet(ABANDON, "Main", &pw("Hunter22!"))
        .await
        .unwrap();
    let sealed_before = store.get(keys::WALLETS).await.unwrap();

    let err = vault
        .change_password(&pw("Hunter22!"), &pw("short1"))
        .await
        .unwrap_err();
    assert!(matches!(err, VaultError::WeakPassword(_)));

    vault
        .change_password(&pw("Hunter22!"), &pw("Tr0ub4dor&3"))
        .await
        .unwrap();
    assert_ne!(store.get(keys::WALLETS).await.unwrap(), sealed_before);

    vault.lock().await;
    assert!(matches!(
        vault.unlock(&pw("Hunter22!")).await,
        Err(VaultError::InvalidPassword)
    ));
    vault.unlock(&pw("Tr0ub4dor&3")).await.unwrap();

    let phrase = vault
        .export_mnemonic(&id, &pw("Tr0ub4dor&3"))
        .await
        .unwrap();
    assert_eq!(phrase.as_str(), ABANDON.split_whitespace().collect::<Vec<_>>().join(" "));
}

#[tokio::test]
async fn exports_need_the_password() {
    let (vault, _, _) = memory_vault().await;
    let id = vault
        .import_private_key(None, &raw_private_key(), "Hot", &pw("Hunter22!"))
        .await
        .unwrap();

    assert!(matches!(
        vault.export_private_key(&id, &pw("Nope1234")).await,
        Err(VaultError::InvalidPassword)
    ));
    let exported = vault
        .export_private_key(&id, &pw("Hunter22!"))
        .await
        .unwrap();
    assert_eq!(exported.as_str(), raw_private_key());
    assert!(matches!(
        vault.export_mnemonic(&id, &pw("Hunter22!")).await,
        Err(VaultError::InvalidKey(_))
    ));
}

#[tokio::test]
async fn idle_vault_auto_locks() {
    let (vault, _, clock) = memory_vault().await;
    vault
        .create_wallet(ABANDON, "Main", &pw("Hunter22!"))
        .await
        .unwrap();
    vault.touch().await;
    let fifteen_min = 15 * 60 * 1000;

    assert!(!vault.lock_if_idle(clock.now_ms() + fifteen_min - 1).await.unwrap());
    assert!(vault.is_unlocked().await);
    assert!(vault.lock_if_idle(clock.now_ms() + fifteen_min).await.unwrap());
    assert!(!vault.is_unlocked().await);
}

#[tokio::test]
async fn rename_updates_listing() {
    let (vault, _, _) = memory_vault().await;
    let id = vault
        .create_wallet(ABANDON, "Main", &pw("Hunter22!"))
        .await
        .unwrap();
    vault.rename(&id, "  Savings ").await.unwrap();
    assert_eq!(vault.list_wallets().await.unwrap()[0].name, "Savings");
    assert!(vault.rename(&id, "   ").await.is_err());
}
