//! The vault: wallet collection at rest, unlocked into a [`Session`].
//!
//! Mutations take the `writer` gate for their whole duration, work on a clone
//! of the session's collection, persist it through one batch commit, and
//! only then swap the clone in. A failed save leaves both the store and the
//! session as they were.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use solvault_core::config::{LockoutPolicy, SolvaultConfig, DEFAULT_KDF_ITERATIONS};
use solvault_core::{
    Clock, DerivationScheme, HardwareDescriptor, VaultError, VaultResult, WalletId,
};
use solvault_crypto::keypair::SIGNATURE_SIZE;
use solvault_crypto::{
    decode_public_key, derive_account, derive_vault_key, parse_mnemonic, random_salt,
    DerivationPath, EncryptedBlob, Keypair, Mnemonic,
};
use solvault_store::{keys, ActivityTracker, Batch, Store};

use crate::auth::{AuthRecord, Authenticator};
use crate::session::{KeyMaterial, Session, SessionInfo};
use crate::wallet::{Address, SecretText, StoredWallet, WalletCollection, WalletSummary};

pub type Signature = [u8; SIGNATURE_SIZE];

#[derive(Debug, Clone, Copy)]
pub struct VaultOptions {
    pub kdf_iterations: u32,
    pub lockout_policy: LockoutPolicy,
}

impl Default for VaultOptions {
    fn default() -> Self {
        Self {
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            lockout_policy: LockoutPolicy::Minimal,
        }
    }
}

impl VaultOptions {
    pub fn from_config(config: &SolvaultConfig) -> Self {
        Self {
            kdf_iterations: config.auth.kdf_iterations,
            lockout_policy: config.auth.lockout_policy,
        }
    }
}

/// Outcome of a multi-account import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: Vec<WalletId>,
    pub skipped: Vec<SkippedAccount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedAccount {
    pub scheme: DerivationScheme,
    pub index: u32,
    pub existing_name: String,
}

/// Side effects of authorizing a mutation, applied only if the save succeeds.
#[derive(Default)]
struct Prepared {
    new_auth: Option<AuthRecord>,
    new_key: Option<KeyMaterial>,
}

enum StoredBlob {
    Empty,
    Plain(WalletCollection),
    Sealed(EncryptedBlob),
}

pub struct Vault {
    store: Arc<Store>,
    auth: Authenticator,
    clock: Arc<dyn Clock>,
    iterations: u32,
    writer: Mutex<()>,
    session: RwLock<Option<Session>>,
    activity: ActivityTracker,
    last_activity_ms: AtomicU64,
}

impl Vault {
    pub async fn open(
        store: Arc<Store>,
        clock: Arc<dyn Clock>,
        options: VaultOptions,
    ) -> VaultResult<Self> {
        let auth = Authenticator::new(
            store.clone(),
            clock.clone(),
            options.kdf_iterations,
            options.lockout_policy,
        );
        Self::with_authenticator(store, clock, auth).await
    }

    pub async fn with_authenticator(
        store: Arc<Store>,
        clock: Arc<dyn Clock>,
        auth: Authenticator,
    ) -> VaultResult<Self> {
        let now = clock.now_ms();
        let vault = Self {
            iterations: auth.iterations(),
            store,
            auth,
            clock,
            writer: Mutex::new(()),
            session: RwLock::new(None),
            activity: ActivityTracker::new(),
            last_activity_ms: AtomicU64::new(now),
        };
        if !vault.auth.has_password().await? {
            vault.load_plaintext().await?;
        }
        Ok(vault)
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.auth
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub async fn has_password(&self) -> VaultResult<bool> {
        self.auth.has_password().await
    }

    /// Whether a fresh process should ask for the password before showing
    /// anything. Encryption is independent of this setting.
    pub async fn requires_password_on_open(&self) -> VaultResult<bool> {
        Ok(self.auth.has_password().await? && self.store.password_protection().await?)
    }

    // ── session lifecycle ─────────────────────────────────────────────────

    pub async fn unlock(&self, password: &SecretString) -> VaultResult<SessionInfo> {
        let _writer = self.writer.lock().await;
        self.unlock_locked(password).await
    }

    pub async fn lock(&self) {
        let dropped = self.session.write().await.take();
        if dropped.is_some() {
            info!("vault locked");
        }
    }

    pub async fn is_unlocked(&self) -> bool {
        self.session.read().await.is_some()
    }

    pub async fn session_info(&self) -> Option<SessionInfo> {
        self.session.read().await.as_ref().map(Session::info)
    }

    /// Re-check the password inside a live session (or unlock a locked one)
    /// and mark the session freshly authenticated.
    pub async fn reauthenticate(&self, password: &SecretString) -> VaultResult<SessionInfo> {
        let _writer = self.writer.lock().await;
        if !self.is_unlocked().await {
            return self.unlock_locked(password).await;
        }
        let verification = self.auth.require(password).await?;
        let now = self.clock.now_ms();
        let mut guard = self.session.write().await;
        let session = guard.as_mut().ok_or(VaultError::NotUnlocked)?;
        session.last_auth_ms = now;
        session.tamper_reset = verification.tamper_reset;
        Ok(session.info())
    }

    /// Lock once the configured auto-lock interval has passed without activity.
    pub async fn lock_if_idle(&self, now_ms: u64) -> VaultResult<bool> {
        if !self.is_unlocked().await || !self.auth.has_password().await? {
            return Ok(false);
        }
        let Some(limit) = self.store.auto_lock().await?.as_millis() else {
            return Ok(false);
        };
        let last = self.last_activity_ms.load(Ordering::SeqCst);
        if now_ms.saturating_sub(last) < limit {
            return Ok(false);
        }
        info!(idle_ms = now_ms.saturating_sub(last), "auto-lock");
        self.lock().await;
        Ok(true)
    }

    /// Record user activity; persisted at most every 30 s.
    pub async fn touch(&self) {
        let now = self.clock.now_ms();
        self.last_activity_ms.store(now, Ordering::SeqCst);
        if let Err(e) = self.activity.touch(&self.store, now).await {
            warn!(error = %e, "failed to persist last_activity");
        }
    }

    // ── adding wallets ────────────────────────────────────────────────────

    /// Add a freshly generated phrase as account 0.
    pub async fn create_wallet(
        &self,
        mnemonic: &str,
        name: &str,
        password: &SecretString,
    ) -> VaultResult<WalletId> {
        self.import_wallet(mnemonic, name, password, 0).await
    }

    /// Import one standard-path account of an existing phrase.
    pub async fn import_wallet(
        &self,
        mnemonic: &str,
        name: &str,
        password: &SecretString,
        derivation_index: u32,
    ) -> VaultResult<WalletId> {
        let mnemonic = parse_mnemonic(mnemonic)?;
        let now = self.clock.now_ms();
        let wallet = mnemonic_wallet(
            &mnemonic,
            name.to_string(),
            DerivationScheme::Standard,
            derivation_index,
            now,
        )?;
        self.add_wallet(wallet, Some(password)).await
    }

    /// Import several accounts of one phrase. Accounts already present are
    /// skipped; the rest are numbered `<base> N`.
    pub async fn import_accounts(
        &self,
        mnemonic: &str,
        base_name: &str,
        password: &SecretString,
        accounts: &[(DerivationScheme, u32)],
    ) -> VaultResult<ImportReport> {
        let mnemonic = parse_mnemonic(mnemonic)?;
        let now = self.clock.now_ms();
        let candidates = accounts
            .iter()
            .map(|&(scheme, index)| {
                mnemonic_wallet(&mnemonic, String::new(), scheme, index, now)
                    .map(|w| (scheme, index, w))
            })
            .collect::<VaultResult<Vec<_>>>()?;

        let _writer = self.writer.lock().await;
        let prepared = self.prepare(Some(password), true).await?;
        let single = accounts.len() == 1;

        let report = self
            .mutate(prepared, |collection| {
                let mut report = ImportReport::default();
                let mut fresh: Vec<StoredWallet> = Vec::new();
                // repeats within this batch: (scheme, index, position in `fresh`)
                let mut repeats = Vec::new();
                for (scheme, index, wallet) in candidates {
                    let pk = wallet.active_public_key().unwrap_or_default().to_string();
                    if let Some(existing) = collection.owner_of(&pk) {
                        report.skipped.push(SkippedAccount {
                            scheme,
                            index,
                            existing_name: existing.to_string(),
                        });
                    } else if let Some(pos) = fresh
                        .iter()
                        .position(|w| w.active_public_key() == Some(pk.as_str()))
                    {
                        repeats.push((scheme, index, pos));
                    } else {
                        fresh.push(wallet);
                    }
                }

                let names = if single {
                    vec![base_name.trim().to_string()]
                } else {
                    collection.numbered_names(base_name, fresh.len())
                };
                for (wallet, name) in fresh.iter_mut().zip(names) {
                    rename_with_addresses(wallet, name);
                }
                for (scheme, index, pos) in repeats {
                    report.skipped.push(SkippedAccount {
                        scheme,
                        index,
                        existing_name: fresh[pos].name().to_string(),
                    });
                }
                for wallet in fresh {
                    report.imported.push(wallet.id().clone());
                    collection.push(wallet);
                }
                Ok(report)
            })
            .await?;

        info!(
            imported = report.imported.len(),
            skipped = report.skipped.len(),
            "accounts imported"
        );
        Ok(report)
    }

    /// Import a raw key. `public_key`, if given, must match the secret.
    pub async fn import_private_key(
        &self,
        public_key: Option<&str>,
        private_key: &str,
        name: &str,
        password: &SecretString,
    ) -> VaultResult<WalletId> {
        let keypair = Keypair::from_base58(private_key)?;
        let derived = keypair.public_key_base58();
        if let Some(claimed) = public_key {
            if decode_public_key(claimed)? != keypair.public_key() {
                return Err(VaultError::InvalidKey(
                    "public key does not match private key".into(),
                ));
            }
        }

        let wallet = StoredWallet::PrivateKey {
            id: WalletId::generate(),
            name: name.to_string(),
            public_key: derived.clone(),
            private_key: SecretText::new(keypair.to_base58().as_str()),
            created_at: self.clock.now_ms(),
            addresses: vec![Address::public(0, derived, name.to_string())],
        };
        self.add_wallet(wallet, Some(password)).await
    }

    /// Track an address without any key. A password is needed only when the
    /// vault already holds secrets and is locked.
    pub async fn import_watch_only(
        &self,
        public_key: &str,
        name: &str,
        password: Option<&SecretString>,
    ) -> VaultResult<WalletId> {
        decode_public_key(public_key)?;
        let wallet = StoredWallet::WatchOnly {
            id: WalletId::generate(),
            name: name.to_string(),
            public_key: public_key.trim().to_string(),
            created_at: self.clock.now_ms(),
            addresses: vec![Address::public(0, public_key.trim().to_string(), name.to_string())],
        };
        self.add_wallet(wallet, password).await
    }

    pub async fn add_hardware_wallet(
        &self,
        descriptor: HardwareDescriptor,
        password: Option<&SecretString>,
    ) -> VaultResult<WalletId> {
        decode_public_key(&descriptor.public_key)?;
        let path = DerivationPath::parse(&descriptor.path, false)?;
        let index = account_from_path(&path);

        let wallet = StoredWallet::Hardware {
            id: WalletId::generate(),
            name: descriptor.name.clone(),
            public_key: descriptor.public_key.clone(),
            path: path.to_string(),
            device_id: descriptor.device_id,
            created_at: self.clock.now_ms(),
            addresses: vec![Address::public(index, descriptor.public_key, descriptor.name)],
        };
        self.add_wallet(wallet, password).await
    }

    async fn add_wallet(
        &self,
        wallet: StoredWallet,
        password: Option<&SecretString>,
    ) -> VaultResult<WalletId> {
        let _writer = self.writer.lock().await;
        let prepared = self.prepare(password, wallet.has_secret()).await?;
        let id = wallet.id().clone();
        let kind = wallet.kind();

        self.mutate(prepared, |collection| {
            for pk in wallet.public_keys() {
                collection.ensure_unique(pk)?;
            }
            collection.push(wallet);
            Ok(())
        })
        .await?;

        info!(wallet = %id, kind = %kind, "wallet added");
        Ok(id)
    }

    // ── managing wallets ──────────────────────────────────────────────────

    pub async fn list_wallets(&self) -> VaultResult<Vec<WalletSummary>> {
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or(VaultError::NotUnlocked)?;
        Ok(session.collection.summaries())
    }

    pub async fn select(&self, id: &WalletId) -> VaultResult<()> {
        let _writer = self.writer.lock().await;
        let prepared = self.prepare(None, false).await?;
        self.mutate(prepared, |collection| {
            collection.get(id)?;
            collection.active_wallet_id = Some(id.clone());
            Ok(())
        })
        .await?;
        debug!(wallet = %id, "wallet selected");
        Ok(())
    }

    pub async fn rename(&self, id: &WalletId, name: &str) -> VaultResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(anyhow::anyhow!("wallet name cannot be empty").into());
        }
        let _writer = self.writer.lock().await;
        let prepared = self.prepare(None, false).await?;
        self.mutate(prepared, |collection| {
            let wallet = collection.get_mut(id)?;
            rename_with_addresses(wallet, name.to_string());
            Ok(())
        })
        .await?;
        debug!(wallet = %id, "wallet renamed");
        Ok(())
    }

    pub async fn remove(&self, id: &WalletId) -> VaultResult<()> {
        let _writer = self.writer.lock().await;
        let prepared = self.prepare(None, false).await?;
        self.mutate(prepared, |collection| {
            // dropping the removed wallet zeroizes its secrets
            collection.remove(id).map(drop)
        })
        .await?;
        info!(wallet = %id, "wallet removed");
        Ok(())
    }

    // ── exports ───────────────────────────────────────────────────────────

    pub async fn export_mnemonic(
        &self,
        id: &WalletId,
        password: &SecretString,
    ) -> VaultResult<Zeroizing<String>> {
        self.require_fresh_password(password).await?;
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or(VaultError::NotUnlocked)?;
        match session.collection.get(id)? {
            StoredWallet::Mnemonic { mnemonic, .. } => {
                warn!(wallet = %id, "mnemonic exported");
                Ok(Zeroizing::new(mnemonic.expose().to_string()))
            }
            _ => Err(VaultError::InvalidKey(format!("wallet {id} has no mnemonic"))),
        }
    }

    /// Base58 `secret ‖ public` keypair of the wallet's active address.
    pub async fn export_private_key(
        &self,
        id: &WalletId,
        password: &SecretString,
    ) -> VaultResult<Zeroizing<String>> {
        self.require_fresh_password(password).await?;
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or(VaultError::NotUnlocked)?;
        let keypair = keypair_for(session.collection.get(id)?)?;
        warn!(wallet = %id, "private key exported");
        Ok(keypair.to_base58())
    }

    /// Full stored record, secrets included, for backup screens.
    pub async fn get_wallet_for_backup(&self, id: &WalletId) -> VaultResult<StoredWallet> {
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or(VaultError::NotUnlocked)?;
        Ok(session.collection.get(id)?.clone())
    }

    async fn require_fresh_password(&self, password: &SecretString) -> VaultResult<()> {
        if !self.is_unlocked().await {
            return Err(VaultError::NotUnlocked);
        }
        self.auth.require(password).await?;
        if let Some(session) = self.session.write().await.as_mut() {
            session.last_auth_ms = self.clock.now_ms();
        }
        Ok(())
    }

    // ── password change ───────────────────────────────────────────────────

    /// Re-key the vault. The new auth record and the re-sealed blob are
    /// committed in one batch.
    pub async fn change_password(
        &self,
        old: &SecretString,
        new: &SecretString,
    ) -> VaultResult<()> {
        let _writer = self.writer.lock().await;
        if !self.is_unlocked().await {
            return Err(VaultError::NotUnlocked);
        }
        self.auth.require(old).await?;

        let record = self.auth.prepare(new).await?;
        let key = self.fresh_key(new).await?;

        let collection = {
            let guard = self.session.read().await;
            guard
                .as_ref()
                .ok_or(VaultError::NotUnlocked)?
                .collection
                .clone()
        };
        self.persist(&collection, Some(&key), Some(&record)).await?;

        let now = self.clock.now_ms();
        if let Some(session) = self.session.write().await.as_mut() {
            session.key = Some(key);
            session.last_auth_ms = now;
        }
        info!(iterations = record.iterations, "password changed");
        Ok(())
    }

    // ── signing ───────────────────────────────────────────────────────────

    pub async fn active_public_key(&self) -> VaultResult<String> {
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or(VaultError::NotUnlocked)?;
        let wallet = active_wallet(&session.collection)?;
        wallet
            .active_public_key()
            .map(str::to_string)
            .ok_or_else(|| VaultError::WalletNotFound(wallet.id().to_string()))
    }

    pub async fn active_wallet_summary(&self) -> VaultResult<WalletSummary> {
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or(VaultError::NotUnlocked)?;
        Ok(active_wallet(&session.collection)?.summary(true))
    }

    pub async fn sign_message(&self, message: &[u8]) -> VaultResult<Signature> {
        let keypair = self.active_keypair().await?;
        self.touch().await;
        Ok(keypair.sign(message))
    }

    /// Sign serialized transaction message bytes as given.
    pub async fn sign_transaction(&self, tx: &[u8]) -> VaultResult<Signature> {
        let keypair = self.active_keypair().await?;
        self.touch().await;
        Ok(keypair.sign(tx))
    }

    pub async fn sign_all(&self, txs: &[Vec<u8>]) -> VaultResult<Vec<Signature>> {
        let keypair = self.active_keypair().await?;
        self.touch().await;
        Ok(txs.iter().map(|tx| keypair.sign(tx)).collect())
    }

    async fn active_keypair(&self) -> VaultResult<Keypair> {
        let guard = self.session.read().await;
        let session = guard.as_ref().ok_or(VaultError::NotUnlocked)?;
        keypair_for(active_wallet(&session.collection)?)
    }

    // ── internals ─────────────────────────────────────────────────────────

    async fn unlock_locked(&self, password: &SecretString) -> VaultResult<SessionInfo> {
        let verification = self.auth.require(password).await?;

        let (collection, key) = match self.read_blob().await? {
            StoredBlob::Empty => (WalletCollection::default(), self.fresh_key(password).await?),
            StoredBlob::Plain(collection) => (collection, self.fresh_key(password).await?),
            StoredBlob::Sealed(blob) => {
                let (salt, iterations) = (blob.salt, blob.iterations);
                let pw = SecretString::from(password.expose_secret().to_owned());
                let (plaintext, key) = tokio::task::spawn_blocking(move || blob.decrypt(&pw))
                    .await
                    .map_err(|e| anyhow::anyhow!("decrypt worker failed: {e}"))??;
                let collection = WalletCollection::from_json(&plaintext).ok_or_else(|| {
                    VaultError::Storage("decrypted wallet data is malformed".into())
                })?;
                let material = KeyMaterial {
                    key,
                    salt,
                    iterations,
                };
                (collection, material)
            }
        };

        let now = self.clock.now_ms();
        let mut session = Session::new(collection, Some(key), now);
        session.tamper_reset = verification.tamper_reset;
        let info = session.info();
        *self.session.write().await = Some(session);

        self.activity.reset();
        self.touch().await;
        info!(wallets = info.wallet_count, "vault unlocked");
        Ok(info)
    }

    async fn load_plaintext(&self) -> VaultResult<()> {
        let collection = match self.read_blob().await? {
            StoredBlob::Empty => WalletCollection::default(),
            StoredBlob::Plain(collection) => collection,
            StoredBlob::Sealed(_) => {
                warn!("encrypted wallet data without a password record; staying locked");
                return Ok(());
            }
        };
        let now = self.clock.now_ms();
        *self.session.write().await = Some(Session::new(collection, None, now));
        Ok(())
    }

    /// Stored blob, classified by trying the plaintext JSON form first.
    async fn read_blob(&self) -> VaultResult<StoredBlob> {
        let Some(bytes) = self.store.get(keys::WALLETS).await? else {
            return Ok(StoredBlob::Empty);
        };
        if let Some(collection) = WalletCollection::from_json(&bytes) {
            return Ok(StoredBlob::Plain(collection));
        }
        EncryptedBlob::parse(&bytes)
            .map(StoredBlob::Sealed)
            .map_err(|e| VaultError::Storage(format!("wallet blob unreadable: {e}")))
    }

    async fn fresh_key(&self, password: &SecretString) -> VaultResult<KeyMaterial> {
        let pw = SecretString::from(password.expose_secret().to_owned());
        let iterations = self.iterations;
        let material = tokio::task::spawn_blocking(move || {
            let salt = random_salt();
            KeyMaterial {
                key: derive_vault_key(&pw, &salt, iterations),
                salt,
                iterations,
            }
        })
        .await
        .map_err(|e| anyhow::anyhow!("kdf worker failed: {e}"))?;
        Ok(material)
    }

    /// Authorize a mutation. Caller holds `writer`.
    ///
    /// With a password on record: a supplied password is verified (unlocking
    /// if needed), otherwise a live session is required. Without one: the
    /// plaintext collection is loaded, and if the change brings in secret
    /// material a password record and vault key are prepared for the save.
    async fn prepare(
        &self,
        password: Option<&SecretString>,
        secret_bearing: bool,
    ) -> VaultResult<Prepared> {
        if self.auth.has_password().await? {
            let unlocked = self.is_unlocked().await;
            match password {
                Some(pw) if unlocked => {
                    self.auth.require(pw).await?;
                    let now = self.clock.now_ms();
                    if let Some(session) = self.session.write().await.as_mut() {
                        session.last_auth_ms = now;
                    }
                }
                Some(pw) => {
                    self.unlock_locked(pw).await?;
                }
                None if unlocked => {}
                None => return Err(VaultError::NotUnlocked),
            }
            return Ok(Prepared::default());
        }

        if !self.is_unlocked().await {
            self.load_plaintext().await?;
            if !self.is_unlocked().await {
                return Err(VaultError::NotUnlocked);
            }
        }
        if !secret_bearing {
            return Ok(Prepared::default());
        }

        let pw = password.ok_or(VaultError::EncryptionRequired)?;
        let record = self.auth.prepare(pw).await?;
        let key = self.fresh_key(pw).await?;
        info!("first secret wallet; vault will be encrypted");
        Ok(Prepared {
            new_auth: Some(record),
            new_key: Some(key),
        })
    }

    async fn mutate<T>(
        &self,
        prepared: Prepared,
        apply: impl FnOnce(&mut WalletCollection) -> VaultResult<T>,
    ) -> VaultResult<T> {
        let (mut next, key) = {
            let guard = self.session.read().await;
            let session = guard.as_ref().ok_or(VaultError::NotUnlocked)?;
            let key = prepared.new_key.clone().or_else(|| session.key.clone());
            (session.collection.clone(), key)
        };

        let out = apply(&mut next)?;
        self.persist(&next, key.as_ref(), prepared.new_auth.as_ref())
            .await?;

        let mut guard = self.session.write().await;
        if let Some(session) = guard.as_mut() {
            session.collection = next;
            if prepared.new_key.is_some() {
                session.key = prepared.new_key;
            }
        }
        drop(guard);
        self.touch().await;
        Ok(out)
    }

    /// Write the collection (sealed if a key is held) plus an optional new
    /// auth record as one batch.
    async fn persist(
        &self,
        collection: &WalletCollection,
        key: Option<&KeyMaterial>,
        new_auth: Option<&AuthRecord>,
    ) -> VaultResult<()> {
        let mut batch = Batch::new();
        match key {
            Some(material) => {
                let plaintext = Zeroizing::new(collection.to_json()?);
                let blob = EncryptedBlob::seal(
                    &material.key,
                    material.salt,
                    material.iterations,
                    &plaintext,
                )?;
                batch = batch
                    .put(keys::WALLETS, blob.to_json()?)
                    .put(keys::ENCRYPTED, "true");
            }
            None => {
                if collection.has_secrets() || self.store.get(keys::ENCRYPTED).await?.is_some() {
                    return Err(VaultError::EncryptionRequired);
                }
                batch = batch
                    .put(keys::WALLETS, collection.to_json()?)
                    .delete(keys::ENCRYPTED);
            }
        }
        if let Some(record) = new_auth {
            batch = batch.put_json(keys::AUTH, record)?;
        }
        self.store.commit(batch).await
    }
}

fn mnemonic_wallet(
    mnemonic: &Mnemonic,
    name: String,
    scheme: DerivationScheme,
    index: u32,
    now: u64,
) -> VaultResult<StoredWallet> {
    let keypair = derive_account(mnemonic, scheme, index)?;
    Ok(StoredWallet::Mnemonic {
        id: WalletId::generate(),
        mnemonic: SecretText::new(mnemonic.phrase()),
        scheme,
        created_at: now,
        active_address_index: index,
        addresses: vec![Address::public(index, keypair.public_key_base58(), name.clone())],
        name,
    })
}

/// Rename a wallet and, for single-address wallets, its address label.
fn rename_with_addresses(wallet: &mut StoredWallet, name: String) {
    if let [only] = wallet.addresses_mut().as_mut_slice() {
        only.name = name.clone();
    }
    wallet.set_name(name);
}

fn active_wallet(collection: &WalletCollection) -> VaultResult<&StoredWallet> {
    collection
        .active()
        .ok_or_else(|| VaultError::WalletNotFound("no active wallet".into()))
}

fn keypair_for(wallet: &StoredWallet) -> VaultResult<Keypair> {
    match wallet {
        StoredWallet::Mnemonic {
            mnemonic,
            scheme,
            active_address_index,
            ..
        } => {
            let mnemonic = parse_mnemonic(mnemonic.expose())?;
            derive_account(&mnemonic, *scheme, *active_address_index)
        }
        StoredWallet::PrivateKey { private_key, .. } => Keypair::from_base58(private_key.expose()),
        StoredWallet::Hardware { id, .. } | StoredWallet::WatchOnly { id, .. } => {
            Err(VaultError::NoSigningKey(id.to_string()))
        }
    }
}

/// Account level of a BIP44 path (`m/44'/501'/{account}'...`), else 0.
fn account_from_path(path: &DerivationPath) -> u32 {
    path.indices()
        .get(2)
        .map(|i| i & !solvault_crypto::path::HARDENED)
        .unwrap_or(0)
}
