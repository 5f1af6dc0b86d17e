//! Password authenticator: PBKDF2 verifier behind the rate limiter

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use solvault_core::config::LockoutPolicy;
use solvault_core::{Clock, VaultError, VaultResult};
use solvault_crypto::{pbkdf2_sha256, random_salt};
use solvault_store::{keys, Store};

use crate::policy::check_password;
use crate::rate_limit::RateLimiter;

/// Persisted password verifier. `iterations` travels with the hash so the
/// default can be raised without breaking existing vaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRecord {
    pub hash: String,
    pub salt: String,
    pub iterations: u32,
}

impl AuthRecord {
    /// Build a record for `password`. CPU-bound; call from a blocking context.
    pub fn derive(password: &SecretString, iterations: u32) -> Self {
        let salt = random_salt();
        let hash = pbkdf2_sha256(password.expose_secret().as_bytes(), &salt, iterations);
        Self {
            hash: hex::encode(hash),
            salt: hex::encode(salt),
            iterations,
        }
    }

    /// Constant-time comparison against a fresh derivation.
    pub fn matches(&self, password: &SecretString) -> bool {
        let (Ok(salt), Ok(expected)) = (hex::decode(&self.salt), hex::decode(&self.hash)) else {
            return false;
        };
        let actual = pbkdf2_sha256(password.expose_secret().as_bytes(), &salt, self.iterations);
        actual.as_slice().ct_eq(expected.as_slice()).into()
    }
}

/// Outcome of a password check that got past the rate limiter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Verification {
    pub valid: bool,
    /// The rate-limit record failed its integrity check and was reset
    /// before this attempt.
    pub tamper_reset: bool,
}

pub struct Authenticator {
    store: Arc<Store>,
    limiter: RateLimiter,
    iterations: u32,
    /// verify is read-modify-write on the rate-limit record
    gate: Mutex<()>,
}

impl Authenticator {
    pub fn new(
        store: Arc<Store>,
        clock: Arc<dyn Clock>,
        iterations: u32,
        policy: LockoutPolicy,
    ) -> Self {
        let limiter = RateLimiter::new(store.clone(), clock, policy);
        Self::with_limiter(store, limiter, iterations)
    }

    pub fn with_limiter(store: Arc<Store>, limiter: RateLimiter, iterations: u32) -> Self {
        Self {
            store,
            limiter,
            iterations,
            gate: Mutex::new(()),
        }
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub async fn record(&self) -> VaultResult<Option<AuthRecord>> {
        self.store.get_json(keys::AUTH).await
    }

    pub async fn has_password(&self) -> VaultResult<bool> {
        Ok(self.store.get(keys::AUTH).await?.is_some())
    }

    /// Check policy and derive a record without persisting it, so callers
    /// can commit it together with the vault blob.
    pub async fn prepare(&self, password: &SecretString) -> VaultResult<AuthRecord> {
        check_password(password.expose_secret())?;
        let password = SecretString::from(password.expose_secret().to_owned());
        let iterations = self.iterations;
        let record = tokio::task::spawn_blocking(move || AuthRecord::derive(&password, iterations))
            .await
            .map_err(|e| anyhow::anyhow!("kdf worker failed: {e}"))?;
        Ok(record)
    }

    /// Create and persist the verifier for a new password.
    pub async fn setup(&self, password: &SecretString) -> VaultResult<AuthRecord> {
        let record = self.prepare(password).await?;
        self.store.put_json(keys::AUTH, &record).await?;
        info!(iterations = record.iterations, "password set");
        Ok(record)
    }

    /// Verify `password`, counting failures.
    ///
    /// A wrong password and a vault with no password at all both come back
    /// with `valid == false`. A forged rate-limit record is reset, the check
    /// goes ahead, and the outcome carries `tamper_reset`.
    pub async fn verify(&self, password: &SecretString) -> VaultResult<Verification> {
        let _gate = self.gate.lock().await;

        let tamper_reset = match self.limiter.check_rate_limit().await {
            Ok(()) => false,
            Err(VaultError::TamperingDetected) => {
                warn!("tampering detected, counter reset");
                true
            }
            Err(e) => return Err(e),
        };

        let valid = match self.record().await? {
            None => false,
            Some(record) => {
                let password = SecretString::from(password.expose_secret().to_owned());
                tokio::task::spawn_blocking(move || record.matches(&password))
                    .await
                    .map_err(|e| anyhow::anyhow!("kdf worker failed: {e}"))?
            }
        };

        if valid {
            self.limiter.clear().await?;
            debug!("password verified");
        } else {
            let state = self.limiter.record_failure().await?;
            debug!(attempts = state.attempts, "password rejected");
        }
        Ok(Verification {
            valid,
            tamper_reset,
        })
    }

    /// `verify` that maps a wrong password to `InvalidPassword`.
    pub async fn require(&self, password: &SecretString) -> VaultResult<Verification> {
        let verification = self.verify(password).await?;
        if verification.valid {
            Ok(verification)
        } else {
            Err(VaultError::InvalidPassword)
        }
    }
}
