//! Failed-unlock backoff and lockout with a tamper-evident persisted record.
//!
//! The record is bound to this device and to a random key stored under
//! `rate_limit_key` by an HMAC-SHA256 checksum. Editing any field without
//! recomputing the checksum resets the counter and raises
//! [`VaultError::TamperingDetected`].

use std::sync::Arc;

use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{info, warn};

use solvault_core::config::LockoutPolicy;
use solvault_core::{Clock, VaultError, VaultResult};
use solvault_store::{keys, Store};

use crate::device::device_identity;

type HmacSha256 = Hmac<Sha256>;

const DOMAIN: &str = "solvault/rate-limit/v1";

/// Backoff after a failure, by total failed attempts. Checked top-down.
const DELAY_SCHEDULE: &[(u32, u64)] = &[(10, 30_000), (5, 5_000), (3, 1_000)];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitState {
    pub attempts: u32,
    pub last_attempt: u64,
    pub lockout_until: Option<u64>,
    pub delay_until: Option<u64>,
    pub checksum: String,
}

pub struct RateLimiter {
    store: Arc<Store>,
    clock: Arc<dyn Clock>,
    policy: LockoutPolicy,
    identity: String,
}

impl RateLimiter {
    pub fn new(store: Arc<Store>, clock: Arc<dyn Clock>, policy: LockoutPolicy) -> Self {
        Self::with_identity(store, clock, policy, device_identity())
    }

    pub fn with_identity(
        store: Arc<Store>,
        clock: Arc<dyn Clock>,
        policy: LockoutPolicy,
        identity: String,
    ) -> Self {
        Self {
            store,
            clock,
            policy,
            identity,
        }
    }

    pub fn policy(&self) -> LockoutPolicy {
        self.policy
    }

    /// Gate an attempt. Fails with `AccountLocked` during a lockout or backoff
    /// delay, or with `TamperingDetected` after resetting a forged record.
    ///
    /// An attempt refused by a backoff delay is counted as a failure, so
    /// hammering the gate reaches the lockout as fast as wrong passwords do.
    pub async fn check_rate_limit(&self) -> VaultResult<()> {
        let Some(state) = self.load().await? else {
            return Ok(());
        };
        let now = self.clock.now_ms();

        if let Some(until) = state.lockout_until {
            if now < until {
                return Err(locked(until, now));
            }
            info!("lockout expired; clearing rate-limit record");
            self.clear().await?;
            return Ok(());
        }
        if let Some(until) = state.delay_until {
            if now < until {
                let state = self.record_failure().await?;
                let until = state.lockout_until.or(state.delay_until).unwrap_or(until);
                return Err(locked(until, now));
            }
        }
        Ok(())
    }

    /// Count one failed attempt and persist the new backoff.
    pub async fn record_failure(&self) -> VaultResult<RateLimitState> {
        let mut state = match self.load().await {
            Ok(Some(state)) => state,
            Ok(None) | Err(VaultError::TamperingDetected) => RateLimitState::default(),
            Err(e) => return Err(e),
        };
        let now = self.clock.now_ms();

        state.attempts = state.attempts.saturating_add(1);
        state.last_attempt = now;
        state.delay_until = DELAY_SCHEDULE
            .iter()
            .find(|(min, _)| state.attempts >= *min)
            .map(|(_, delay)| now + delay);

        if state.attempts >= self.policy.max_attempts() {
            let until = now + self.policy.lockout_ms();
            state.lockout_until = Some(until);
            warn!(attempts = state.attempts, until, "too many failed unlocks; locking out");
        }

        self.save(&mut state).await?;
        Ok(state)
    }

    /// Forget all failures (successful unlock).
    pub async fn clear(&self) -> VaultResult<()> {
        self.store.delete(keys::RATE_LIMIT).await
    }

    pub async fn state(&self) -> VaultResult<Option<RateLimitState>> {
        match self.load().await {
            Err(VaultError::TamperingDetected) => Ok(None),
            other => other,
        }
    }

    async fn load(&self) -> VaultResult<Option<RateLimitState>> {
        let Some(state) = self
            .store
            .get_json::<RateLimitState>(keys::RATE_LIMIT)
            .await
            .or_else(|e| match e {
                // unparseable record counts as tampering
                VaultError::Storage(_) => Ok(Some(RateLimitState {
                    checksum: String::new(),
                    ..Default::default()
                })),
                other => Err(other),
            })?
        else {
            return Ok(None);
        };

        let key = self.key().await?;
        if !self.verify_checksum(&key, &state) {
            warn!("rate-limit record failed integrity check; counter reset");
            self.clear().await?;
            return Err(VaultError::TamperingDetected);
        }
        Ok(Some(state))
    }

    async fn save(&self, state: &mut RateLimitState) -> VaultResult<()> {
        let key = self.key().await?;
        let checksum = hex::encode(self.mac(&key, state)?.finalize().into_bytes());
        state.checksum = checksum;
        self.store.put_json(keys::RATE_LIMIT, state).await
    }

    async fn key(&self) -> VaultResult<Vec<u8>> {
        if let Some(hex_key) = self.store.get(keys::RATE_LIMIT_KEY).await? {
            if let Ok(key) = hex::decode(&hex_key) {
                if key.len() == 32 {
                    return Ok(key);
                }
            }
        }
        let mut key = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);
        self.store
            .put(keys::RATE_LIMIT_KEY, hex::encode(&key).into_bytes())
            .await?;
        Ok(key)
    }

    fn mac(&self, key: &[u8], state: &RateLimitState) -> VaultResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(key)
            .map_err(|e| anyhow::anyhow!("rate-limit key rejected: {e}"))?;
        let fields = format!(
            "{DOMAIN}|{}|{}|{}|{}|{}",
            self.identity,
            state.attempts,
            state.last_attempt,
            opt(state.lockout_until),
            opt(state.delay_until),
        );
        mac.update(fields.as_bytes());
        Ok(mac)
    }

    fn verify_checksum(&self, key: &[u8], state: &RateLimitState) -> bool {
        let Ok(expected) = hex::decode(&state.checksum) else {
            return false;
        };
        match self.mac(key, state) {
            Ok(mac) => mac.verify_slice(&expected).is_ok(),
            Err(_) => false,
        }
    }
}

fn opt(v: Option<u64>) -> String {
    v.map(|n| n.to_string()).unwrap_or_else(|| "-".into())
}

fn locked(until: u64, now: u64) -> VaultError {
    VaultError::AccountLocked {
        until_ms: until,
        retry_after_ms: until - now,
    }
}
