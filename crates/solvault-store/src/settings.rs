//! Typed settings on top of the raw store.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info};

use solvault_core::VaultResult;

use crate::keys;
use crate::store::Store;

/// Minimum gap between two `last_activity` writes.
pub const ACTIVITY_WRITE_INTERVAL_MS: u64 = 30_000;

/// Auto-lock timeout in minutes. 0 means never.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoLock(u32);

impl AutoLock {
    pub const ALLOWED: [u32; 7] = [0, 1, 5, 15, 30, 60, 1440];
    pub const DEFAULT: AutoLock = AutoLock(15);
    pub const NEVER: AutoLock = AutoLock(0);

    /// Older versions stored -1 for "one day".
    const LEGACY_ONE_DAY: i64 = -1;

    /// Map a stored value to a supported one. The flag is true when the
    /// stored value needs rewriting.
    pub fn from_stored(raw: i64) -> (Self, bool) {
        if raw == Self::LEGACY_ONE_DAY {
            return (AutoLock(1440), true);
        }
        match u32::try_from(raw) {
            Ok(m) if Self::ALLOWED.contains(&m) => (AutoLock(m), false),
            _ => (Self::DEFAULT, true),
        }
    }

    pub fn minutes(self) -> u32 {
        self.0
    }

    pub fn as_millis(self) -> Option<u64> {
        (self.0 != 0).then(|| u64::from(self.0) * 60_000)
    }
}

impl Default for AutoLock {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<i64> for AutoLock {
    type Error = solvault_core::VaultError;

    fn try_from(minutes: i64) -> Result<Self, Self::Error> {
        match AutoLock::from_stored(minutes) {
            (lock, false) => Ok(lock),
            _ => Err(solvault_core::VaultError::Config(format!(
                "auto-lock must be one of {:?} minutes, got {minutes}",
                AutoLock::ALLOWED
            ))),
        }
    }
}

impl Store {
    /// Read `auto_lock`, rewriting legacy or unsupported values.
    pub async fn auto_lock(&self) -> VaultResult<AutoLock> {
        let Some(raw) = self.get_json::<i64>(keys::AUTO_LOCK).await? else {
            return Ok(AutoLock::DEFAULT);
        };
        let (lock, rewrite) = AutoLock::from_stored(raw);
        if rewrite {
            info!(from = raw, to = lock.minutes(), "migrating auto_lock setting");
            self.put_json(keys::AUTO_LOCK, &lock.minutes()).await?;
        }
        Ok(lock)
    }

    pub async fn set_auto_lock(&self, lock: AutoLock) -> VaultResult<()> {
        self.put_json(keys::AUTO_LOCK, &lock.minutes()).await
    }

    /// Whether the UI asks for the password on open. Defaults to on.
    ///
    /// Encryption does not depend on this flag.
    pub async fn password_protection(&self) -> VaultResult<bool> {
        Ok(self
            .get_json::<bool>(keys::PASSWORD_PROTECTION)
            .await?
            .unwrap_or(true))
    }

    pub async fn set_password_protection(&self, on: bool) -> VaultResult<()> {
        self.put_json(keys::PASSWORD_PROTECTION, &on).await
    }

    pub async fn last_activity(&self) -> VaultResult<Option<u64>> {
        self.get_json::<u64>(keys::LAST_ACTIVITY).await
    }
}

/// Throttles `last_activity` writes to one per [`ACTIVITY_WRITE_INTERVAL_MS`].
#[derive(Debug, Default)]
pub struct ActivityTracker {
    last_written_ms: AtomicU64,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record activity at `now_ms`. Returns true when the store was written.
    pub async fn touch(&self, store: &Store, now_ms: u64) -> VaultResult<bool> {
        let last = self.last_written_ms.load(Ordering::SeqCst);
        if last != 0 && now_ms.saturating_sub(last) < ACTIVITY_WRITE_INTERVAL_MS {
            return Ok(false);
        }
        if self
            .last_written_ms
            .compare_exchange(last, now_ms, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            // Another caller won the race for this window.
            return Ok(false);
        }
        store.put_json(keys::LAST_ACTIVITY, &now_ms).await?;
        debug!(now_ms, "last_activity written");
        Ok(true)
    }

    /// Forget the throttle window so the next touch writes.
    pub fn reset(&self) {
        self.last_written_ms.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_lock_mapping() {
        assert_eq!(AutoLock::from_stored(-1), (AutoLock(1440), true));
        assert_eq!(AutoLock::from_stored(30), (AutoLock(30), false));
        assert_eq!(AutoLock::from_stored(7), (AutoLock::DEFAULT, true));
        assert_eq!(AutoLock::from_stored(0).0.as_millis(), None);
        assert_eq!(AutoLock(5).as_millis(), Some(300_000));
        assert!(AutoLock::try_from(7).is_err());
    }

    #[tokio::test]
    async fn test_legacy_auto_lock_is_rewritten() {
        let store = Store::memory().await.unwrap();
        store.put(keys::AUTO_LOCK, b"-1".to_vec()).await.unwrap();

        assert_eq!(store.auto_lock().await.unwrap().minutes(), 1440);
        assert_eq!(store.get_json::<i64>(keys::AUTO_LOCK).await.unwrap(), Some(1440));
    }

    #[tokio::test]
    async fn test_auto_lock_default_when_absent() {
        let store = Store::memory().await.unwrap();
        assert_eq!(store.auto_lock().await.unwrap(), AutoLock::DEFAULT);
        assert_eq!(store.get(keys::AUTO_LOCK).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_password_protection_default_on() {
        let store = Store::memory().await.unwrap();
        assert!(store.password_protection().await.unwrap());
        store.set_password_protection(false).await.unwrap();
        assert!(!store.password_protection().await.unwrap());
    }

    #[tokio::test]
    async fn test_activity_throttled() {
        let store = Store::memory().await.unwrap();
        let tracker = ActivityTracker::new();

        assert!(tracker.touch(&store, 100_000).await.unwrap());
        assert!(!tracker.touch(&store, 110_000).await.unwrap());
        assert_eq!(store.last_activity().await.unwrap(), Some(100_000));

        assert!(tracker.touch(&store, 130_000).await.unwrap());
        assert_eq!(store.last_activity().await.unwrap(), Some(130_000));
    }
}
