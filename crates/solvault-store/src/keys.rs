//! Storage key names.

pub const AUTH: &str = "auth";
pub const WALLETS: &str = "wallets";
pub const ENCRYPTED: &str = "encrypted";
pub const PASSWORD_PROTECTION: &str = "password_protection";
pub const RATE_LIMIT: &str = "rate_limit";
pub const RATE_LIMIT_KEY: &str = "rate_limit_key";
pub const CONNECTED_SITES: &str = "connected_sites";
pub const LAST_ACTIVITY: &str = "last_activity";
pub const AUTO_LOCK: &str = "auto_lock";

/// Pending batch, present only between the start and end of a commit.
pub const JOURNAL: &str = "journal";
