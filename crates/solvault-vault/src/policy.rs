//! Password strength policy

use solvault_core::{VaultError, VaultResult};

pub const MIN_PASSWORD_LEN: usize = 8;

const BANNED: &[&str] = &["password", "123456", "qwerty", "letmein", "12345678", "password1"];

/// Reject passwords that are short, lack a letter or digit, or are on the banned list.
pub fn check_password(password: &str) -> VaultResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(VaultError::WeakPassword(format!(
            "must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if !password.chars().any(char::is_alphabetic) {
        return Err(VaultError::WeakPassword("must contain a letter".into()));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(VaultError::WeakPassword("must contain a digit".into()));
    }
    let lowered = password.to_lowercase();
    if BANNED.iter().any(|b| *b == lowered) {
        return Err(VaultError::WeakPassword("too common".into()));
    }
    Ok(())
}
