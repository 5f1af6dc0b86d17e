//! Terminal prompts. Secrets are read without echo and never from argv.

use anyhow::{bail, Context, Result};
use secrecy::{ExposeSecret, SecretString};

pub fn password(prompt: &str) -> Result<SecretString> {
    let pw = rpassword::prompt_password(prompt).context("reading password")?;
    Ok(SecretString::from(pw))
}

/// Ask twice for a new password.
pub fn new_password() -> Result<SecretString> {
    let first = password("New vault password: ")?;
    let second = password("Repeat password: ")?;
    if first.expose_secret() != second.expose_secret() {
        bail!("passwords do not match");
    }
    Ok(first)
}

pub fn mnemonic() -> Result<SecretString> {
    let phrase = rpassword::prompt_password("Recovery phrase: ").context("reading recovery phrase")?;
    if phrase.trim().is_empty() {
        bail!("recovery phrase is empty");
    }
    Ok(SecretString::from(phrase))
}

pub fn private_key() -> Result<SecretString> {
    let key = rpassword::prompt_password("Private key (base58): ").context("reading private key")?;
    Ok(SecretString::from(key.trim().to_string()))
}
