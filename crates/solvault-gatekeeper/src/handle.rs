use std::future::Future;

use secrecy::SecretString;

use solvault_core::VaultResult;
use solvault_vault::Vault;

/// What the gatekeeper may ask of the vault. Keys and the session stay
/// behind this boundary; only public keys and signatures come back.
pub trait VaultHandle: Send + Sync {
    fn is_unlocked(&self) -> impl Future<Output = bool> + Send;

    /// When the password was last checked in the current session.
    fn last_auth_ms(&self) -> impl Future<Output = Option<u64>> + Send;

    /// Check the password, unlocking first if needed.
    fn reauthenticate(&self, password: &SecretString)
        -> impl Future<Output = VaultResult<()>> + Send;

    fn active_public_key(&self) -> impl Future<Output = VaultResult<String>> + Send;

    fn sign_transaction(&self, tx: &[u8]) -> impl Future<Output = VaultResult<Vec<u8>>> + Send;

    fn sign_all_transactions(
        &self,
        txs: &[Vec<u8>],
    ) -> impl Future<Output = VaultResult<Vec<Vec<u8>>>> + Send;

    fn sign_message(&self, message: &[u8]) -> impl Future<Output = VaultResult<Vec<u8>>> + Send;
}

impl VaultHandle for Vault {
    async fn is_unlocked(&self) -> bool {
        Vault::is_unlocked(self).await
    }

    async fn last_auth_ms(&self) -> Option<u64> {
        self.session_info().await.map(|s| s.last_auth_ms)
    }

    async fn reauthenticate(&self, password: &SecretString) -> VaultResult<()> {
        Vault::reauthenticate(self, password).await.map(drop)
    }

    async fn active_public_key(&self) -> VaultResult<String> {
        Vault::active_public_key(self).await
    }

    async fn sign_transaction(&self, tx: &[u8]) -> VaultResult<Vec<u8>> {
        Vault::sign_transaction(self, tx).await.map(|s| s.to_vec())
    }

    async fn sign_all_transactions(&self, txs: &[Vec<u8>]) -> VaultResult<Vec<Vec<u8>>> {
        let sigs = self.sign_all(txs).await?;
        Ok(sigs.iter().map(|s| s.to_vec()).collect())
    }

    async fn sign_message(&self, message: &[u8]) -> VaultResult<Vec<u8>> {
        Vault::sign_message(self, message).await.map(|s| s.to_vec())
    }
}
