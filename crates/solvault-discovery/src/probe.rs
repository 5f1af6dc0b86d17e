use std::future::Future;

use solvault_core::VaultResult;

/// Balance lookup used to decide which derived accounts are in use.
/// Implemented outside the core by whatever RPC client the caller has.
pub trait BalanceProbe: Send + Sync {
    /// Lamports held by `public_key` (base58).
    fn balance(&self, public_key: &str) -> impl Future<Output = VaultResult<u64>> + Send;
}

impl<P: BalanceProbe> BalanceProbe for std::sync::Arc<P> {
    fn balance(&self, public_key: &str) -> impl Future<Output = VaultResult<u64>> + Send {
        (**self).balance(public_key)
    }
}
