use std::future::Future;

use solvault_core::VaultResult;

/// Byte-level device link: one encoded APDU in, raw response (body plus
/// two-byte status word) out.
pub trait Transport: Send + Sync {
    fn exchange(&self, apdu: &[u8]) -> impl Future<Output = VaultResult<Vec<u8>>> + Send;
}

impl<T: Transport> Transport for std::sync::Arc<T> {
    fn exchange(&self, apdu: &[u8]) -> impl Future<Output = VaultResult<Vec<u8>>> + Send {
        (**self).exchange(apdu)
    }
}
