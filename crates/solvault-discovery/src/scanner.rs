//! Account discovery.
//!
//! A sweep derives accounts `0..max_accounts` on one scheme and probes them
//! in batches of `max_empty`, stopping after `max_empty` consecutive empty
//! accounts. The standard sweep is kept whole; the legacy sweep contributes
//! only funded accounts.

use std::time::Duration;

use futures::future::join_all;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use solvault_core::config::DiscoveryConfig;
use solvault_core::{DerivationScheme, VaultError, VaultResult};
use solvault_crypto::{seed_to_keypair, DerivationPath, Mnemonic};

use crate::probe::BalanceProbe;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredAccount {
    pub scheme: DerivationScheme,
    pub index: u32,
    pub public_key: String,
    pub balance: u64,
    /// Pre-selected for import
    pub selected: bool,
}

impl DiscoveredAccount {
    pub fn is_funded(&self) -> bool {
        self.balance > 0
    }
}

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub max_accounts: u32,
    pub max_empty: u32,
    pub probe_timeout: Duration,
    pub max_preselected: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self::from_config(&DiscoveryConfig::default())
    }
}

impl ScanOptions {
    pub fn from_config(config: &DiscoveryConfig) -> Self {
        Self {
            max_accounts: config.max_accounts,
            max_empty: config.max_empty.max(1),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
            max_preselected: config.max_preselected,
        }
    }
}

pub struct Scanner<P> {
    probe: P,
    options: ScanOptions,
}

impl<P: BalanceProbe> Scanner<P> {
    pub fn new(probe: P, options: ScanOptions) -> Self {
        Self { probe, options }
    }

    /// Sweep both schemes and return the accounts in display order, funded
    /// ones pre-selected. Fails only with `Cancelled` or a derivation error
    /// on the standard path.
    pub async fn scan(
        &self,
        mnemonic: &Mnemonic,
        cancel: &CancellationToken,
    ) -> VaultResult<Vec<DiscoveredAccount>> {
        let seed = mnemonic.to_seed()?;

        let mut accounts = self
            .sweep(seed.as_slice(), DerivationScheme::Standard, cancel)
            .await?;

        match self
            .sweep(seed.as_slice(), DerivationScheme::Legacy, cancel)
            .await
        {
            Ok(legacy) => accounts.extend(legacy.into_iter().filter(DiscoveredAccount::is_funded)),
            Err(VaultError::Cancelled) => return Err(VaultError::Cancelled),
            Err(e) => debug!(error = %e, "legacy sweep unavailable; skipped"),
        }

        sort_accounts(&mut accounts);
        preselect(&mut accounts, self.options.max_preselected);

        info!(
            accounts = accounts.len(),
            funded = accounts.iter().filter(|a| a.is_funded()).count(),
            "discovery finished"
        );
        Ok(accounts)
    }

    async fn sweep(
        &self,
        seed: &[u8],
        scheme: DerivationScheme,
        cancel: &CancellationToken,
    ) -> VaultResult<Vec<DiscoveredAccount>> {
        let max_empty = self.options.max_empty;
        let mut found = Vec::new();
        let mut empty_run = 0;
        let mut start = 0;

        while start < self.options.max_accounts {
            if cancel.is_cancelled() {
                return Err(VaultError::Cancelled);
            }
            let end = start.saturating_add(max_empty).min(self.options.max_accounts);
            let keys = (start..end)
                .map(|index| derive_public_key(seed, scheme, index).map(|pk| (index, pk)))
                .collect::<VaultResult<Vec<_>>>()?;

            let probes = join_all(keys.iter().map(|(_, pk)| self.probe_one(pk)));
            let balances = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(VaultError::Cancelled),
                balances = probes => balances,
            };

            for ((index, public_key), balance) in keys.into_iter().zip(balances) {
                found.push(DiscoveredAccount {
                    scheme,
                    index,
                    public_key,
                    balance,
                    selected: false,
                });
                if balance == 0 {
                    empty_run += 1;
                    if empty_run >= max_empty {
                        debug!(%scheme, last = index, "sweep stopped on empty run");
                        return Ok(found);
                    }
                } else {
                    empty_run = 0;
                }
            }
            start = end;
        }
        Ok(found)
    }

    /// Failures and timeouts read as an empty account.
    async fn probe_one(&self, public_key: &str) -> u64 {
        match tokio::time::timeout(self.options.probe_timeout, self.probe.balance(public_key)).await
        {
            Ok(Ok(balance)) => balance,
            Ok(Err(e)) => {
                warn!(public_key, error = %e, "balance probe failed; counting as empty");
                0
            }
            Err(_) => {
                warn!(public_key, "balance probe timed out; counting as empty");
                0
            }
        }
    }
}

/// First `count` standard accounts, no probing.
pub fn default_accounts(mnemonic: &Mnemonic, count: u32) -> VaultResult<Vec<DiscoveredAccount>> {
    let seed = mnemonic.to_seed()?;
    (0..count)
        .map(|index| {
            Ok(DiscoveredAccount {
                scheme: DerivationScheme::Standard,
                index,
                public_key: derive_public_key(seed.as_slice(), DerivationScheme::Standard, index)?,
                balance: 0,
                selected: false,
            })
        })
        .collect()
}

/// `(scheme, index)` of every selected account, in order.
pub fn selection(accounts: &[DiscoveredAccount]) -> Vec<(DerivationScheme, u32)> {
    accounts
        .iter()
        .filter(|a| a.selected)
        .map(|a| (a.scheme, a.index))
        .collect()
}

/// Funded first, then standard before legacy, then by index.
pub fn sort_accounts(accounts: &mut [DiscoveredAccount]) {
    accounts.sort_by_key(|a| (!a.is_funded(), a.scheme != DerivationScheme::Standard, a.index));
}

/// Select the first `limit` funded accounts; clear the rest.
pub fn preselect(accounts: &mut [DiscoveredAccount], limit: usize) {
    let mut left = limit;
    for account in accounts.iter_mut() {
        account.selected = account.is_funded() && left > 0;
        if account.selected {
            left -= 1;
        }
    }
}

fn derive_public_key(seed: &[u8], scheme: DerivationScheme, index: u32) -> VaultResult<String> {
    let path = DerivationPath::for_scheme(scheme, index);
    Ok(seed_to_keypair(seed, &path)?.public_key_base58())
}
