//! solvault-discovery: find the accounts of a recovery phrase that are in use

pub mod probe;
pub mod scanner;

pub use probe::BalanceProbe;
pub use scanner::{
    default_accounts, preselect, selection, sort_accounts, DiscoveredAccount, ScanOptions, Scanner,
};
