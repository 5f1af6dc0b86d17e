//! solvault-gatekeeper: mediates dApp access to the vault
//!
//! Origins must be connected (with user consent) before anything else is
//! allowed. Signing requests pass through a single pending-request slot and,
//! by default, a fresh password check.

pub mod gatekeeper;
pub mod handle;
pub mod request;
pub mod sites;

pub use gatekeeper::{Gatekeeper, GatekeeperOptions};
pub use handle::VaultHandle;
pub use request::{Method, Notification, Outcome, PendingRequest, Response};
pub use sites::{ConnectedSite, SiteRegistry};
