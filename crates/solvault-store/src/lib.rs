//! solvault-store: the single serialized storage facade
//!
//! Every persisted record (auth, wallet blob, rate-limit state, connected
//! sites, settings) goes through one [`Store`]. Writes are serialized by an
//! async mutex; multi-key updates go through [`Store::commit`] so a crash
//! never leaves half of a batch applied.

pub mod keys;
pub mod settings;
pub mod store;

pub use settings::{ActivityTracker, AutoLock};
pub use store::{Batch, Store};
