//! solvault-ledger: Ledger Solana-app client
//!
//! [`SolanaApp`] speaks the app's APDU instruction set over any
//! [`Transport`]. [`hid::HidTransport`] provides one over a report-level
//! HID device.

pub mod apdu;
pub mod app;
pub mod hid;
pub mod status;
pub mod tlv;
pub mod transport;

pub use apdu::{serialize_path, Apdu, Ins};
pub use app::{AppConfiguration, SolanaApp};
pub use hid::{HidDevice, HidTransport};
pub use tlv::TlvWriter;
pub use transport::Transport;
