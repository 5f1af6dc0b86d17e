pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{MnemonicError, VaultError, VaultResult};
pub use types::{DerivationScheme, HardwareDescriptor, WalletId};
