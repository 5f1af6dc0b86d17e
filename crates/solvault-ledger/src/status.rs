//! Status-word handling

use solvault_core::{VaultError, VaultResult};
use tracing::warn;

pub const SW_OK: u16 = 0x9000;
pub const SW_BLIND_SIGNING_REQUIRED: u16 = 0x6808;

/// Split a raw response into body and status word, failing on any status
/// not listed in `accept`.
pub fn split_response(raw: &[u8], accept: &[u16]) -> VaultResult<Vec<u8>> {
    if raw.len() < 2 {
        return Err(VaultError::Transport(format!(
            "response too short: {} bytes",
            raw.len()
        )));
    }
    let (body, sw) = raw.split_at(raw.len() - 2);
    check_status(u16::from_be_bytes([sw[0], sw[1]]), accept)?;
    Ok(body.to_vec())
}

pub fn check_status(sw: u16, accept: &[u16]) -> VaultResult<()> {
    if accept.contains(&sw) {
        return Ok(());
    }
    match sw {
        SW_BLIND_SIGNING_REQUIRED => {
            warn!("device refused: blind signing disabled");
            Err(VaultError::BlindSigningRequired)
        }
        other => Err(VaultError::DeviceError(other)),
    }
}
