//! Ledger HID framing.
//!
//! An APDU travels as 64-byte reports: `channel:2 ‖ tag:1 ‖ seq:2`, the
//! first report adding a 2-byte total length, the rest zero-padded. Responses
//! come back in the same framing.

use std::sync::Arc;

use solvault_core::{VaultError, VaultResult};
use tracing::trace;

use crate::transport::Transport;

pub const REPORT_SIZE: usize = 64;
pub const CHANNEL: u16 = 0x0101;
pub const TAG_APDU: u8 = 0x05;

const HEADER: usize = 5;
const FIRST_HEADER: usize = HEADER + 2;

/// Report-level device access. Implementations block.
pub trait HidDevice: Send + Sync + 'static {
    fn write(&self, report: &[u8; REPORT_SIZE]) -> VaultResult<()>;
    /// Read one report, or `DeviceTimeout` after `timeout_ms`.
    fn read(&self, timeout_ms: u64) -> VaultResult<[u8; REPORT_SIZE]>;
}

/// Frame `apdu` into reports.
pub fn wrap(channel: u16, apdu: &[u8]) -> VaultResult<Vec<[u8; REPORT_SIZE]>> {
    let total = u16::try_from(apdu.len())
        .map_err(|_| VaultError::Transport(format!("apdu too large: {} bytes", apdu.len())))?;

    let mut reports = Vec::new();
    let mut rest = apdu;
    let mut seq: u16 = 0;
    loop {
        let mut report = [0u8; REPORT_SIZE];
        report[0..2].copy_from_slice(&channel.to_be_bytes());
        report[2] = TAG_APDU;
        report[3..5].copy_from_slice(&seq.to_be_bytes());

        let start = if seq == 0 {
            report[5..7].copy_from_slice(&total.to_be_bytes());
            FIRST_HEADER
        } else {
            HEADER
        };
        let take = rest.len().min(REPORT_SIZE - start);
        report[start..start + take].copy_from_slice(&rest[..take]);
        rest = &rest[take..];
        reports.push(report);

        if rest.is_empty() {
            return Ok(reports);
        }
        seq = seq.wrapping_add(1);
    }
}

/// Reassembles a response from its reports.
#[derive(Debug)]
pub struct Reassembler {
    channel: u16,
    seq: u16,
    expected: Option<usize>,
    buf: Vec<u8>,
}

impl Reassembler {
    pub fn new(channel: u16) -> Self {
        Self {
            channel,
            seq: 0,
            expected: None,
            buf: Vec::new(),
        }
    }

    /// Feed one report; returns the full response once complete.
    pub fn push(&mut self, report: &[u8]) -> VaultResult<Option<Vec<u8>>> {
        if report.len() < HEADER {
            return Err(VaultError::Transport("hid report too short".into()));
        }
        let channel = u16::from_be_bytes([report[0], report[1]]);
        let seq = u16::from_be_bytes([report[3], report[4]]);
        if channel != self.channel || report[2] != TAG_APDU {
            return Err(VaultError::Transport(format!(
                "unexpected hid header: channel {channel:#06x} tag {:#04x}",
                report[2]
            )));
        }
        if seq != self.seq {
            return Err(VaultError::Transport(format!(
                "hid sequence {seq}, expected {}",
                self.seq
            )));
        }

        let data = match self.expected {
            None => {
                if report.len() < FIRST_HEADER {
                    return Err(VaultError::Transport("hid report too short".into()));
                }
                self.expected = Some(u16::from_be_bytes([report[5], report[6]]) as usize);
                &report[FIRST_HEADER..]
            }
            Some(_) => &report[HEADER..],
        };
        self.seq = self.seq.wrapping_add(1);

        let expected = self.expected.unwrap_or_default();
        let take = (expected - self.buf.len()).min(data.len());
        self.buf.extend_from_slice(&data[..take]);

        if self.buf.len() == expected {
            Ok(Some(std::mem::take(&mut self.buf)))
        } else {
            Ok(None)
        }
    }
}

/// [`Transport`] over a blocking HID device.
pub struct HidTransport<D> {
    device: Arc<D>,
    read_timeout_ms: u64,
}

impl<D: HidDevice> HidTransport<D> {
    pub fn new(device: D, read_timeout_ms: u64) -> Self {
        Self {
            device: Arc::new(device),
            read_timeout_ms,
        }
    }
}

impl<D: HidDevice> Transport for HidTransport<D> {
    async fn exchange(&self, apdu: &[u8]) -> VaultResult<Vec<u8>> {
        let reports = wrap(CHANNEL, apdu)?;
        let device = self.device.clone();
        let timeout_ms = self.read_timeout_ms;

        tokio::task::spawn_blocking(move || -> VaultResult<Vec<u8>> {
            for report in &reports {
                device.write(report)?;
            }
            trace!(reports = reports.len(), "apdu written");

            let mut reader = Reassembler::new(CHANNEL);
            loop {
                let report = device.read(timeout_ms)?;
                if let Some(response) = reader.push(&report)? {
                    return Ok(response);
                }
            }
        })
        .await
        .map_err(|e| anyhow::anyhow!("hid worker failed: {e}"))?
    }
}
