//! Solana-app client over any [`Transport`].

use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use solvault_core::{HardwareDescriptor, VaultError, VaultResult};
use solvault_crypto::keypair::{PUBLIC_KEY_SIZE, SIGNATURE_SIZE};
use solvault_crypto::{encode_public_key, DerivationPath};

use crate::apdu::{
    chunk, serialize_path, sign_payload, Ins, P1_CONFIRM, P1_NON_CONFIRM, P2_INIT,
    P2_USER_INPUT_ATA,
};
use crate::status::{split_response, SW_OK};
use crate::tlv::descriptor_payload;
use crate::transport::Transport;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// GET_VERSION response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AppConfiguration {
    pub blind_signing_enabled: bool,
    pub pubkey_display_mode: u8,
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl AppConfiguration {
    fn parse(body: &[u8]) -> VaultResult<Self> {
        let [blind, display, major, minor, patch, ..] = body else {
            return Err(VaultError::Transport(format!(
                "GET_VERSION: expected 5 bytes, got {}",
                body.len()
            )));
        };
        Ok(Self {
            blind_signing_enabled: *blind != 0,
            pubkey_display_mode: *display,
            major: *major,
            minor: *minor,
            patch: *patch,
        })
    }

    pub fn version(&self) -> String {
        format!("{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Solana-app instruction set. Instructions never interleave: `send` holds
/// the gate across every chunk of one instruction.
pub struct SolanaApp<T> {
    transport: T,
    gate: Mutex<()>,
    timeout: Duration,
}

impl<T: Transport> SolanaApp<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            gate: Mutex::new(()),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Per-APDU timeout; an expired exchange fails with `DeviceTimeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send one instruction, chunked, and return the final response body.
    pub async fn send(
        &self,
        ins: Ins,
        p1: u8,
        p2: u8,
        payload: &[u8],
        accept: &[u16],
    ) -> VaultResult<Vec<u8>> {
        let _gate = self.gate.lock().await;
        let apdus = chunk(ins, p1, p2, payload);
        debug!(ins = ?ins, chunks = apdus.len(), bytes = payload.len(), "sending instruction");

        let mut body = Vec::new();
        for apdu in apdus {
            let raw = tokio::time::timeout(self.timeout, self.transport.exchange(&apdu.to_bytes()))
                .await
                .map_err(|_| VaultError::DeviceTimeout)??;
            body = split_response(&raw, accept)?;
        }
        Ok(body)
    }

    pub async fn get_version(&self) -> VaultResult<AppConfiguration> {
        let body = self
            .send(Ins::GetVersion, P1_NON_CONFIRM, P2_INIT, &[], &[SW_OK])
            .await?;
        AppConfiguration::parse(&body)
    }

    /// Public key at `path`; `confirm` shows it on the device first.
    pub async fn get_address(
        &self,
        path: &DerivationPath,
        confirm: bool,
    ) -> VaultResult<[u8; PUBLIC_KEY_SIZE]> {
        let p1 = if confirm { P1_CONFIRM } else { P1_NON_CONFIRM };
        let body = self
            .send(Ins::GetAddress, p1, P2_INIT, &serialize_path(path.indices()), &[SW_OK])
            .await?;
        fixed(&body, "GET_ADDR")
    }

    /// Read the key at `path` and describe it for the vault.
    pub async fn descriptor(
        &self,
        name: &str,
        path: &DerivationPath,
        device_id: &str,
    ) -> VaultResult<HardwareDescriptor> {
        let public_key = encode_public_key(&self.get_address(path, false).await?);
        info!(path = %path, public_key = %public_key, "hardware account read");
        Ok(HardwareDescriptor {
            name: name.to_string(),
            public_key,
            path: path.to_string(),
            device_id: device_id.to_string(),
        })
    }

    /// Sign serialized transaction message bytes with the key at `path`.
    pub async fn sign_transaction(
        &self,
        path: &DerivationPath,
        tx: &[u8],
        user_input_ata: bool,
    ) -> VaultResult<[u8; SIGNATURE_SIZE]> {
        let p2 = if user_input_ata {
            P2_INIT | P2_USER_INPUT_ATA
        } else {
            P2_INIT
        };
        let body = self
            .send(Ins::Sign, P1_CONFIRM, p2, &sign_payload(path.indices(), tx), &[SW_OK])
            .await?;
        fixed(&body, "SIGN")
    }

    pub async fn sign_offchain_message(
        &self,
        path: &DerivationPath,
        message: &[u8],
    ) -> VaultResult<[u8; SIGNATURE_SIZE]> {
        let body = self
            .send(
                Ins::SignOffchain,
                P1_CONFIRM,
                P2_INIT,
                &sign_payload(path.indices(), message),
                &[SW_OK],
            )
            .await?;
        fixed(&body, "SIGN_OFFCHAIN")
    }

    /// Device challenge for trusted-name signing, hex encoded.
    pub async fn get_challenge(&self) -> VaultResult<String> {
        let body = self
            .send(Ins::GetChallenge, P1_NON_CONFIRM, P2_INIT, &[], &[SW_OK])
            .await?;
        let challenge: [u8; 4] = fixed(&body, "GET_CHALLENGE")?;
        Ok(hex::encode(challenge))
    }

    pub async fn provide_trusted_name(&self, tlv: &[u8]) -> VaultResult<()> {
        self.send(Ins::ProvideTrustedName, P1_NON_CONFIRM, P2_INIT, tlv, &[SW_OK])
            .await
            .map(drop)
    }

    pub async fn provide_trusted_descriptor(
        &self,
        data: &[u8],
        signature: &[u8],
    ) -> VaultResult<()> {
        let payload = descriptor_payload(data, signature);
        self.send(
            Ins::ProvideTrustedDescriptor,
            P1_NON_CONFIRM,
            P2_INIT,
            &payload,
            &[SW_OK],
        )
        .await
        .map(drop)
    }
}

fn fixed<const N: usize>(body: &[u8], what: &str) -> VaultResult<[u8; N]> {
    body.get(..N)
        .and_then(|b| <[u8; N]>::try_from(b).ok())
        .ok_or_else(|| {
            VaultError::Transport(format!("{what}: expected {N} bytes, got {}", body.len()))
        })
}
