//! Solana-app APDU constants, command encoding and payload chunking

/// Class byte for every Solana-app command.
pub const CLA: u8 = 0xE0;

/// Largest payload carried by one APDU (`Lc` is a single byte).
pub const MAX_CHUNK: usize = 255;

pub const P1_NON_CONFIRM: u8 = 0x00;
pub const P1_CONFIRM: u8 = 0x01;

pub const P2_INIT: u8 = 0x00;
/// Set on every chunk after the first.
pub const P2_EXTEND: u8 = 0x01;
/// Set on every chunk except the last.
pub const P2_MORE: u8 = 0x02;
/// Ask the device to let the user confirm an associated token account.
pub const P2_USER_INPUT_ATA: u8 = 0x08;

/// Solana-app instruction codes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ins {
    GetVersion = 0x04,
    GetAddress = 0x05,
    Sign = 0x06,
    SignOffchain = 0x07,
    GetChallenge = 0x20,
    ProvideTrustedName = 0x21,
    ProvideTrustedDescriptor = 0x22,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Apdu {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
    pub data: Vec<u8>,
}

impl Apdu {
    /// `CLA INS P1 P2 Lc data`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(5 + self.data.len());
        out.extend_from_slice(&[self.cla, self.ins, self.p1, self.p2, self.data.len() as u8]);
        out.extend_from_slice(&self.data);
        out
    }
}

/// Split `payload` into APDUs of at most [`MAX_CHUNK`] bytes.
///
/// Every chunk replays `p1`. `p2` starts from the caller's base flags; all
/// but the last chunk add [`P2_MORE`] and all but the first add
/// [`P2_EXTEND`]. An empty payload still yields one command.
pub fn chunk(ins: Ins, p1: u8, p2: u8, payload: &[u8]) -> Vec<Apdu> {
    if payload.is_empty() {
        return vec![Apdu {
            cla: CLA,
            ins: ins as u8,
            p1,
            p2,
            data: Vec::new(),
        }];
    }

    let pieces: Vec<&[u8]> = payload.chunks(MAX_CHUNK).collect();
    let last = pieces.len() - 1;
    pieces
        .into_iter()
        .enumerate()
        .map(|(i, piece)| {
            let mut flags = p2;
            if i < last {
                flags |= P2_MORE;
            }
            if i > 0 {
                flags |= P2_EXTEND;
            }
            Apdu {
                cla: CLA,
                ins: ins as u8,
                p1,
                p2: flags,
                data: piece.to_vec(),
            }
        })
        .collect()
}

/// `[len:1] ‖ be32(index)…`
pub fn serialize_path(indices: &[u32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + 4 * indices.len());
    out.push(indices.len() as u8);
    for index in indices {
        out.extend_from_slice(&index.to_be_bytes());
    }
    out
}

/// Payload for SIGN and SIGN_OFFCHAIN: one signer path followed by the bytes.
pub fn sign_payload(indices: &[u32], body: &[u8]) -> Vec<u8> {
    let path = serialize_path(indices);
    let mut out = Vec::with_capacity(1 + path.len() + body.len());
    out.push(1);
    out.extend_from_slice(&path);
    out.extend_from_slice(body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: u32 = 0x8000_0000;

    #[test]
    fn test_serialize_path() {
        let bytes = serialize_path(&[44 | H, 501 | H, H]);
        assert_eq!(bytes.len(), 13);
        assert_eq!(bytes[0], 3);
        assert_eq!(&bytes[1..5], &[0x80, 0x00, 0x00, 0x2c]);
        assert_eq!(&bytes[5..9], &[0x80, 0x00, 0x01, 0xf5]);
    }

    #[test]
    fn test_single_chunk_keeps_base_flags() {
        let apdus = chunk(Ins::Sign, P1_CONFIRM, P2_USER_INPUT_ATA, &[0u8; 255]);
        assert_eq!(apdus.len(), 1);
        assert_eq!(apdus[0].p2, P2_USER_INPUT_ATA);
        assert_eq!(apdus[0].to_bytes()[4], 255);
    }

    #[test]
    fn test_chunk_flags_over_three_pieces() {
        let payload: Vec<u8> = (0..600u32).map(|i| i as u8).collect();
        let apdus = chunk(Ins::Sign, P1_CONFIRM, P2_INIT, &payload);

        let flags: Vec<u8> = apdus.iter().map(|a| a.p2).collect();
        assert_eq!(flags, [0x02, 0x03, 0x01]);
        assert!(apdus.iter().all(|a| a.p1 == P1_CONFIRM && a.cla == CLA));

        let sizes: Vec<usize> = apdus.iter().map(|a| a.data.len()).collect();
        assert_eq!(sizes, [255, 255, 90]);
        let joined: Vec<u8> = apdus.into_iter().flat_map(|a| a.data).collect();
        assert_eq!(joined, payload);
    }

    #[test]
    fn test_empty_payload_one_command() {
        let apdus = chunk(Ins::GetVersion, P1_NON_CONFIRM, P2_INIT, &[]);
        assert_eq!(apdus.len(), 1);
        assert_eq!(apdus[0].to_bytes(), vec![0xE0, 0x04, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_sign_payload_layout() {
        let p = sign_payload(&[44 | H, 501 | H], b"tx");
        assert_eq!(p[0], 1);
        assert_eq!(p[1], 2);
        assert_eq!(&p[p.len() - 2..], b"tx");
        assert_eq!(p.len(), 1 + 1 + 8 + 2);
    }
}
