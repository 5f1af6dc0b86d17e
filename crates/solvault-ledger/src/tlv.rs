//! TLV encoding for trusted-name and dynamic-descriptor payloads.
//!
//! Lengths use the DER short/long form: one byte below 0x80, otherwise
//! `0x81 len` or `0x82 len_hi len_lo`.

/// Tag wrapping the signature appended to a dynamic descriptor.
pub const TAG_DESCRIPTOR_SIGNATURE: u8 = 0x08;

pub fn encode_length(len: usize) -> Vec<u8> {
    if len < 0x80 {
        vec![len as u8]
    } else if len <= 0xFF {
        vec![0x81, len as u8]
    } else {
        vec![0x82, (len >> 8) as u8, len as u8]
    }
}

/// Append-only TLV builder.
#[derive(Debug, Default, Clone)]
pub struct TlvWriter {
    buf: Vec<u8>,
}

impl TlvWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes(mut self, tag: u8, value: &[u8]) -> Self {
        self.buf.push(tag);
        self.buf.extend_from_slice(&encode_length(value.len()));
        self.buf.extend_from_slice(value);
        self
    }

    pub fn u8(self, tag: u8, value: u8) -> Self {
        self.bytes(tag, &[value])
    }

    pub fn u32(self, tag: u8, value: u32) -> Self {
        self.bytes(tag, &value.to_be_bytes())
    }

    pub fn str(self, tag: u8, value: &str) -> Self {
        self.bytes(tag, value.as_bytes())
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// `data ‖ TLV(0x08, signature)`
pub fn descriptor_payload(data: &[u8], signature: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    out.extend(
        TlvWriter::new()
            .bytes(TAG_DESCRIPTOR_SIGNATURE, signature)
            .finish(),
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_forms() {
        assert_eq!(encode_length(0x7f), vec![0x7f]);
        assert_eq!(encode_length(0x80), vec![0x81, 0x80]);
        assert_eq!(encode_length(0x1234), vec![0x82, 0x12, 0x34]);
    }

    #[test]
    fn test_writer() {
        let tlv = TlvWriter::new()
            .u8(0x01, 0x03)
            .u32(0x23, 101)
            .str(0x20, "dex")
            .finish();
        assert_eq!(
            tlv,
            vec![0x01, 1, 0x03, 0x23, 4, 0, 0, 0, 101, 0x20, 3, b'd', b'e', b'x']
        );
    }

    #[test]
    fn test_descriptor_payload() {
        let sig = [0xAA; 72];
        let payload = descriptor_payload(b"data", &sig);
        assert_eq!(&payload[..4], b"data");
        assert_eq!(payload[4], TAG_DESCRIPTOR_SIGNATURE);
        assert_eq!(payload[5], 72);
        assert_eq!(payload.len(), 4 + 2 + 72);
    }
}
