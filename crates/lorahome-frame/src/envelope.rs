use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::seal;
use crate::error::{FrameError, Result};
use crate::key::FrameKey;

/// Routing header: little-endian device id.
pub const DEVICE_ID_SIZE: usize = 8;

/// A routing envelope split into its device id and still-sealed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope<'a> {
    /// The addressed device.
    pub device_id: u64,
    /// The sealed frame that follows the header.
    pub frame: &'a [u8],
}

/// Encode a routing envelope into `dst`.
///
/// Wire format:
/// ```text
/// ┌────────────────┬────────────────────────┐
/// │ Device id (8B) │ Frame (IV + N × 16B)   │
/// │ little-endian  │                        │
/// └────────────────┴────────────────────────┘
/// ```
pub fn encode_envelope(device_id: u64, frame: &[u8], dst: &mut BytesMut) {
    dst.reserve(DEVICE_ID_SIZE + frame.len());
    dst.put_u64_le(device_id);
    dst.put_slice(frame);
}

/// Split a packet into device id and frame bytes.
pub fn parse_envelope(packet: &[u8]) -> Result<Envelope<'_>> {
    if packet.len() < DEVICE_ID_SIZE {
        return Err(FrameError::HeaderTooShort {
            len: packet.len(),
            need: DEVICE_ID_SIZE,
        });
    }
    let (header, frame) = packet.split_at(DEVICE_ID_SIZE);
    let mut id = [0u8; DEVICE_ID_SIZE];
    id.copy_from_slice(header);
    Ok(Envelope {
        device_id: u64::from_le_bytes(id),
        frame,
    })
}

/// Seal `plaintext` with `key` and wrap it in a routing envelope for `device_id`.
pub fn seal_envelope(device_id: u64, key: &FrameKey, plaintext: &[u8]) -> Result<Bytes> {
    let frame = seal(key, plaintext)?;
    let mut buf = BytesMut::with_capacity(DEVICE_ID_SIZE + frame.len());
    encode_envelope(device_id, &frame, &mut buf);
    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::open;

    #[test]
    fn test_parse_device_id() {
        let cases: [(u64, [u8; 8]); 3] = [
            (0x3531383105473831, [0x31, 0x38, 0x47, 0x05, 0x31, 0x38, 0x31, 0x35]),
            (0x0, [0x00; 8]),
            (0xFF00000000000000, [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF]),
        ];
        for (id, packet) in cases {
            let envelope = parse_envelope(&packet).unwrap();
            assert_eq!(envelope.device_id, id);
            assert!(envelope.frame.is_empty());
        }
    }

    #[test]
    fn test_parse_strips_header() {
        let packet = [0x34, 0x12, 0, 0, 0, 0, 0, 0, 0x00, 0x01, 0x02, 0x03];
        let envelope = parse_envelope(&packet).unwrap();
        assert_eq!(envelope.device_id, 0x1234);
        assert_eq!(envelope.frame, &[0x00, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_parse_header_too_short() {
        let err = parse_envelope(&[0u8; 7]).unwrap_err();
        assert!(matches!(err, FrameError::HeaderTooShort { len: 7, need: 8 }));
    }

    #[test]
    fn test_seal_envelope_opens_with_same_key() {
        let key = FrameKey::new(vec![1u8; 16]).unwrap();
        let packet = seal_envelope(0xAABBCCDD, &key, b"on").unwrap();

        assert_eq!(&packet[..8], &0xAABBCCDDu64.to_le_bytes());
        let envelope = parse_envelope(&packet).unwrap();
        assert_eq!(open(&key, envelope.frame).unwrap(), b"on");
    }
}
