use std::fmt;

use crate::error::{FrameError, Result};

/// A symmetric AES key (128, 192 or 256 bit).
///
/// The length is validated once at construction so sealing and opening
/// never have to deal with a malformed key.
#[derive(Clone, PartialEq, Eq)]
pub struct FrameKey {
    bytes: Vec<u8>,
}

impl FrameKey {
    /// Valid AES key lengths in bytes.
    pub const VALID_LENGTHS: [usize; 3] = [16, 24, 32];

    /// Create a key from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        let bytes = bytes.into();
        if !Self::VALID_LENGTHS.contains(&bytes.len()) {
            return Err(FrameError::InvalidKeyLength(bytes.len()));
        }
        Ok(Self { bytes })
    }

    /// Decode a key from its hex form, as found in device configuration.
    pub fn from_hex(input: &str) -> Result<Self> {
        Self::new(hex::decode(input.trim())?)
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Key length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Always false; an empty key cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Hex encoding of the key.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

impl fmt::Debug for FrameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameKey")
            .field("bits", &(self.bytes.len() * 8))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_aes_key_lengths() {
        for len in FrameKey::VALID_LENGTHS {
            let key = FrameKey::new(vec![7u8; len]).unwrap();
            assert_eq!(key.len(), len);
        }
    }

    #[test]
    fn rejects_other_lengths() {
        for len in [0usize, 1, 15, 17, 31, 33, 64] {
            let err = FrameKey::new(vec![0u8; len]).unwrap_err();
            assert!(matches!(err, FrameError::InvalidKeyLength(n) if n == len));
        }
    }

    #[test]
    fn decodes_hex() {
        let key = FrameKey::from_hex("11111111111111111111111111111111").unwrap();
        assert_eq!(key.as_bytes(), &[0x11; 16]);
        assert_eq!(key.to_hex(), "11111111111111111111111111111111");
    }

    #[test]
    fn rejects_bad_hex() {
        let err = FrameKey::from_hex("zz111111111111111111111111111111").unwrap_err();
        assert!(matches!(err, FrameError::InvalidKeyHex(_)));
    }

    #[test]
    fn debug_does_not_leak_key_material() {
        let key = FrameKey::new(vec![0xAB; 16]).unwrap();
        let rendered = format!("{key:?}");
        assert!(rendered.contains("128"));
        assert!(!rendered.to_lowercase().contains("ab"));
    }
}
