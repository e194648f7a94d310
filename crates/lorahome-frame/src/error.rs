/// Errors that can occur while sealing or opening frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The plaintext does not fit the one-byte length field.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The frame cannot hold an IV plus one ciphertext block.
    #[error("frame too short ({len} bytes, min {min})")]
    FrameTooShort { len: usize, min: usize },

    /// The frame is not a whole number of cipher blocks.
    #[error("frame length {len} is not a multiple of the block size")]
    InvalidAlignment { len: usize },

    /// The length byte in the IV points past the ciphertext.
    #[error("declared payload length {declared} exceeds ciphertext length {available}")]
    InvalidLength { declared: usize, available: usize },

    /// The packet is shorter than the routing header.
    #[error("routing header too short ({len} bytes, need {need})")]
    HeaderTooShort { len: usize, need: usize },

    /// The key is not a valid AES key length.
    #[error("invalid key length {0} (expected 16, 24 or 32 bytes)")]
    InvalidKeyLength(usize),

    /// The key is not valid hex.
    #[error("invalid key hex: {0}")]
    InvalidKeyHex(#[from] hex::FromHexError),

    /// The system random source failed.
    #[error("random source failed: {0}")]
    Entropy(String),
}

pub type Result<T> = std::result::Result<T, FrameError>;
