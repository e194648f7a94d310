//! Frame sealing and routing envelopes for LoRa device telemetry.
//!
//! Every packet exchanged with a field device is a routing envelope:
//! - An 8-byte little-endian device id
//! - A 16-byte IV whose first byte carries the plaintext length
//! - AES-CBC ciphertext of the zero-padded plaintext
//!
//! The codec never inspects plaintext; device handlers decode it.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod key;

pub use codec::{align16, open, seal, BLOCK_SIZE, IV_SIZE, MAX_PAYLOAD, MIN_FRAME_SIZE};
pub use envelope::{encode_envelope, parse_envelope, seal_envelope, Envelope, DEVICE_ID_SIZE};
pub use error::{FrameError, Result};
pub use key::FrameKey;
