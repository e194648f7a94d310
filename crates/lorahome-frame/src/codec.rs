use aes::{Aes128, Aes192, Aes256};
use bytes::Bytes;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{FrameError, Result};
use crate::key::FrameKey;

/// AES block size.
pub const BLOCK_SIZE: usize = 16;

/// IV size; the IV leads every frame.
pub const IV_SIZE: usize = BLOCK_SIZE;

/// Largest plaintext a frame can carry (one length byte).
pub const MAX_PAYLOAD: usize = u8::MAX as usize;

/// Smallest valid frame: IV plus one ciphertext block.
pub const MIN_FRAME_SIZE: usize = IV_SIZE + BLOCK_SIZE;

/// Round `len` up to the next multiple of the block size (`0` stays `0`).
pub fn align16(len: usize) -> usize {
    len.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

/// Seal `plaintext` into a self-describing frame.
///
/// Wire format:
/// ```text
/// ┌──────────┬──────────────────┬──────────────────────────────┐
/// │ Len (1B) │ Random (15B)     │ AES-CBC ciphertext (N × 16B) │
/// └──────────┴──────────────────┴──────────────────────────────┘
///  \________ IV (16B) ________/
/// ```
///
/// The plaintext is zero padded to the block size. An empty plaintext still
/// produces one ciphertext block so the frame satisfies [`MIN_FRAME_SIZE`].
pub fn seal(key: &FrameKey, plaintext: &[u8]) -> Result<Bytes> {
    if plaintext.len() > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: plaintext.len(),
            max: MAX_PAYLOAD,
        });
    }

    let body_len = align16(plaintext.len()).max(BLOCK_SIZE);
    let mut buf = vec![0u8; IV_SIZE + body_len];
    OsRng
        .try_fill_bytes(&mut buf[..IV_SIZE])
        .map_err(|err| FrameError::Entropy(err.to_string()))?;
    buf[0] = plaintext.len() as u8;

    let (iv, body) = buf.split_at_mut(IV_SIZE);
    body[..plaintext.len()].copy_from_slice(plaintext);
    encrypt_in_place(key, iv, body)?;

    Ok(Bytes::from(buf))
}

/// Open a frame produced by [`seal`] and return the original plaintext.
///
/// Padding after the declared length is discarded without validation.
pub fn open(key: &FrameKey, frame: &[u8]) -> Result<Vec<u8>> {
    if frame.len() < MIN_FRAME_SIZE {
        return Err(FrameError::FrameTooShort {
            len: frame.len(),
            min: MIN_FRAME_SIZE,
        });
    }
    if frame.len() % BLOCK_SIZE != 0 {
        return Err(FrameError::InvalidAlignment { len: frame.len() });
    }

    let (iv, ciphertext) = frame.split_at(IV_SIZE);
    let declared = iv[0] as usize;
    if declared > ciphertext.len() {
        return Err(FrameError::InvalidLength {
            declared,
            available: ciphertext.len(),
        });
    }

    let mut plaintext = ciphertext.to_vec();
    decrypt_in_place(key, iv, &mut plaintext)?;
    plaintext.truncate(declared);
    Ok(plaintext)
}

fn encrypt_in_place(key: &FrameKey, iv: &[u8], buf: &mut [u8]) -> Result<()> {
    match key.len() {
        16 => encrypt_with::<cbc::Encryptor<Aes128>>(key.as_bytes(), iv, buf),
        24 => encrypt_with::<cbc::Encryptor<Aes192>>(key.as_bytes(), iv, buf),
        32 => encrypt_with::<cbc::Encryptor<Aes256>>(key.as_bytes(), iv, buf),
        other => Err(FrameError::InvalidKeyLength(other)),
    }
}

fn decrypt_in_place(key: &FrameKey, iv: &[u8], buf: &mut [u8]) -> Result<()> {
    match key.len() {
        16 => decrypt_with::<cbc::Decryptor<Aes128>>(key.as_bytes(), iv, buf),
        24 => decrypt_with::<cbc::Decryptor<Aes192>>(key.as_bytes(), iv, buf),
        32 => decrypt_with::<cbc::Decryptor<Aes256>>(key.as_bytes(), iv, buf),
        other => Err(FrameError::InvalidKeyLength(other)),
    }
}

fn encrypt_with<C>(key: &[u8], iv: &[u8], buf: &mut [u8]) -> Result<()>
where
    C: KeyIvInit + BlockEncryptMut,
{
    let cipher = C::new_from_slices(key, iv).map_err(|_| FrameError::InvalidKeyLength(key.len()))?;
    let len = buf.len();
    cipher
        .encrypt_padded_mut::<NoPadding>(buf, len)
        .map_err(|_| FrameError::InvalidAlignment { len })?;
    Ok(())
}

fn decrypt_with<C>(key: &[u8], iv: &[u8], buf: &mut [u8]) -> Result<()>
where
    C: KeyIvInit + BlockDecryptMut,
{
    let cipher = C::new_from_slices(key, iv).map_err(|_| FrameError::InvalidKeyLength(key.len()))?;
    let len = buf.len();
    cipher
        .decrypt_padded_mut::<NoPadding>(buf)
        .map_err(|_| FrameError::InvalidAlignment { len })?;
    Ok(())
}
