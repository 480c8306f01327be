use aes::{
    Aes128,
    cipher::{KeyIvInit, StreamCipher, generic_array::GenericArray},
};

use crate::{CryptError, Result};

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

/// AES-128-CTR keystream over a single frame payload.
///
/// A fresh cipher instance is keyed for every frame: the IV carries all
/// per-frame state, so no keystream position survives between frames.
pub(crate) struct FrameCipher {
    key: [u8; 16],
}

impl FrameCipher {
    pub(crate) fn new(key: &[u8]) -> Result<Self> {
        if key.len() != 16 {
            return Err(CryptError::InvalidKeySize(key.len()));
        }

        let mut fixed = [0u8; 16];
        fixed.copy_from_slice(key);
        Ok(Self { key: fixed })
    }

    /// Encrypts or decrypts `data` in place. CTR mode is its own inverse,
    /// so the same call serves both directions.
    pub(crate) fn apply(&self, iv: &[u8; 16], data: &mut [u8]) {
        let mut cipher = Aes128Ctr::new(
            GenericArray::from_slice(&self.key),
            GenericArray::from_slice(iv),
        );
        cipher.apply_keystream(data);
    }
}

/// Builds the 16-byte frame IV: the counter value big-endian in the high
/// 8 bytes, zero in the low 8 bytes.
pub(crate) fn iv_from_counter(counter: u64) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..8].copy_from_slice(&counter.to_be_bytes());
    iv
}
