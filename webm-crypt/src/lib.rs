//! Streaming encryption and decryption of WebM containers.
//!
//! The media payload of every frame is protected with AES-128-CTR following
//! the WebM/Matroska content-encryption convention used by encrypted-media
//! players: structural metadata passes through intact while each frame
//! payload is replaced by a self-describing encrypted framing (a signal
//! byte, the high half of the frame IV, then the ciphertext). Container
//! parsing and serialization are delegated to [`webm_iterable`]; this crate
//! owns the tag-level transform and the pipeline that applies it in a
//! single pass over a byte stream.

mod cipher;
mod error;
mod stream;
mod transform;

pub use error::CryptError;
pub use stream::WebmCryptor;
pub use transform::{Mode, TagCryptor};

/// A `Result` alias where the `Err` case is `webm_crypt::CryptError`.
pub type Result<T> = std::result::Result<T, CryptError>;
