use thiserror::Error;
use webm_iterable::errors::{TagIteratorError, TagWriterError};

/// The errors that can occur while encrypting or decrypting a WebM stream.
#[derive(Debug, Error)]
pub enum CryptError {
    /// Invalid key size (must be 16 bytes for AES-128).
    #[error("invalid key size: expected 16 bytes for AES-128, got {0} bytes")]
    InvalidKeySize(usize),

    /// The decoder could not read a tag from the source stream.
    #[error("webm decode error: {0}")]
    Decode(#[from] TagIteratorError),

    /// The encoder could not serialize a tag to the sink.
    #[error("webm encode error: {0}")]
    Encode(#[from] TagWriterError),
}
