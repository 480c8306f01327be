use std::io::{Read, Write};

use webm_iterable::{
    WebmIterator, WebmWriter, WriteOptions,
    matroska_spec::{Master, MatroskaSpec},
};

use crate::{
    CryptError, Result,
    transform::{Mode, TagCryptor},
};

/// Single-pass encryption/decryption pipeline over a WebM byte stream.
///
/// Composes [decoder] → [`TagCryptor`] → [encoder] as one pull loop: the
/// source feeds the decoder and the sink receives the encoder's output,
/// so the caller only ever connects the two ends. The key is validated
/// here as well as by the transform itself, before a single byte of the
/// source is consumed.
pub struct WebmCryptor {
    mode: Mode,
    key: [u8; 16],
}

impl WebmCryptor {
    /// Creates a pipeline. `key` must be exactly 16 bytes.
    pub fn new(mode: Mode, key: &[u8]) -> Result<Self> {
        if key.len() != 16 {
            return Err(CryptError::InvalidKeySize(key.len()));
        }

        let mut fixed = [0u8; 16];
        fixed.copy_from_slice(key);
        Ok(Self { mode, key: fixed })
    }

    /// Streams `source` through the transform into `sink`.
    ///
    /// The decoder buffers whole `TrackEntry` subtrees while encrypting
    /// (the declaration is edited as one tree) and whole
    /// `ContentEncodings` subtrees while decrypting (the step list is
    /// filtered in one pass). Everything else streams tag by tag.
    pub fn process<R: Read, W: Write>(&self, source: R, sink: W) -> Result<()> {
        let buffer: &[MatroskaSpec] = match self.mode {
            Mode::Encrypt => &[MatroskaSpec::TrackEntry(Master::Start)],
            Mode::Decrypt => &[MatroskaSpec::ContentEncodings(Master::Start)],
        };

        let mut cryptor = TagCryptor::new(self.mode, &self.key)?;
        let mut writer = WebmWriter::new(sink);

        for tag in WebmIterator::new(source, buffer) {
            let Some(tag) = cryptor.transform(tag?) else {
                continue;
            };

            match &tag {
                // Frame sizes change under the transform and a single pass
                // cannot buffer the stream to backfill lengths, so the
                // long-lived containers are emitted unknown-sized.
                MatroskaSpec::Segment(Master::Start) | MatroskaSpec::Cluster(Master::Start) => {
                    writer.write_advanced(&tag, WriteOptions::is_unknown_sized_element())?;
                }
                _ => writer.write(&tag)?,
            }
        }

        writer.flush()?;
        Ok(())
    }
}
