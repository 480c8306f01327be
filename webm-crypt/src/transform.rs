use std::collections::HashMap;

use rand::{RngCore, rngs::OsRng};
use webm_iterable::matroska_spec::{Master, MatroskaSpec, SimpleBlock};

use crate::{
    Result,
    cipher::{FrameCipher, iv_from_counter},
};

/// Direction of the tag transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Encrypt,
    Decrypt,
}

/// Tag-level transform applying WebM content encryption.
///
/// Consumes tags in document order and, for each one, passes it through
/// unchanged, rewrites it, or removes it from the output sequence. While
/// encrypting it owns a per-track IV counter map: every frame on a track
/// advances that track's counter exactly once, which is what guarantees
/// that no two frames on a track share an IV. One instance serves exactly
/// one stream and cannot be restarted.
pub struct TagCryptor {
    mode: Mode,
    cipher: FrameCipher,
    track_counters: HashMap<u64, u64>,
}

impl TagCryptor {
    /// Creates a transform for one stream. `key` must be exactly 16 bytes.
    pub fn new(mode: Mode, key: &[u8]) -> Result<Self> {
        Ok(Self {
            mode,
            cipher: FrameCipher::new(key)?,
            track_counters: HashMap::new(),
        })
    }

    /// Processes one tag. Returns `None` when the tag is removed from the
    /// output sequence.
    pub fn transform(&mut self, tag: MatroskaSpec) -> Option<MatroskaSpec> {
        match self.mode {
            Mode::Encrypt => Some(self.encrypt_tag(tag)),
            Mode::Decrypt => self.decrypt_tag(tag),
        }
    }

    fn encrypt_tag(&mut self, tag: MatroskaSpec) -> MatroskaSpec {
        match tag {
            MatroskaSpec::SimpleBlock(_) => self.encrypt_block(tag),
            // Track declarations arrive as buffered trees; each one gets an
            // encryption step declared before it is serialized.
            MatroskaSpec::TrackEntry(Master::Full(children)) => {
                MatroskaSpec::TrackEntry(Master::Full(declare_encryption(children)))
            }
            other => other,
        }
    }

    fn decrypt_tag(&mut self, tag: MatroskaSpec) -> Option<MatroskaSpec> {
        match tag {
            MatroskaSpec::SimpleBlock(_) => Some(self.decrypt_block(tag)),
            MatroskaSpec::ContentEncodings(Master::Full(children)) => strip_encryption(children)
                .map(|kept| MatroskaSpec::ContentEncodings(Master::Full(kept))),
            other => Some(other),
        }
    }

    /// Wraps a frame payload as `0x01 | IV high half | ciphertext`.
    fn encrypt_block(&mut self, tag: MatroskaSpec) -> MatroskaSpec {
        let rebuilt = match SimpleBlock::try_from(&tag) {
            Ok(block) => {
                let counter = self
                    .track_counters
                    .entry(block.track)
                    .or_insert_with(|| OsRng.next_u64());
                let iv = iv_from_counter(*counter);
                *counter = counter.wrapping_add(1);

                let frame = block.raw_frame_data();
                let mut payload = Vec::with_capacity(frame.len() + 9);
                payload.push(0x01);
                payload.extend_from_slice(&iv[..8]);
                payload.extend_from_slice(frame);
                self.cipher.apply(&iv, &mut payload[9..]);

                Some(rebuild_block(&block, &payload))
            }
            Err(_) => None,
        };

        rebuilt.unwrap_or(tag)
    }

    /// Unwraps a `0x01`-signalled frame back to its plaintext payload.
    /// Frames without the signal byte are already plaintext and pass
    /// through untouched, as does anything with unreadable framing.
    fn decrypt_block(&self, tag: MatroskaSpec) -> MatroskaSpec {
        let rebuilt = match SimpleBlock::try_from(&tag) {
            Ok(block) => {
                let frame = block.raw_frame_data();
                if frame.first() != Some(&0x01) || frame.len() < 9 {
                    None
                } else {
                    let mut iv = [0u8; 16];
                    iv[..8].copy_from_slice(&frame[1..9]);

                    let mut payload = frame[9..].to_vec();
                    self.cipher.apply(&iv, &mut payload);

                    Some(rebuild_block(&block, &payload))
                }
            }
            Err(_) => None,
        };

        rebuilt.unwrap_or(tag)
    }
}

fn rebuild_block(block: &SimpleBlock, payload: &[u8]) -> MatroskaSpec {
    SimpleBlock::new_uncheked(
        payload,
        block.track,
        block.timestamp,
        block.invisible,
        block.lacing.clone(),
        block.discardable,
        block.keyframe,
    )
    .into()
}

/// Locates the track's content-encodings declaration, creating it when
/// absent, and appends one freshly labelled encryption step.
fn declare_encryption(mut children: Vec<MatroskaSpec>) -> Vec<MatroskaSpec> {
    let mut key_id = vec![0u8; 16];
    OsRng.fill_bytes(&mut key_id);
    let step = encryption_step(key_id);

    let encodings = children.iter_mut().find_map(|child| match child {
        MatroskaSpec::ContentEncodings(Master::Full(entries)) => Some(entries),
        _ => None,
    });

    match encodings {
        Some(entries) => entries.push(step),
        None => children.push(MatroskaSpec::ContentEncodings(Master::Full(vec![step]))),
    }

    children
}

/// One encryption-step entry: frame-scope AES in counter mode. The key id
/// is a metadata label only; actual keying stays with the caller's key.
fn encryption_step(key_id: Vec<u8>) -> MatroskaSpec {
    MatroskaSpec::ContentEncoding(Master::Full(vec![
        MatroskaSpec::ContentEncodingOrder(0),
        MatroskaSpec::ContentEncodingScope(1),
        MatroskaSpec::ContentEncodingType(1),
        MatroskaSpec::ContentEncryption(Master::Full(vec![
            MatroskaSpec::ContentEncAlgo(5),
            MatroskaSpec::ContentEncKeyID(key_id),
            MatroskaSpec::ContentEncAESSettings(Master::Full(vec![
                MatroskaSpec::AESSettingsCipherMode(1),
            ])),
        ])),
    ]))
}

/// Keeps only encoding steps that declare a non-encryption type. Returns
/// `None` when nothing remains: an emptied declaration is meaningless to
/// downstream consumers and must not be re-serialized.
fn strip_encryption(children: Vec<MatroskaSpec>) -> Option<Vec<MatroskaSpec>> {
    let kept: Vec<MatroskaSpec> = children
        .into_iter()
        .filter(|child| match child {
            MatroskaSpec::ContentEncoding(Master::Full(fields)) => {
                let encoding_type = fields.iter().find_map(|field| match field {
                    MatroskaSpec::ContentEncodingType(value) => Some(*value),
                    _ => None,
                });
                matches!(encoding_type, Some(value) if value != 1)
            }
            _ => false,
        })
        .collect();

    if kept.is_empty() { None } else { Some(kept) }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 16] = [
        0x10, 0x0b, 0x6c, 0x20, 0x94, 0x0f, 0x77, 0x9a, 0x45, 0x89, 0x15, 0x2b, 0x57, 0xd2, 0xda,
        0xcb,
    ];

    fn simple_block(track: u64, payload: &[u8]) -> MatroskaSpec {
        SimpleBlock::new_uncheked(payload, track, 0, false, None, false, true).into()
    }

    fn frame_data(tag: &MatroskaSpec) -> (u64, Vec<u8>) {
        let block = SimpleBlock::try_from(tag).unwrap();
        (block.track, block.raw_frame_data().to_vec())
    }

    fn iv_high_half(payload: &[u8]) -> u64 {
        u64::from_be_bytes(payload[1..9].try_into().unwrap())
    }

    #[test]
    fn test_rejects_short_key() {
        assert!(matches!(
            TagCryptor::new(Mode::Encrypt, &[0u8; 15]),
            Err(crate::CryptError::InvalidKeySize(15))
        ));
    }

    #[test]
    fn test_encrypted_frame_framing() {
        let mut cryptor = TagCryptor::new(Mode::Encrypt, &KEY).unwrap();

        let tag = cryptor.transform(simple_block(1, &[0xAA; 24])).unwrap();
        let (track, payload) = frame_data(&tag);

        assert_eq!(1, track);
        assert_eq!(24 + 9, payload.len());
        assert_eq!(0x01, payload[0]);
    }

    #[test]
    fn test_per_track_iv_sequences() {
        let mut cryptor = TagCryptor::new(Mode::Encrypt, &KEY).unwrap();
        let mut payloads = Vec::new();

        for _ in 0..3 {
            for track in [1u64, 2] {
                let tag = cryptor.transform(simple_block(track, &[0xAA, 0xAA])).unwrap();
                payloads.push(frame_data(&tag));
            }
        }

        assert_eq!(6, payloads.len());

        for (_, payload) in &payloads {
            assert_eq!(11, payload.len());
            assert_eq!(0x01, payload[0]);
        }

        for track in [1u64, 2] {
            let ivs: Vec<u64> = payloads
                .iter()
                .filter(|(t, _)| *t == track)
                .map(|(_, p)| iv_high_half(p))
                .collect();
            assert_eq!(3, ivs.len());
            assert_eq!(ivs[0].wrapping_add(1), ivs[1]);
            assert_eq!(ivs[1].wrapping_add(1), ivs[2]);
        }

        let track1: Vec<u64> = payloads
            .iter()
            .filter(|(t, _)| *t == 1)
            .map(|(_, p)| iv_high_half(p))
            .collect();
        for (track, payload) in &payloads {
            if *track == 2 {
                assert!(!track1.contains(&iv_high_half(payload)));
            }
        }
    }

    #[test]
    fn test_round_trip_restores_payload() {
        let mut encryptor = TagCryptor::new(Mode::Encrypt, &KEY).unwrap();
        let mut decryptor = TagCryptor::new(Mode::Decrypt, &KEY).unwrap();

        let original = b"not sixteen byte aligned payload!".to_vec();
        let encrypted = encryptor.transform(simple_block(1, &original)).unwrap();
        assert_ne!(original, frame_data(&encrypted).1);

        let decrypted = decryptor.transform(encrypted).unwrap();
        assert_eq!(original, frame_data(&decrypted).1);
    }

    #[test]
    fn test_decrypt_passes_plaintext_frames_through() {
        let mut cryptor = TagCryptor::new(Mode::Decrypt, &KEY).unwrap();

        let tag = cryptor.transform(simple_block(3, &[0x42, 0xAA, 0xBB])).unwrap();
        let (track, payload) = frame_data(&tag);

        assert_eq!(3, track);
        assert_eq!(vec![0x42, 0xAA, 0xBB], payload);
    }

    #[test]
    fn test_decrypt_tolerates_truncated_framing() {
        let mut cryptor = TagCryptor::new(Mode::Decrypt, &KEY).unwrap();

        let tag = cryptor.transform(simple_block(1, &[0x01, 0x02])).unwrap();
        assert_eq!(vec![0x01, 0x02], frame_data(&tag).1);
    }

    #[test]
    fn test_track_entry_gains_encryption_step() {
        let mut cryptor = TagCryptor::new(Mode::Encrypt, &KEY).unwrap();

        let tag = cryptor
            .transform(MatroskaSpec::TrackEntry(Master::Full(vec![
                MatroskaSpec::TrackNumber(1),
            ])))
            .unwrap();

        let MatroskaSpec::TrackEntry(Master::Full(children)) = tag else {
            panic!("track entry shape changed");
        };
        assert!(matches!(children[0], MatroskaSpec::TrackNumber(1)));

        let MatroskaSpec::ContentEncodings(Master::Full(entries)) = &children[1] else {
            panic!("missing content encodings declaration");
        };
        assert_eq!(1, entries.len());

        let MatroskaSpec::ContentEncoding(Master::Full(fields)) = &entries[0] else {
            panic!("missing encryption step");
        };
        assert!(matches!(fields[0], MatroskaSpec::ContentEncodingOrder(0)));
        assert!(matches!(fields[1], MatroskaSpec::ContentEncodingScope(1)));
        assert!(matches!(fields[2], MatroskaSpec::ContentEncodingType(1)));

        let MatroskaSpec::ContentEncryption(Master::Full(encryption)) = &fields[3] else {
            panic!("missing encryption settings");
        };
        assert!(matches!(encryption[0], MatroskaSpec::ContentEncAlgo(5)));
        assert!(matches!(
            &encryption[1],
            MatroskaSpec::ContentEncKeyID(id) if id.len() == 16
        ));
        assert!(matches!(
            &encryption[2],
            MatroskaSpec::ContentEncAESSettings(Master::Full(settings))
                if matches!(settings[..], [MatroskaSpec::AESSettingsCipherMode(1)])
        ));
    }

    #[test]
    fn test_existing_encodings_declaration_is_extended() {
        let mut cryptor = TagCryptor::new(Mode::Encrypt, &KEY).unwrap();

        let compression = MatroskaSpec::ContentEncoding(Master::Full(vec![
            MatroskaSpec::ContentEncodingType(0),
        ]));
        let tag = cryptor
            .transform(MatroskaSpec::TrackEntry(Master::Full(vec![
                MatroskaSpec::TrackNumber(1),
                MatroskaSpec::ContentEncodings(Master::Full(vec![compression])),
            ])))
            .unwrap();

        let MatroskaSpec::TrackEntry(Master::Full(children)) = tag else {
            panic!("track entry shape changed");
        };
        // No second declaration is created; the step joins the existing one.
        assert_eq!(2, children.len());

        let MatroskaSpec::ContentEncodings(Master::Full(entries)) = &children[1] else {
            panic!("missing content encodings declaration");
        };
        assert_eq!(2, entries.len());
    }

    #[test]
    fn test_pruning_drops_emptied_declaration() {
        let mut cryptor = TagCryptor::new(Mode::Decrypt, &KEY).unwrap();

        let encryption_only = MatroskaSpec::ContentEncodings(Master::Full(vec![
            MatroskaSpec::ContentEncoding(Master::Full(vec![
                MatroskaSpec::ContentEncodingType(1),
            ])),
        ]));
        assert!(cryptor.transform(encryption_only).is_none());
    }

    #[test]
    fn test_pruning_keeps_compression_steps() {
        let mut cryptor = TagCryptor::new(Mode::Decrypt, &KEY).unwrap();

        let mixed = MatroskaSpec::ContentEncodings(Master::Full(vec![
            MatroskaSpec::ContentEncoding(Master::Full(vec![
                MatroskaSpec::ContentEncodingType(1),
            ])),
            MatroskaSpec::ContentEncoding(Master::Full(vec![
                MatroskaSpec::ContentEncodingOrder(0),
                MatroskaSpec::ContentEncodingType(0),
            ])),
        ]));

        let MatroskaSpec::ContentEncodings(Master::Full(entries)) =
            cryptor.transform(mixed).unwrap()
        else {
            panic!("declaration dropped");
        };
        assert_eq!(1, entries.len());
        assert!(matches!(
            &entries[0],
            MatroskaSpec::ContentEncoding(Master::Full(fields))
                if matches!(fields[1], MatroskaSpec::ContentEncodingType(0))
        ));
    }

    #[test]
    fn test_unrelated_tags_pass_through() {
        let mut cryptor = TagCryptor::new(Mode::Encrypt, &KEY).unwrap();

        assert!(matches!(
            cryptor.transform(MatroskaSpec::Cluster(Master::Start)),
            Some(MatroskaSpec::Cluster(Master::Start))
        ));
        assert!(matches!(
            cryptor.transform(MatroskaSpec::TrackNumber(7)),
            Some(MatroskaSpec::TrackNumber(7))
        ));
    }
}
