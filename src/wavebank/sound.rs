//! Decoded sounds.
use super::entry::StreamEntry;
use super::error::XwbError;
use super::format::{MiniFormatTag, WaveFormat};
use anyhow::Result;
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SoundEffect {
    pub codec: MiniFormatTag,
    #[serde(skip)]
    pub audio_data: Vec<u8>,
    pub channels: u32,
    pub sample_rate: u32,
    pub block_alignment: u32,
    pub bits_per_sample: u16,
    pub loop_start: i32,
    pub loop_length: i32,
}

impl SoundEffect {
    /// Builds the sound for entry `index`. Only PCM payloads are accepted.
    pub fn from_entry(
        index: usize,
        entry: &StreamEntry,
        audio_data: Vec<u8>,
        version: u32,
    ) -> Result<Self> {
        let format = WaveFormat::decode(entry.format, version)?;
        if format.codec != MiniFormatTag::Pcm {
            return Err(XwbError::UnsupportedCodec {
                index,
                codec: format.codec,
            }
            .into());
        }
        Ok(SoundEffect {
            codec: format.codec,
            audio_data,
            channels: format.channels,
            sample_rate: format.sample_rate,
            block_alignment: format.block_alignment,
            bits_per_sample: format.bits_per_sample_value()?,
            loop_start: entry.loop_start,
            loop_length: entry.loop_length,
        })
    }

    /// Number of sample frames in the payload, `None` if there are no channels.
    pub fn sample_count(&self) -> Option<u32> {
        frame_count(
            self.audio_data.len() as u64,
            self.bits_per_sample,
            self.channels,
        )
    }
}

/// `length / (bytes_per_sample * channels)`.
pub(crate) fn frame_count(length: u64, bits_per_sample: u16, channels: u32) -> Option<u32> {
    let frame_size = (bits_per_sample as u64 / 8) * channels as u64;
    if frame_size == 0 {
        return None;
    }
    u32::try_from(length / frame_size).ok()
}

#[test]
fn test_from_entry_pcm() {
    use super::entry::StreamEntryBuilder;
    let entry = StreamEntryBuilder::new()
        .format(2182449288)
        .file_length(8)
        .loop_start(1)
        .loop_length(2)
        .build();
    let sound = SoundEffect::from_entry(0, &entry, vec![0; 8], 45).unwrap();
    assert_eq!(sound.codec, MiniFormatTag::Pcm);
    assert_eq!(sound.channels, 2);
    assert_eq!(sound.sample_rate, 44100);
    assert_eq!(sound.bits_per_sample, 16);
    assert_eq!(sound.loop_length, 2);
    assert_eq!(sound.sample_count(), Some(2));
}

#[test]
fn test_from_entry_rejects_adpcm() {
    use super::entry::StreamEntryBuilder;
    let entry = StreamEntryBuilder::new().format(2182449288 | 2).build();
    let err = SoundEffect::from_entry(3, &entry, Vec::new(), 45).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<XwbError>(),
        Some(XwbError::UnsupportedCodec {
            index: 3,
            codec: MiniFormatTag::Adpcm
        })
    ));
}

#[test]
fn test_frame_count() {
    assert_eq!(frame_count(400, 16, 2), Some(100));
    assert_eq!(frame_count(400, 8, 1), Some(400));
    assert_eq!(frame_count(400, 16, 0), None);
}
