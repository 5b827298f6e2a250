//! XACT wave bank (`.xwb`) reading and fixed profile writing.
pub mod data;
pub mod entry;
pub mod error;
pub mod format;
pub mod header;
pub mod sound;

use crate::ext::io::*;
use anyhow::Result;
use data::{BankFlags, BankMetadata};
use entry::StreamEntry;
use error::{XwbError, truncated};
use format::{MiniFormatTag, WaveFormat};
use header::WaveBankHeader;
use serde::Serialize;
use sound::{SoundEffect, frame_count};
use std::io::{BufReader, Read, Seek, Write};
use std::path::{Path, PathBuf};

pub const MAGIC: &[u8; 4] = b"WBND";

/// `flags_and_duration` keeps the sample count above its low four flag bits.
const DURATION_SHIFT: u32 = 4;

#[derive(Clone, Debug, Serialize)]
pub struct WaveBank {
    /// File the bank was read from, `None` for in-memory data.
    pub source: Option<PathBuf>,
    pub header: WaveBankHeader,
    pub data: BankMetadata,
    pub streaming: bool,
    pub play_region_offset: u32,
    pub streams: Vec<StreamEntry>,
    pub sounds: Vec<SoundEffect>,
}

impl WaveBank {
    /// Checks for the `WBND` magic without consuming anything.
    pub fn is_wavebank<R: Read + Seek>(reader: &mut R) -> Result<bool> {
        Ok(reader.peek_and_equal(MAGIC)?)
    }

    /// Decodes a whole bank, payloads included.
    pub fn from_reader<R: Read + Seek>(mut reader: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        reader
            .read_exact(&mut magic)
            .map_err(|e| truncated("magic")(e.into()))?;
        if &magic != MAGIC {
            return Err(XwbError::InvalidMagic(magic).into());
        }
        let header = WaveBankHeader::read(&mut reader).map_err(truncated("header"))?;
        let (data, offsets) =
            BankMetadata::read(&mut reader, &header).map_err(truncated("bank metadata"))?;
        let streams = entry::read_entries(&mut reader, &header, &data, &offsets)
            .map_err(truncated("entry table"))?;
        let mut sounds = Vec::with_capacity(streams.len());
        for (index, stream) in streams.iter().enumerate() {
            let payload = entry::read_payload(&mut reader, stream, &offsets)
                .map_err(truncated("audio payload"))?;
            sounds.push(SoundEffect::from_entry(
                index,
                stream,
                payload,
                header.version,
            )?);
        }
        let bank = WaveBank {
            source: None,
            streaming: data.flags.is_streaming(),
            play_region_offset: offsets.play_region_offset,
            header,
            data,
            streams,
            sounds,
        };
        bank.validate()?;
        Ok(bank)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_reader(MemReaderRef::new(data))
    }

    pub fn from_file<P: AsRef<Path> + ?Sized>(path: &P) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let mut bank = Self::from_reader(BufReader::new(file))?;
        bank.source = Some(path.to_path_buf());
        Ok(bank)
    }

    /// Checks the cross-field invariants of the bank.
    pub fn validate(&self) -> Result<(), XwbError> {
        let entry_count = self.data.entry_count;
        if self.streams.len() != entry_count as usize || self.sounds.len() != entry_count as usize
        {
            return Err(XwbError::EntryCountMismatch {
                entry_count,
                streams: self.streams.len(),
                sounds: self.sounds.len(),
            });
        }
        for (index, sound) in self.sounds.iter().enumerate() {
            if sound.codec != MiniFormatTag::Pcm {
                return Err(XwbError::UnsupportedCodec {
                    index,
                    codec: sound.codec,
                });
            }
        }
        self.data.validate()
    }

    pub fn is_compact(&self) -> bool {
        self.data.flags.contains(BankFlags::COMPACT)
    }

    /// Encodes the bank with the fixed output profile.
    ///
    /// Only the header, the metadata block and one `(flags_and_duration, format)`
    /// pair per entry are written. Audio payloads and entry names are not.
    pub fn write_fixed_profile<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.validate()?;
        self.header.write_fixed_profile(writer)?;
        self.data.write_fixed_profile(writer)?;
        for (index, stream) in self.streams.iter().enumerate() {
            let format = WaveFormat::decode(stream.format, self.header.version)?;
            let flags_and_duration = if stream.flags_and_duration != 0 {
                stream.flags_and_duration
            } else {
                duration_field(index, stream, &format)?
            };
            StreamEntry::write_fixed_profile(writer, flags_and_duration, format.encode()?)?;
        }
        log::debug!(
            "Wrote fixed profile for bank '{}' with {} entries",
            self.data.bank_name,
            self.streams.len()
        );
        Ok(())
    }

    pub fn to_fixed_profile_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write_fixed_profile(&mut out)?;
        Ok(out)
    }
}

fn duration_field(index: usize, stream: &StreamEntry, wave_format: &WaveFormat) -> Result<u32> {
    let frames = frame_count(
        stream.file_length as u64,
        wave_format.bits_per_sample_value()?,
        wave_format.channels,
    );
    let sample_count = frames.ok_or(XwbError::NoChannels { index })?;
    if sample_count >> (32 - DURATION_SHIFT) != 0 {
        return Err(XwbError::FieldOutOfRange {
            field: "duration",
            value: sample_count as u64,
            bits: 32 - DURATION_SHIFT,
        }
        .into());
    }
    Ok(sample_count << DURATION_SHIFT)
}

#[cfg(test)]
fn push_i32s(data: &mut Vec<u8>, values: &[i32]) {
    for value in values {
        data.extend_from_slice(&value.to_le_bytes());
    }
}

/// A version 1 bank with one explicit 20 byte entry of `payload.len()` bytes.
#[cfg(test)]
fn v1_bank_bytes(format: u32, payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(MAGIC);
    // header: 4 + 4 + 4 * 8 = 40, metadata: 4 + 4 + 64 = 72
    push_i32s(&mut data, &[1, 40, 72, 112, 20, 0, 0, 132, payload.len() as i32]);
    push_i32s(&mut data, &[0, 1]);
    let mut name = [0u8; 64];
    name[..4].copy_from_slice(b"Test");
    data.extend_from_slice(&name);
    push_i32s(&mut data, &[format as i32, 0, payload.len() as i32, 0, 0]);
    data.extend_from_slice(payload);
    data
}

#[cfg(test)]
const V1_PCM_MONO_8BIT: u32 = (1 << 1) | (22050 << 4) | (1 << 22);

#[test]
fn test_read_v1_bank() {
    let data = v1_bank_bytes(V1_PCM_MONO_8BIT, &[0x80; 12]);
    let bank = WaveBank::from_bytes(&data).unwrap();
    assert_eq!(bank.data.entry_count, 1);
    assert_eq!(bank.data.bank_name, "Test");
    assert_eq!(bank.streams.len(), 1);
    assert_eq!(bank.streams[0].file_length, 12);
    assert_eq!(bank.sounds[0].codec, MiniFormatTag::Pcm);
    assert_eq!(bank.sounds[0].channels, 1);
    assert_eq!(bank.sounds[0].sample_rate, 22050);
    assert_eq!(bank.sounds[0].audio_data, [0x80; 12]);
    assert_eq!(bank.play_region_offset, 132);
    assert!(!bank.streaming);
    assert!(bank.source.is_none());
    assert_eq!(bank.header.segments[4], header::Segment::default());
}

#[test]
fn test_is_wavebank() {
    let data = v1_bank_bytes(V1_PCM_MONO_8BIT, &[0; 4]);
    let mut reader = MemReaderRef::new(&data);
    assert!(WaveBank::is_wavebank(&mut reader).unwrap());
    assert!(WaveBank::from_reader(reader).is_ok());
    assert!(!WaveBank::is_wavebank(&mut MemReaderRef::new(b"RIFF....")).unwrap());
    assert!(!WaveBank::is_wavebank(&mut MemReaderRef::new(b"WB")).unwrap());
}

#[test]
fn test_bad_magic() {
    let mut data = v1_bank_bytes(V1_PCM_MONO_8BIT, &[0; 4]);
    data[..4].copy_from_slice(b"DNBW");
    let err = WaveBank::from_bytes(&data).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<XwbError>(),
        Some(XwbError::InvalidMagic(magic)) if magic == b"DNBW"
    ));
    let err = WaveBank::from_bytes(b"WB").unwrap_err();
    assert!(matches!(
        err.downcast_ref::<XwbError>(),
        Some(XwbError::Truncated("magic"))
    ));
}

#[test]
fn test_non_pcm_entry() {
    let data = v1_bank_bytes(V1_PCM_MONO_8BIT | 1, &[0; 4]);
    let err = WaveBank::from_bytes(&data).unwrap_err();
    let err = err.downcast_ref::<XwbError>().unwrap();
    assert!(matches!(
        err,
        XwbError::UnsupportedCodec {
            index: 0,
            codec: MiniFormatTag::Xma
        }
    ));
    assert_eq!(err.kind(), error::ErrorKind::FormatValidation);
}

#[test]
fn test_truncated() {
    let mut data = v1_bank_bytes(V1_PCM_MONO_8BIT, &[0; 16]);
    data.truncate(data.len() - 1);
    let err = WaveBank::from_bytes(&data).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<XwbError>(),
        Some(XwbError::Truncated("audio payload"))
    ));

    let data = v1_bank_bytes(V1_PCM_MONO_8BIT, &[0; 16]);
    let err = WaveBank::from_bytes(&data[..30]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<XwbError>(),
        Some(XwbError::Truncated("header"))
    ));
}

#[test]
fn test_huge_entry_count_is_truncated() {
    let mut data = Vec::new();
    data.extend_from_slice(MAGIC);
    // header: 52, metadata: 4 + 4 + 64 + 12 = 84, a single 24 byte entry
    push_i32s(&mut data, &[45, 43, 52, 84, 136, 24, 0, 0, 0, 0, 160, 0]);
    push_i32s(&mut data, &[0, i32::MAX]);
    data.extend_from_slice(&[0u8; 64]);
    push_i32s(&mut data, &[24, -1, 4]);
    push_i32s(&mut data, &[0, 2182449288u32 as i32, 0, 0, 0, 0]);
    assert_eq!(data.len(), 160);
    let err = WaveBank::from_bytes(&data).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<XwbError>(),
        Some(XwbError::Truncated("entry table"))
    ));

    let mut data = Vec::new();
    data.extend_from_slice(MAGIC);
    push_i32s(&mut data, &[44, 43, 52, 88, 140, 4, 0, 0, 0, 0, 144, 0]);
    push_i32s(&mut data, &[BankFlags::COMPACT as i32, i32::MAX]);
    data.extend_from_slice(&[0u8; 64]);
    push_i32s(&mut data, &[4, -1, 1, 2182449288u32 as i32, 0]);
    let err = WaveBank::from_bytes(&data).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<XwbError>(),
        Some(XwbError::Truncated("entry table"))
    ));
}

#[test]
fn test_write_without_channels() {
    let data = v1_bank_bytes((22050 << 4) | (1 << 22), &[0; 4]);
    let bank = WaveBank::from_bytes(&data).unwrap();
    assert_eq!(bank.sounds[0].channels, 0);
    let err = bank.to_fixed_profile_bytes().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<XwbError>(),
        Some(XwbError::NoChannels { index: 0 })
    ));
}

#[test]
fn test_count_mismatch() {
    let data = v1_bank_bytes(V1_PCM_MONO_8BIT, &[0; 4]);
    let mut bank = WaveBank::from_bytes(&data).unwrap();
    bank.sounds.clear();
    assert!(matches!(
        bank.validate(),
        Err(XwbError::EntryCountMismatch {
            entry_count: 1,
            streams: 1,
            sounds: 0
        })
    ));
    assert!(bank.to_fixed_profile_bytes().is_err());
}

#[test]
fn test_read_v45_bank_with_header_version() {
    let mut data = Vec::new();
    data.extend_from_slice(MAGIC);
    // header: 4 + 4 + 4 + 5 * 8 = 52, metadata: 96, entries: 2 * 24
    push_i32s(&mut data, &[45, 43, 52, 96, 148, 48, 0, 0, 0, 0, 196, 12]);
    push_i32s(&mut data, &[BankFlags::TYPE_STREAMING as i32, 2]);
    let mut name = [0u8; 64];
    name[..5].copy_from_slice(b"Music");
    data.extend_from_slice(&name);
    // element sizes, alignment, then padding up to the entry table
    push_i32s(&mut data, &[24, -1, 4, 0, 0, 0]);
    push_i32s(&mut data, &[0x40, 2182449288u32 as i32, 0, 8, 0, 0]);
    push_i32s(&mut data, &[0, 2182449288u32 as i32, 8, 4, 1, 2]);
    data.extend_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);

    let bank = WaveBank::from_bytes(&data).unwrap();
    assert_eq!(bank.header.header_version, Some(43));
    assert!(bank.streaming);
    assert_eq!(bank.data.alignment, 4);
    assert_eq!(bank.sounds[0].audio_data, [1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(bank.sounds[1].audio_data, [9, 10, 11, 12]);
    assert_eq!(bank.sounds[1].loop_length, 2);
    assert_eq!(bank.sounds[1].bits_per_sample, 16);

    // the written header keeps the segments and swaps in the fixed versions
    let out = bank.to_fixed_profile_bytes().unwrap();
    assert_eq!(&out[..52], &data[..52]);
    let pairs = &out[148..];
    assert_eq!(pairs.len(), 16);
    assert_eq!(&pairs[..4], &0x40u32.to_le_bytes());
    assert_eq!(&pairs[4..8], &2182449288u32.to_le_bytes());
    // 4 bytes of 16 bit stereo is one frame
    assert_eq!(&pairs[8..12], &(1u32 << 4).to_le_bytes());
}

#[test]
fn test_compact_bank() {
    let mut data = Vec::new();
    data.extend_from_slice(MAGIC);
    let flags = BankFlags::COMPACT as i32;
    push_i32s(&mut data, &[44, 43, 52, 100, 152, 12, 0, 0, 0, 0, 164, 400]);
    push_i32s(&mut data, &[flags, 3]);
    data.extend_from_slice(&[0u8; 64]);
    push_i32s(&mut data, &[4, -1, 1, 2182449288u32 as i32, 0, 0, 0]);
    push_i32s(&mut data, &[0, 100, 250]);
    data.extend_from_slice(&[0u8; 400]);

    let bank = WaveBank::from_bytes(&data).unwrap();
    assert!(bank.is_compact());
    let lengths: Vec<_> = bank.streams.iter().map(|s| s.file_length).collect();
    assert_eq!(lengths, [100, 150, 150]);
    assert_eq!(bank.sounds[2].audio_data.len(), 150);
}

#[test]
fn test_fixed_profile_round_trip() {
    use std::time::{Duration, UNIX_EPOCH};
    let mut bank = WaveBank::from_bytes(&v1_bank_bytes(V1_PCM_MONO_8BIT, &[0; 6])).unwrap();
    // lay the output out the way the fixed profile writes it
    bank.header.segments = [
        header::Segment {
            offset: 52,
            length: 96,
        },
        header::Segment {
            offset: 148,
            length: 8,
        },
        Default::default(),
        Default::default(),
        Default::default(),
    ];
    bank.data.entry_metadata_element_size = 8;
    bank.data.build_time = Some(UNIX_EPOCH + Duration::from_secs(1_600_000_000));
    let out = bank.to_fixed_profile_bytes().unwrap();
    assert_eq!(out.len(), 156);

    let reread = WaveBank::from_bytes(&out).unwrap();
    assert_eq!(reread.header.version, 45);
    assert_eq!(reread.data.bank_name, "Test");
    assert_eq!(reread.data.entry_name_element_size, None);
    assert_eq!(reread.play_region_offset, 156);
    // the version 1 format comes back in the version 2 layout
    assert_eq!(reread.sounds[0].sample_rate, 22050);
    assert_eq!(reread.sounds[0].channels, 1);
    assert_eq!(reread.sounds[0].bits_per_sample, 8);
    assert_eq!(reread.streams[0].flags_and_duration, 6 << 4);
    // everything up to the build time is stable
    assert_eq!(reread.to_fixed_profile_bytes().unwrap()[..140], out[..140]);
}
