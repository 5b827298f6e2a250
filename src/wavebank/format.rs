//! Packed `MiniWaveFormat` bit fields.
//!
//! ```text
//! version 1:
//!  bit 30      22       4    1   0
//!    | |        |        |    |   |
//!    b alignment rate     chan codec
//!
//! version >= 2:
//!  bit 31      23       5    2   0
//!    | |        |        |    |   |
//!    b alignment rate     chan codec
//! ```
//!
//! Some older tooling reads version 1 rate and bits-per-sample at shifts 5 and 31.
use super::error::XwbError;
use anyhow::Result;
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum MiniFormatTag {
    Pcm = 0,
    Xma = 1,
    Adpcm = 2,
    Wma = 3,
}

impl MiniFormatTag {
    /// Older headers name the XMA tag "platform specific".
    pub const PLATFORM_SPECIFIC: MiniFormatTag = MiniFormatTag::Xma;

    pub fn from_raw(value: u32) -> Result<Self, XwbError> {
        match value {
            0 => Ok(MiniFormatTag::Pcm),
            1 => Ok(MiniFormatTag::Xma),
            2 => Ok(MiniFormatTag::Adpcm),
            3 => Ok(MiniFormatTag::Wma),
            _ => Err(XwbError::UnknownCodecTag(value)),
        }
    }
}

/// Bit positions of one `MiniWaveFormat` variant, as `(shift, width)` pairs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatLayout {
    pub codec: (u32, u32),
    pub channels: (u32, u32),
    pub rate: (u32, u32),
    pub alignment: (u32, u32),
    pub bits_per_sample: (u32, u32),
}

pub const FORMAT_LAYOUT_V1: FormatLayout = FormatLayout {
    codec: (0, 1),
    channels: (1, 3),
    rate: (4, 18),
    alignment: (22, 8),
    bits_per_sample: (30, 1),
};

pub const FORMAT_LAYOUT_V2: FormatLayout = FormatLayout {
    codec: (0, 2),
    channels: (2, 3),
    rate: (5, 18),
    alignment: (23, 8),
    bits_per_sample: (31, 1),
};

impl FormatLayout {
    pub fn for_version(version: u32) -> &'static FormatLayout {
        if version == 1 {
            &FORMAT_LAYOUT_V1
        } else {
            &FORMAT_LAYOUT_V2
        }
    }
}

fn extract(value: u32, (shift, width): (u32, u32)) -> u32 {
    (value >> shift) & ((1 << width) - 1)
}

fn place(field: &'static str, value: u32, (shift, width): (u32, u32)) -> Result<u32, XwbError> {
    if value >> width != 0 {
        return Err(XwbError::FieldOutOfRange {
            field,
            value: value as u64,
            bits: width,
        });
    }
    Ok(value << shift)
}

/// Interprets the one-bit bits-per-sample flag of either layout.
pub fn decode_bits_per_sample_flag(flag: u32) -> Result<u16, XwbError> {
    match flag {
        0 => Ok(8),
        1 => Ok(16),
        _ => Err(XwbError::UnknownBitsPerSample(flag)),
    }
}

/// A decoded `MiniWaveFormat`.
///
/// `bits_per_sample` holds the raw one-bit flag so that encoding is lossless,
/// use [`WaveFormat::bits_per_sample_value`] for the sample width.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct WaveFormat {
    pub codec: MiniFormatTag,
    pub channels: u32,
    pub sample_rate: u32,
    pub block_alignment: u32,
    pub bits_per_sample: u32,
}

impl WaveFormat {
    pub fn decode(value: u32, version: u32) -> Result<Self> {
        let layout = FormatLayout::for_version(version);
        Ok(WaveFormat {
            codec: MiniFormatTag::from_raw(extract(value, layout.codec))?,
            channels: extract(value, layout.channels),
            sample_rate: extract(value, layout.rate),
            block_alignment: extract(value, layout.alignment),
            bits_per_sample: extract(value, layout.bits_per_sample),
        })
    }

    /// Packs the format using the version >= 2 layout.
    pub fn encode(&self) -> Result<u32> {
        let layout = &FORMAT_LAYOUT_V2;
        Ok(place("codec", self.codec as u32, layout.codec)?
            | place("channels", self.channels, layout.channels)?
            | place("sample_rate", self.sample_rate, layout.rate)?
            | place("block_alignment", self.block_alignment, layout.alignment)?
            | place("bits_per_sample", self.bits_per_sample, layout.bits_per_sample)?)
    }

    /// Sample width in bits.
    pub fn bits_per_sample_value(&self) -> Result<u16> {
        Ok(decode_bits_per_sample_flag(self.bits_per_sample)?)
    }
}

#[test]
fn test_decode_v2() {
    let format = WaveFormat::decode(2182449288, 45).unwrap();
    assert_eq!(format.codec, MiniFormatTag::Pcm);
    assert_eq!(format.channels, 2);
    assert_eq!(format.sample_rate, 44100);
    assert_eq!(format.block_alignment, 4);
    assert_eq!(format.bits_per_sample, 1);
    assert_eq!(format.bits_per_sample_value().unwrap(), 16);
}

#[test]
fn test_decode_v1() {
    let value = 1 | (1 << 1) | (22050 << 4) | (2 << 22) | (1 << 30);
    let format = WaveFormat::decode(value, 1).unwrap();
    assert_eq!(format.codec, MiniFormatTag::Xma);
    assert_eq!(format.codec, MiniFormatTag::PLATFORM_SPECIFIC);
    assert_eq!(format.channels, 1);
    assert_eq!(format.sample_rate, 22050);
    assert_eq!(format.block_alignment, 2);
    assert_eq!(format.bits_per_sample, 1);
}

#[test]
fn test_round_trip() {
    let value = 2182449288u32;
    let encoded = WaveFormat::decode(value, 45).unwrap().encode().unwrap();
    assert_eq!(encoded.to_le_bytes(), value.to_le_bytes());
}

#[test]
fn test_round_trip_stability() {
    let mut previous = WaveFormat::decode(2182449288, 45)
        .unwrap()
        .encode()
        .unwrap();
    for _ in 0..10 {
        let next = WaveFormat::decode(previous, 45).unwrap().encode().unwrap();
        assert_eq!(previous, next);
        previous = next;
    }
}

#[test]
fn test_round_trip_all_codecs() {
    // every codec tag with a spread of the other fields
    for value in [
        0u32,
        1,
        2,
        3,
        0xFFFF_FFFF,
        0x8000_0000,
        0x7FFF_FFFC,
        0x1234_5678,
        0x0158_8889,
        0xDEAD_BEEF,
    ] {
        let format = WaveFormat::decode(value, 2).unwrap();
        assert_eq!(format.encode().unwrap(), value, "value {:#010x}", value);
    }
}

#[test]
fn test_encode_out_of_range() {
    let mut format = WaveFormat::decode(2182449288, 45).unwrap();
    format.channels = 8;
    let err = format.encode().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<XwbError>(),
        Some(XwbError::FieldOutOfRange {
            field: "channels",
            ..
        })
    ));
    format.channels = 2;
    format.sample_rate = 1 << 18;
    assert!(format.encode().is_err());
}

#[test]
fn test_bits_per_sample_flag() {
    assert_eq!(decode_bits_per_sample_flag(0).unwrap(), 8);
    assert_eq!(decode_bits_per_sample_flag(1).unwrap(), 16);
    assert!(matches!(
        decode_bits_per_sample_flag(2),
        Err(XwbError::UnknownBitsPerSample(2))
    ));
}
