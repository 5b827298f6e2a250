//! Container version, version dependent layout and the segment table.
use super::error::{XwbError, non_negative};
use super::format::FormatLayout;
use crate::ext::io::*;
use crate::utils::struct_pack::*;
use anyhow::Result;
use serde::Serialize;
use std::io::{Read, Seek, Write};
use xwb_tool_macro::*;

pub const SEGMENT_SLOTS: usize = 5;

/// Versions at or above this store an extra header version after the content version.
pub const HEADER_VERSION_MIN: u32 = 42;

/// Content version written by the fixed output profile.
pub const FIXED_PROFILE_VERSION: u32 = 45;
/// Header (tool) version written by the fixed output profile.
pub const FIXED_PROFILE_HEADER_VERSION: u32 = 43;

pub const SEGMENT_BANK_DATA: usize = 0;
pub const SEGMENT_ENTRY_METADATA: usize = 1;

/// Everything about the on-disk layout that depends on the container version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VersionLayout {
    pub segment_count: usize,
    pub bank_name_width: usize,
    pub entry_name_segment: usize,
    pub format_layout: &'static FormatLayout,
}

impl VersionLayout {
    pub fn for_version(version: u32) -> Self {
        let segment_count = if version <= 3 { 4 } else { 5 };
        VersionLayout {
            segment_count,
            bank_name_width: if matches!(version, 2 | 3) { 16 } else { 64 },
            entry_name_segment: if version >= HEADER_VERSION_MIN { 3 } else { 2 },
            format_layout: FormatLayout::for_version(version),
        }
    }

    /// The last populated segment, which locates the wave data.
    pub fn last_segment(&self) -> usize {
        self.segment_count - 1
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub offset: u32,
    pub length: u32,
}

impl Segment {
    pub fn is_present(&self) -> bool {
        self.offset != 0 && self.length != 0
    }
}

/// On-disk form of a segment descriptor.
#[derive(Debug, StructPack, StructUnpack)]
struct RawSegment {
    offset: i32,
    length: i32,
}

impl TryFrom<RawSegment> for Segment {
    type Error = XwbError;

    fn try_from(raw: RawSegment) -> Result<Self, XwbError> {
        Ok(Segment {
            offset: non_negative("segment offset", raw.offset)?,
            length: non_negative("segment length", raw.length)?,
        })
    }
}

impl TryFrom<&Segment> for RawSegment {
    type Error = XwbError;

    fn try_from(segment: &Segment) -> Result<Self, XwbError> {
        let to_i32 = |field: &'static str, value: u32| {
            i32::try_from(value).map_err(|_| XwbError::FieldOutOfRange {
                field,
                value: value as u64,
                bits: 31,
            })
        };
        Ok(RawSegment {
            offset: to_i32("segment offset", segment.offset)?,
            length: to_i32("segment length", segment.length)?,
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WaveBankHeader {
    pub version: u32,
    /// Present for versions >= 42.
    pub header_version: Option<u32>,
    pub segments: [Segment; SEGMENT_SLOTS],
}

impl WaveBankHeader {
    /// Reads everything after the magic: version, optional header version and segments.
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        let version = non_negative("version", reader.read_i32()?)?;
        let header_version = if version >= HEADER_VERSION_MIN {
            Some(reader.read_u32()?)
        } else {
            None
        };
        let layout = VersionLayout::for_version(version);
        let mut segments = [Segment::default(); SEGMENT_SLOTS];
        for segment in segments.iter_mut().take(layout.segment_count) {
            *segment = RawSegment::unpack(&mut *reader)?.try_into()?;
        }
        log::debug!(
            "Header: version {}, header version {:?}, {} segments",
            version,
            header_version,
            layout.segment_count
        );
        Ok(WaveBankHeader {
            version,
            header_version,
            segments,
        })
    }

    /// Writes the fixed profile header. The in-memory version is ignored.
    pub fn write_fixed_profile<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(super::MAGIC)?;
        writer.write_u32(FIXED_PROFILE_VERSION)?;
        writer.write_u32(FIXED_PROFILE_HEADER_VERSION)?;
        for segment in &self.segments {
            RawSegment::try_from(segment)?.pack(writer)?;
        }
        Ok(())
    }

    pub fn layout(&self) -> VersionLayout {
        VersionLayout::for_version(self.version)
    }
}

#[cfg(test)]
fn header_bytes(version: i32, extra: Option<i32>, pairs: &[(i32, i32)]) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&version.to_le_bytes());
    if let Some(extra) = extra {
        data.extend_from_slice(&extra.to_le_bytes());
    }
    for (offset, length) in pairs {
        data.extend_from_slice(&offset.to_le_bytes());
        data.extend_from_slice(&length.to_le_bytes());
    }
    // trailing bytes that must not be consumed as segments
    data.extend_from_slice(&[0xAA; 8]);
    data
}

#[test]
fn test_read_old_header_has_four_segments() {
    for version in 1..=3 {
        let data = header_bytes(version, None, &[(10, 1), (20, 2), (30, 3), (40, 4)]);
        let mut reader = MemReaderRef::new(&data);
        let header = WaveBankHeader::read(&mut reader).unwrap();
        assert_eq!(header.version, version as u32);
        assert_eq!(header.header_version, None);
        assert_eq!(
            header.segments[3],
            Segment {
                offset: 40,
                length: 4
            }
        );
        assert_eq!(header.segments[4], Segment::default());
        assert_eq!(reader.stream_position().unwrap(), 4 + 4 * 8);
    }
}

#[test]
fn test_read_header_with_header_version() {
    let pairs = [(52, 96), (148, 24), (0, 0), (0, 0), (172, 1000)];
    let data = header_bytes(45, Some(43), &pairs);
    let mut reader = MemReaderRef::new(&data);
    let header = WaveBankHeader::read(&mut reader).unwrap();
    assert_eq!(header.header_version, Some(43));
    assert_eq!(header.segments[0].offset, 52);
    assert_eq!(header.segments[4].length, 1000);
    assert_eq!(reader.stream_position().unwrap(), 8 + 5 * 8);

    // version 41 has no extra field, so the same bytes shift by four
    let data = header_bytes(41, None, &pairs);
    let header = WaveBankHeader::read(&mut MemReaderRef::new(&data)).unwrap();
    assert_eq!(header.header_version, None);
    assert_eq!(header.segments[0].offset, 52);
}

#[test]
fn test_read_header_rejects_negative_segment() {
    let data = header_bytes(44, Some(43), &[(52, -1), (0, 0), (0, 0), (0, 0), (0, 0)]);
    let err = WaveBankHeader::read(&mut MemReaderRef::new(&data)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<XwbError>(),
        Some(XwbError::NegativeValue {
            field: "segment length",
            value: -1
        })
    ));
}

#[test]
fn test_version_layout() {
    let v1 = VersionLayout::for_version(1);
    assert_eq!((v1.segment_count, v1.bank_name_width), (4, 64));
    assert_eq!(v1.last_segment(), 3);
    let v3 = VersionLayout::for_version(3);
    assert_eq!((v3.segment_count, v3.bank_name_width), (4, 16));
    assert_eq!(v3.entry_name_segment, 2);
    let v46 = VersionLayout::for_version(46);
    assert_eq!((v46.segment_count, v46.bank_name_width), (5, 64));
    assert_eq!(v46.entry_name_segment, 3);
    assert_eq!(v46.last_segment(), 4);
}

#[test]
fn test_write_fixed_profile_header() {
    let header = WaveBankHeader {
        version: 1,
        header_version: None,
        segments: [
            Segment {
                offset: 52,
                length: 96,
            },
            Segment {
                offset: 148,
                length: 8,
            },
            Segment::default(),
            Segment::default(),
            Segment::default(),
        ],
    };
    let mut out = Vec::new();
    header.write_fixed_profile(&mut out).unwrap();
    assert_eq!(out.len(), 4 + 4 + 4 + 5 * 8);
    assert_eq!(&out[..4], b"WBND");
    assert_eq!(&out[4..8], &45u32.to_le_bytes());
    assert_eq!(&out[8..12], &43u32.to_le_bytes());
    assert_eq!(&out[12..16], &52i32.to_le_bytes());
    assert_eq!(&out[24..28], &8i32.to_le_bytes());
}
