//! Per-entry stream descriptors, in compact or explicit encoding.
use super::data::{BankMetadata, BankOffsets};
use super::error::{XwbError, non_negative};
use super::header::*;
use crate::ext::io::*;
use crate::utils::struct_pack::*;
use anyhow::Result;
use serde::Serialize;
use std::io::{Read, Seek, SeekFrom, Write};
use xwb_tool_macro::*;

/// Low bits of a compact entry holding the offset, in units of the bank alignment.
pub const COMPACT_OFFSET_MASK: u32 = 0x1F_FFFF;

/// Element size from which the explicit file length is trusted as stored.
pub const FULL_ENTRY_METADATA_SIZE: u32 = 24;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StreamEntry {
    pub flags_and_duration: u32,
    /// Raw `MiniWaveFormat`.
    pub format: u32,
    pub file_offset: u32,
    pub file_length: u32,
    pub loop_start: i32,
    pub loop_length: i32,
}

/// Fields of an explicit entry after `flags_and_duration`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EntryField {
    Format,
    FileOffset,
    FileLength,
    LoopStart,
    LoopLength,
}

/// `(minimum element size, field)`, in on-disk order.
const ENTRY_FIELDS: &[(u32, EntryField)] = &[
    (8, EntryField::Format),
    (12, EntryField::FileOffset),
    (16, EntryField::FileLength),
    (20, EntryField::LoopStart),
    (24, EntryField::LoopLength),
];

#[derive(Debug, Default)]
pub struct StreamEntryBuilder {
    flags_and_duration: u32,
    format: u32,
    file_offset: u32,
    file_length: u32,
    loop_start: i32,
    loop_length: i32,
}

impl StreamEntryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flags_and_duration(mut self, value: u32) -> Self {
        self.flags_and_duration = value;
        self
    }

    pub fn format(mut self, value: u32) -> Self {
        self.format = value;
        self
    }

    pub fn file_offset(mut self, value: u32) -> Self {
        self.file_offset = value;
        self
    }

    pub fn file_length(mut self, value: u32) -> Self {
        self.file_length = value;
        self
    }

    pub fn loop_start(mut self, value: i32) -> Self {
        self.loop_start = value;
        self
    }

    pub fn loop_length(mut self, value: i32) -> Self {
        self.loop_length = value;
        self
    }

    fn set_field(self, field: EntryField, raw: i32) -> Result<Self, XwbError> {
        Ok(match field {
            EntryField::Format => self.format(raw as u32),
            EntryField::FileOffset => self.file_offset(non_negative("file offset", raw)?),
            EntryField::FileLength => self.file_length(non_negative("file length", raw)?),
            EntryField::LoopStart => self.loop_start(raw),
            EntryField::LoopLength => self.loop_length(raw),
        })
    }

    pub fn build(self) -> StreamEntry {
        StreamEntry {
            flags_and_duration: self.flags_and_duration,
            format: self.format,
            file_offset: self.file_offset,
            file_length: self.file_length,
            loop_start: self.loop_start,
            loop_length: self.loop_length,
        }
    }
}

/// The fixed 20 byte entry record of version 1 banks.
#[derive(Debug, StructUnpack)]
struct V1EntryRecord {
    format: u32,
    file_offset: i32,
    file_length: i32,
    loop_start: i32,
    loop_length: i32,
}

impl TryFrom<V1EntryRecord> for StreamEntry {
    type Error = XwbError;

    fn try_from(record: V1EntryRecord) -> Result<Self, XwbError> {
        Ok(StreamEntryBuilder::new()
            .format(record.format)
            .file_offset(non_negative("file offset", record.file_offset)?)
            .file_length(non_negative("file length", record.file_length)?)
            .loop_start(record.loop_start)
            .loop_length(record.loop_length)
            .build())
    }
}

/// What the fixed output profile stores per entry.
#[derive(Debug, StructPack)]
struct FixedEntryRecord {
    flags_and_duration: u32,
    format: u32,
}

fn entry_position(offsets: &BankOffsets, index: usize, element_size: u32) -> Result<u64> {
    (index as u64)
        .checked_mul(element_size as u64)
        .and_then(|pos| pos.checked_add(offsets.metadata_segment_offset as u64))
        .ok_or_else(|| {
            XwbError::inconsistent_offsets(format!(
                "entry {} lies past the addressable range",
                index
            ))
            .into()
        })
}

fn read_compact<R: Read + Seek>(
    reader: &mut R,
    header: &WaveBankHeader,
    data: &BankMetadata,
) -> Result<Vec<StreamEntry>> {
    let compact_format = data.compact_format.unwrap_or(0);
    let mut offsets = Vec::new();
    for index in 0..data.entry_count {
        let packed = reader.read_i32()? as u32;
        let offset = (packed & COMPACT_OFFSET_MASK)
            .checked_mul(data.alignment)
            .ok_or_else(|| {
                XwbError::inconsistent_offsets(format!(
                    "compact entry {} offset overflows with alignment {}",
                    index, data.alignment
                ))
            })?;
        offsets.push(offset);
    }

    let last = header.segments[header.layout().last_segment()];
    let mut entries = Vec::with_capacity(offsets.len());
    for (index, &offset) in offsets.iter().enumerate() {
        let end = offsets.get(index + 1).copied().unwrap_or(last.length);
        let file_length = end.checked_sub(offset).ok_or_else(|| {
            XwbError::inconsistent_offsets(format!(
                "compact entry {} starts at {} but the next region starts at {}",
                index, offset, end
            ))
        })?;
        entries.push(
            StreamEntryBuilder::new()
                .format(compact_format)
                .file_offset(offset)
                .file_length(file_length)
                .build(),
        );
    }
    Ok(entries)
}

fn read_explicit<R: Read + Seek>(
    reader: &mut R,
    header: &WaveBankHeader,
    data: &BankMetadata,
    offsets: &BankOffsets,
) -> Result<Vec<StreamEntry>> {
    let element_size = data.entry_metadata_element_size;
    let last = header.segments[header.layout().last_segment()];
    let mut entries = Vec::new();
    for index in 0..data.entry_count as usize {
        reader.seek(SeekFrom::Start(entry_position(offsets, index, element_size)?))?;
        if header.version == 1 {
            entries.push(StreamEntry::try_from(V1EntryRecord::unpack(&mut *reader)?)?);
            continue;
        }
        let mut builder = StreamEntryBuilder::new().flags_and_duration(reader.read_i32()? as u32);
        for &(threshold, field) in ENTRY_FIELDS {
            if element_size < threshold {
                break;
            }
            builder = builder.set_field(field, reader.read_i32()?)?;
        }
        let mut entry = builder.build();
        // short records carry an unreliable length, the last segment's length replaces it
        if element_size < FULL_ENTRY_METADATA_SIZE && entry.file_length != 0 {
            entry.file_length = last.length;
        }
        entries.push(entry);
    }
    Ok(entries)
}

/// Reads the entry table located by the metadata segment.
pub fn read_entries<R: Read + Seek>(
    reader: &mut R,
    header: &WaveBankHeader,
    data: &BankMetadata,
    offsets: &BankOffsets,
) -> Result<Vec<StreamEntry>> {
    reader.seek(SeekFrom::Start(offsets.metadata_segment_offset as u64))?;
    let entries = if data.flags.is_compact() {
        read_compact(reader, header, data)?
    } else {
        read_explicit(reader, header, data, offsets)?
    };
    log::debug!(
        "Read {} {} entries at {:#x}",
        entries.len(),
        if data.flags.is_compact() {
            "compact"
        } else {
            "explicit"
        },
        offsets.metadata_segment_offset
    );
    Ok(entries)
}

/// Reads the payload of `entry` from the play region.
pub fn read_payload<R: Read + Seek>(
    reader: &mut R,
    entry: &StreamEntry,
    offsets: &BankOffsets,
) -> Result<Vec<u8>> {
    let start = offsets.play_region_offset as u64 + entry.file_offset as u64;
    reader.seek(SeekFrom::Start(start))?;
    Ok(reader.read_exact_vec(entry.file_length as usize)?)
}

impl StreamEntry {
    /// Writes the `(flags_and_duration, format)` pair of the fixed profile.
    pub(crate) fn write_fixed_profile<W: Write>(
        writer: &mut W,
        flags_and_duration: u32,
        format: u32,
    ) -> Result<()> {
        FixedEntryRecord {
            flags_and_duration,
            format,
        }
        .pack(writer)
    }
}

#[cfg(test)]
fn test_bank(
    version: u32,
    flags: u32,
    element_size: u32,
    entry_count: u32,
    alignment: u32,
    last_segment: (u32, u32),
) -> (WaveBankHeader, BankMetadata, BankOffsets) {
    let mut header = WaveBankHeader {
        version,
        header_version: None,
        segments: Default::default(),
    };
    let last = header.layout().last_segment();
    header.segments[last] = Segment {
        offset: last_segment.0,
        length: last_segment.1,
    };
    let data = BankMetadata {
        flags: super::data::BankFlags(flags),
        entry_count,
        entry_metadata_element_size: element_size,
        alignment,
        compact_format: Some(0x0158_8889),
        ..Default::default()
    };
    let offsets = BankOffsets {
        metadata_segment_offset: 0,
        play_region_offset: last_segment.0,
    };
    (header, data, offsets)
}

#[cfg(test)]
fn i32_bytes(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

#[test]
fn test_compact_length_inference() {
    use super::data::BankFlags;
    let (header, data, offsets) = test_bank(44, BankFlags::COMPACT, 4, 3, 1, (1000, 400));
    let table = i32_bytes(&[0, 100, 250]);
    let entries = read_entries(&mut MemReaderRef::new(&table), &header, &data, &offsets).unwrap();
    let lengths: Vec<_> = entries.iter().map(|e| e.file_length).collect();
    assert_eq!(lengths, [100, 150, 150]);
    assert!(entries.iter().all(|e| e.format == 0x0158_8889));
}

#[test]
fn test_compact_offsets_scale_with_alignment() {
    use super::data::BankFlags;
    let (header, data, offsets) = test_bank(44, BankFlags::COMPACT, 4, 2, 2048, (4096, 8192));
    // high bits hold the length deviation and are ignored
    let table = i32_bytes(&[0x7FE0_0000, 0x0020_0002]);
    let entries = read_entries(&mut MemReaderRef::new(&table), &header, &data, &offsets).unwrap();
    assert_eq!(entries[0].file_offset, 0);
    assert_eq!(entries[1].file_offset, 4096);
    assert_eq!(entries[0].file_length, 4096);
    assert_eq!(entries[1].file_length, 4096);
}

#[test]
fn test_compact_unsorted_offsets_fail() {
    use super::data::BankFlags;
    let (header, data, offsets) = test_bank(44, BankFlags::COMPACT, 4, 2, 1, (0, 400));
    let table = i32_bytes(&[200, 100]);
    let err = read_entries(&mut MemReaderRef::new(&table), &header, &data, &offsets).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<XwbError>(),
        Some(XwbError::InconsistentOffsets(_))
    ));
}

#[test]
fn test_explicit_full_entries() {
    let (header, data, offsets) = test_bank(45, 0, 24, 2, 0, (500, 1000));
    let table = i32_bytes(&[
        0x100, 0x11, 0, 64, 1, 2, //
        0x200, 0x22, 64, 32, -1, 0,
    ]);
    let entries = read_entries(&mut MemReaderRef::new(&table), &header, &data, &offsets).unwrap();
    assert_eq!(
        entries[1],
        StreamEntry {
            flags_and_duration: 0x200,
            format: 0x22,
            file_offset: 64,
            file_length: 32,
            loop_start: -1,
            loop_length: 0,
        }
    );
    assert_eq!(entries[0].loop_length, 2);
}

#[test]
fn test_explicit_short_entries() {
    // 16 byte records: no loop fields, and a non-zero length is replaced
    let (header, data, offsets) = test_bank(45, 0, 16, 2, 0, (500, 777));
    let table = i32_bytes(&[7, 0x11, 0, 64, 8, 0x22, 64, 0]);
    let entries = read_entries(&mut MemReaderRef::new(&table), &header, &data, &offsets).unwrap();
    assert_eq!(entries[0].flags_and_duration, 7);
    assert_eq!(entries[0].file_length, 777);
    assert_eq!(entries[0].loop_start, 0);
    assert_eq!(entries[1].file_offset, 64);
    assert_eq!(entries[1].file_length, 0);

    // 8 byte records carry only flags and format
    let (header, data, offsets) = test_bank(45, 0, 8, 2, 0, (500, 777));
    let table = i32_bytes(&[1, 0x11, 2, 0x22]);
    let entries = read_entries(&mut MemReaderRef::new(&table), &header, &data, &offsets).unwrap();
    assert_eq!(entries[1].flags_and_duration, 2);
    assert_eq!(entries[1].format, 0x22);
    assert_eq!(entries[1].file_offset, 0);
}

#[test]
fn test_explicit_v1_entries() {
    let (header, data, offsets) = test_bank(1, 0, 20, 1, 0, (0, 50));
    let table = i32_bytes(&[0x44, 0, 40, 3, 4]);
    let entries = read_entries(&mut MemReaderRef::new(&table), &header, &data, &offsets).unwrap();
    assert_eq!(entries[0].format, 0x44);
    assert_eq!(entries[0].file_length, 40);
    assert_eq!(entries[0].loop_start, 3);
    assert_eq!(entries[0].flags_and_duration, 0);
}

#[test]
fn test_explicit_negative_length_fails() {
    let (header, data, offsets) = test_bank(45, 0, 24, 1, 0, (0, 0));
    let table = i32_bytes(&[0, 0, 0, -5, 0, 0]);
    let err = read_entries(&mut MemReaderRef::new(&table), &header, &data, &offsets).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<XwbError>(),
        Some(XwbError::NegativeValue {
            field: "file length",
            ..
        })
    ));
}

#[test]
fn test_read_payload() {
    let data = b"....headerAUDIO!tail";
    let entry = StreamEntryBuilder::new().file_offset(6).file_length(6).build();
    let offsets = BankOffsets {
        metadata_segment_offset: 0,
        play_region_offset: 4,
    };
    let payload = read_payload(&mut MemReaderRef::new(data), &entry, &offsets).unwrap();
    assert_eq!(payload, b"AUDIO!");

    let entry = StreamEntryBuilder::new().file_offset(6).file_length(60).build();
    assert!(read_payload(&mut MemReaderRef::new(data), &entry, &offsets).is_err());
}
