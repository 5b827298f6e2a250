//! The `WaveBankData` block located by segment 0.
use super::error::{XwbError, non_negative};
use super::header::*;
use crate::ext::io::*;
use crate::utils::struct_pack::*;
use anyhow::Result;
use serde::Serialize;
use std::io::{Read, Seek, SeekFrom, Write};
use std::time::{SystemTime, UNIX_EPOCH};
use xwb_tool_macro::*;

pub const BANK_NAME_MAX: usize = 64;

/// Element size of the implicit version 1 entry record.
pub const V1_ENTRY_METADATA_SIZE: u32 = 20;

/// Offset between the FILETIME epoch (1601-01-01) and the unix epoch, in 100ns ticks.
pub const FILETIME_UNIX_EPOCH: u64 = 116444736000000000;
const FILETIME_TICKS_PER_SECOND: u64 = 10_000_000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BankFlags(pub u32);

impl BankFlags {
    pub const TYPE_BUFFER: u32 = 0x0000_0000;
    pub const TYPE_STREAMING: u32 = 0x0000_0001;
    pub const TYPE_MASK: u32 = 0x0000_0001;
    pub const ENTRY_NAMES: u32 = 0x0001_0000;
    pub const COMPACT: u32 = 0x0002_0000;
    pub const SYNC_DISABLED: u32 = 0x0004_0000;
    pub const SEEK_TABLES: u32 = 0x0008_0000;
    pub const FLAG_MASK: u32 = 0x000F_0000;

    pub fn contains(&self, flag: u32) -> bool {
        self.0 & flag == flag
    }

    pub fn is_compact(&self) -> bool {
        self.contains(Self::COMPACT)
    }

    pub fn is_streaming(&self) -> bool {
        self.0 & Self::TYPE_MASK == Self::TYPE_STREAMING
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BankMetadata {
    pub flags: BankFlags,
    pub entry_count: u32,
    pub bank_name: String,
    pub entry_metadata_element_size: u32,
    /// Absent until set by the file or an entry name segment is found.
    pub entry_name_element_size: Option<u32>,
    pub alignment: u32,
    /// Present when the compact flag is set.
    pub compact_format: Option<u32>,
    #[serde(skip)]
    pub build_time: Option<SystemTime>,
}

/// Offsets derived while decoding the metadata block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BankOffsets {
    pub metadata_segment_offset: u32,
    pub play_region_offset: u32,
}

/// On-disk form written by the fixed output profile.
#[derive(StructPack)]
struct FixedMetadataRecord {
    flags: u32,
    entry_count: i32,
    #[fstring = 64]
    bank_name: String,
    entry_metadata_element_size: i32,
    entry_name_element_size: i32,
    alignment: i32,
    compact_format: u32,
    build_time: u64,
}

fn to_i32(field: &'static str, value: u32) -> Result<i32, XwbError> {
    i32::try_from(value).map_err(|_| XwbError::FieldOutOfRange {
        field,
        value: value as u64,
        bits: 31,
    })
}

/// Converts a time to FILETIME ticks, whole seconds only.
pub fn to_filetime(time: SystemTime) -> Result<u64> {
    let secs = time
        .duration_since(UNIX_EPOCH)
        .map_err(|_| anyhow::anyhow!("Build time is before the unix epoch"))?
        .as_secs();
    secs.checked_mul(FILETIME_TICKS_PER_SECOND)
        .and_then(|ticks| ticks.checked_add(FILETIME_UNIX_EPOCH))
        .ok_or_else(|| anyhow::anyhow!("Build time {} is out of the FILETIME range", secs))
}

impl BankMetadata {
    /// Reads the metadata block at segment 0 and derives the offsets the entry table needs.
    pub fn read<R: Read + Seek>(
        reader: &mut R,
        header: &WaveBankHeader,
    ) -> Result<(Self, BankOffsets)> {
        let layout = header.layout();
        reader.seek(SeekFrom::Start(
            header.segments[SEGMENT_BANK_DATA].offset as u64,
        ))?;
        let flags = BankFlags(reader.read_i32()? as u32);
        let unknown_flags = flags.0 & !(BankFlags::FLAG_MASK | BankFlags::TYPE_MASK);
        if unknown_flags != 0 {
            log::warn!("Unknown bank flags {:#010x} are ignored", unknown_flags);
        }
        let entry_count = non_negative("entry count", reader.read_i32()?)?;
        let bank_name = reader
            .read_fstring(layout.bank_name_width)
            .map_err(|e| -> anyhow::Error {
                if e.kind() == std::io::ErrorKind::InvalidData {
                    XwbError::NonUtf8BankName.into()
                } else {
                    e.into()
                }
            })?;

        let mut entry_name_element_size = None;
        let mut alignment = 0;
        let entry_metadata_element_size = if header.version == 1 {
            V1_ENTRY_METADATA_SIZE
        } else {
            let element_size = non_negative("entry metadata element size", reader.read_i32()?)?;
            entry_name_element_size = u32::try_from(reader.read_i32()?).ok();
            alignment = non_negative("alignment", reader.read_i32()?)?;
            element_size
        };
        let compact_format = if flags.is_compact() {
            Some(reader.read_i32()? as u32)
        } else {
            None
        };

        let metadata_segment_offset = header.segments[SEGMENT_ENTRY_METADATA].offset;
        let mut play_region_offset = header.segments[layout.last_segment()].offset;
        if play_region_offset == 0 {
            play_region_offset = (entry_count as u64)
                .checked_mul(entry_metadata_element_size as u64)
                .and_then(|size| size.checked_add(metadata_segment_offset as u64))
                .and_then(|offset| u32::try_from(offset).ok())
                .ok_or_else(|| {
                    XwbError::inconsistent_offsets(format!(
                        "entry table of {} x {} bytes at {} runs past 4 GiB",
                        entry_count, entry_metadata_element_size, metadata_segment_offset
                    ))
                })?;
        }

        if header.segments[layout.entry_name_segment].is_present()
            && entry_name_element_size.is_none()
        {
            entry_name_element_size = Some(0);
        }

        log::debug!(
            "Bank '{}': {} entries, flags {:#010x}, element size {}, play region at {:#x}",
            bank_name,
            entry_count,
            flags.0,
            entry_metadata_element_size,
            play_region_offset
        );

        Ok((
            BankMetadata {
                flags,
                entry_count,
                bank_name,
                entry_metadata_element_size,
                entry_name_element_size,
                alignment,
                compact_format,
                build_time: None,
            },
            BankOffsets {
                metadata_segment_offset,
                play_region_offset,
            },
        ))
    }

    pub fn validate(&self) -> Result<(), XwbError> {
        if self.bank_name.len() > BANK_NAME_MAX {
            return Err(XwbError::BankNameTooLong(self.bank_name.len()));
        }
        Ok(())
    }

    /// Writes the fixed profile block: all size fields and the build time are always present.
    ///
    /// An absent build time is stamped with the current time.
    pub fn write_fixed_profile<W: Write>(&self, writer: &mut W) -> Result<()> {
        self.validate()?;
        if !self.bank_name.is_ascii() {
            return Err(XwbError::NonAsciiBankName(self.bank_name.clone()).into());
        }
        let build_time = self.build_time.unwrap_or_else(SystemTime::now);
        FixedMetadataRecord {
            flags: self.flags.0,
            entry_count: to_i32("entry count", self.entry_count)?,
            bank_name: self.bank_name.clone(),
            entry_metadata_element_size: to_i32(
                "entry metadata element size",
                self.entry_metadata_element_size,
            )?,
            entry_name_element_size: match self.entry_name_element_size {
                Some(size) => to_i32("entry name element size", size)?,
                None => -1,
            },
            alignment: to_i32("alignment", self.alignment)?,
            compact_format: self.compact_format.unwrap_or(0),
            build_time: to_filetime(build_time)?,
        }
        .pack(writer)
    }
}

#[cfg(test)]
fn test_header(version: u32, segments: &[(u32, u32)]) -> WaveBankHeader {
    let mut header = WaveBankHeader {
        version,
        header_version: None,
        segments: Default::default(),
    };
    for (slot, (offset, length)) in header.segments.iter_mut().zip(segments) {
        *slot = Segment {
            offset: *offset,
            length: *length,
        };
    }
    header
}

#[cfg(test)]
fn metadata_bytes(name_width: usize, fields: &[i32], name: &str) -> Vec<u8> {
    let mut data = vec![0u8; 8];
    data.extend_from_slice(&fields[0].to_le_bytes());
    data.extend_from_slice(&fields[1].to_le_bytes());
    let mut name_buf = vec![0u8; name_width];
    name_buf[..name.len()].copy_from_slice(name.as_bytes());
    data.extend_from_slice(&name_buf);
    for field in &fields[2..] {
        data.extend_from_slice(&field.to_le_bytes());
    }
    data
}

#[test]
fn test_read_metadata_v45() {
    let data = metadata_bytes(64, &[0, 3, 24, 64, 2048], "Music");
    let header = test_header(45, &[(8, 96), (200, 72), (0, 0), (0, 0), (4096, 500)]);
    let (meta, offsets) = BankMetadata::read(&mut MemReaderRef::new(&data), &header).unwrap();
    assert_eq!(meta.bank_name, "Music");
    assert_eq!(meta.entry_count, 3);
    assert_eq!(meta.entry_metadata_element_size, 24);
    assert_eq!(meta.entry_name_element_size, Some(64));
    assert_eq!(meta.alignment, 2048);
    assert_eq!(meta.compact_format, None);
    assert_eq!(offsets.metadata_segment_offset, 200);
    assert_eq!(offsets.play_region_offset, 4096);
}

#[test]
fn test_read_metadata_short_name_and_fallback_play_region() {
    let data = metadata_bytes(16, &[0, 2, 24, -1, 4], "Short");
    let header = test_header(3, &[(8, 40), (100, 48), (0, 0), (0, 0)]);
    let (meta, offsets) = BankMetadata::read(&mut MemReaderRef::new(&data), &header).unwrap();
    assert_eq!(meta.bank_name, "Short");
    assert_eq!(meta.entry_name_element_size, None);
    assert_eq!(offsets.play_region_offset, 100 + 2 * 24);
}

#[test]
fn test_read_metadata_compact_and_entry_names() {
    let compact = BankFlags::COMPACT | BankFlags::ENTRY_NAMES | BankFlags::TYPE_STREAMING;
    let data = metadata_bytes(64, &[compact as i32, 1, 4, -1, 2048, 0x1234], "C");
    let header = test_header(44, &[(8, 96), (200, 4), (0, 0), (300, 64), (2048, 10)]);
    let (meta, _) = BankMetadata::read(&mut MemReaderRef::new(&data), &header).unwrap();
    assert!(meta.flags.is_compact());
    assert!(meta.flags.is_streaming());
    assert_eq!(meta.compact_format, Some(0x1234));
    assert_eq!(meta.entry_name_element_size, Some(0));
}

#[test]
fn test_read_metadata_non_utf8_name() {
    let mut data = metadata_bytes(64, &[0, 1, 24, -1, 4], "Bad");
    data[16] = 0xFF;
    let header = test_header(45, &[(8, 96), (104, 24), (0, 0), (0, 0), (128, 0)]);
    let err = BankMetadata::read(&mut MemReaderRef::new(&data), &header).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<XwbError>(),
        Some(XwbError::NonUtf8BankName)
    ));
}

#[test]
fn test_read_metadata_v1_implicit_sizes() {
    let data = metadata_bytes(64, &[0, 1], "Old");
    let header = test_header(1, &[(8, 72), (80, 20), (0, 0), (0, 0)]);
    let (meta, offsets) = BankMetadata::read(&mut MemReaderRef::new(&data), &header).unwrap();
    assert_eq!(meta.entry_metadata_element_size, V1_ENTRY_METADATA_SIZE);
    assert_eq!(meta.alignment, 0);
    assert_eq!(offsets.metadata_segment_offset, 80);
    assert_eq!(offsets.play_region_offset, 100);
}

#[test]
fn test_write_fixed_profile_metadata() {
    use std::time::Duration;
    let meta = BankMetadata {
        flags: BankFlags(BankFlags::COMPACT),
        entry_count: 2,
        bank_name: "Wave Bank".to_string(),
        entry_metadata_element_size: 24,
        entry_name_element_size: None,
        alignment: 4,
        compact_format: Some(7),
        build_time: Some(UNIX_EPOCH + Duration::from_secs(1_000_000_000)),
    };
    let mut out = Vec::new();
    meta.write_fixed_profile(&mut out).unwrap();
    assert_eq!(out.len(), 4 + 4 + 64 + 4 * 4 + 8);
    assert_eq!(&out[8..17], b"Wave Bank");
    assert!(out[17..72].iter().all(|&b| b == 0));
    assert_eq!(&out[76..80], &(-1i32).to_le_bytes());
    assert_eq!(&out[84..88], &7u32.to_le_bytes());
    let ticks = u64::from_le_bytes(out[88..96].try_into().unwrap());
    assert_eq!(ticks, 1_000_000_000 * 10_000_000 + FILETIME_UNIX_EPOCH);
}

#[test]
fn test_validate_bank_name() {
    let mut meta = BankMetadata {
        bank_name: "x".repeat(65),
        ..Default::default()
    };
    assert!(matches!(
        meta.validate(),
        Err(XwbError::BankNameTooLong(65))
    ));
    meta.bank_name = "x".repeat(64);
    assert!(meta.validate().is_ok());
    meta.bank_name = "Bänk".to_string();
    assert!(meta.validate().is_ok());
    let err = meta.write_fixed_profile(&mut Vec::new()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<XwbError>(),
        Some(XwbError::NonAsciiBankName(_))
    ));
}
