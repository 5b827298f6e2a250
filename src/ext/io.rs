//! Little endian read/write helpers and an in-memory seekable reader.
use std::io::*;

/// Reads ahead without moving the stream position.
pub trait Peek {
    fn peek(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Returns `false` when fewer than `data.len()` bytes are left.
    fn peek_and_equal(&mut self, data: &[u8]) -> Result<bool> {
        let mut buf = vec![0u8; data.len()];
        let read = self.peek(&mut buf)?;
        Ok(read == data.len() && buf == data)
    }
}

impl<T: Read + Seek> Peek for T {
    fn peek(&mut self, buf: &mut [u8]) -> Result<usize> {
        let current_pos = self.stream_position()?;
        let mut total = 0;
        while total < buf.len() {
            let read = self.read(&mut buf[total..])?;
            if read == 0 {
                break;
            }
            total += read;
        }
        self.seek(SeekFrom::Start(current_pos))?;
        Ok(total)
    }
}

pub trait ReadExt {
    fn read_i32(&mut self) -> Result<i32>;
    fn read_u32(&mut self) -> Result<u32>;

    /// Reads a fixed width, null padded text field.
    ///
    /// Everything from the first null byte on is dropped.
    fn read_fstring(&mut self, len: usize) -> Result<String>;

    fn read_exact_vec(&mut self, len: usize) -> Result<Vec<u8>>;
}

impl<T: Read> ReadExt for T {
    fn read_i32(&mut self) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }
    fn read_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_fstring(&mut self, len: usize) -> Result<String> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        if let Some(pos) = buf.iter().position(|&b| b == 0) {
            buf.truncate(pos);
        }
        String::from_utf8(buf).map_err(|e| Error::new(ErrorKind::InvalidData, e))
    }

    fn read_exact_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }
}

pub trait WriteExt {
    fn write_u32(&mut self, value: u32) -> Result<()>;

    /// Writes `value` as exactly `len` bytes, one byte per character, null padded.
    ///
    /// Only ASCII text is accepted.
    fn write_fstring(&mut self, value: &str, len: usize) -> Result<()>;
}

impl<T: Write> WriteExt for T {
    fn write_u32(&mut self, value: u32) -> Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    fn write_fstring(&mut self, value: &str, len: usize) -> Result<()> {
        if !value.is_ascii() {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("String '{}' contains non-ASCII characters", value),
            ));
        }
        let bytes = value.as_bytes();
        if bytes.len() > len {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!(
                    "String is {} bytes long, field only holds {}",
                    bytes.len(),
                    len
                ),
            ));
        }
        self.write_all(bytes)?;
        self.write_all(&vec![0u8; len - bytes.len()])
    }
}

/// A seekable reader over a borrowed byte slice.
///
/// Seeking past the end is an error, so offsets read from a file are checked
/// as soon as they are used.
pub struct MemReaderRef<'a> {
    data: &'a [u8],
    pos: usize,
}

impl std::fmt::Debug for MemReaderRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemReaderRef")
            .field("pos", &self.pos)
            .field("data_length", &self.data.len())
            .finish_non_exhaustive()
    }
}

impl<'a> MemReaderRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        MemReaderRef { data, pos: 0 }
    }
}

impl Read for MemReaderRef<'_> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.pos >= self.data.len() {
            return Ok(0);
        }
        let bytes_to_read = buf.len().min(self.data.len() - self.pos);
        buf[..bytes_to_read].copy_from_slice(&self.data[self.pos..self.pos + bytes_to_read]);
        self.pos += bytes_to_read;
        Ok(bytes_to_read)
    }
}

impl Seek for MemReaderRef<'_> {
    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => i128::from(offset),
            SeekFrom::End(offset) => self.data.len() as i128 + i128::from(offset),
            SeekFrom::Current(offset) => self.pos as i128 + i128::from(offset),
        };
        if new_pos < 0 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Seek resulted in a negative position",
            ));
        }
        if new_pos > self.data.len() as i128 {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                "Seek position is beyond the end of the data",
            ));
        }
        self.pos = new_pos as usize;
        Ok(self.pos as u64)
    }

    fn stream_position(&mut self) -> Result<u64> {
        Ok(self.pos as u64)
    }

    fn rewind(&mut self) -> Result<()> {
        self.pos = 0;
        Ok(())
    }
}

#[test]
fn test_read_fstring_strips_padding() {
    let mut reader = MemReaderRef::new(b"Bank\0\0\0\0rest");
    assert_eq!(reader.read_fstring(8).unwrap(), "Bank");
    assert_eq!(reader.stream_position().unwrap(), 8);
}

#[test]
fn test_write_fstring() {
    let mut out = Vec::new();
    out.write_fstring("abc", 6).unwrap();
    assert_eq!(out, b"abc\0\0\0");
    assert!(out.write_fstring("toolong", 4).is_err());
    assert!(out.write_fstring("ü", 4).is_err());
}

#[test]
fn test_mem_reader_seek_bounds() {
    let mut reader = MemReaderRef::new(&[1, 2, 3, 4]);
    assert_eq!(reader.seek(SeekFrom::End(-1)).unwrap(), 3);
    let mut last = [0u8; 1];
    reader.read_exact(&mut last).unwrap();
    assert_eq!(last, [4]);
    assert!(reader.seek(SeekFrom::Start(5)).is_err());
    assert!(reader.seek(SeekFrom::Current(-10)).is_err());
    reader.rewind().unwrap();
    assert_eq!(reader.read_i32().unwrap(), 0x04030201);
}

#[test]
fn test_peek_keeps_position() {
    let mut reader = MemReaderRef::new(b"WBND\x2d\0\0\0");
    assert!(reader.peek_and_equal(b"WBND").unwrap());
    assert!(!reader.peek_and_equal(b"WBNDX\0\0\0\0").unwrap());
    assert_eq!(reader.stream_position().unwrap(), 0);
    reader.seek(SeekFrom::Start(4)).unwrap();
    assert!(reader.peek_and_equal(b"\x2d\0").unwrap());
    assert_eq!(reader.read_i32().unwrap(), 45);
}
