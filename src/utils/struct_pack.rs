//! Traits for fixed-layout little endian records.
use anyhow::Result;
use std::io::{Read, Seek, Write};
use xwb_tool_macro::struct_unpack_impl_for_num;

pub trait StructUnpack: Sized {
    fn unpack<R: Read + Seek>(reader: R) -> Result<Self>;
}

pub trait StructPack: Sized {
    fn pack<W: Write>(&self, writer: &mut W) -> Result<()>;
}

struct_unpack_impl_for_num!(u16);
struct_unpack_impl_for_num!(u32);
struct_unpack_impl_for_num!(u64);
struct_unpack_impl_for_num!(i32);

#[test]
fn test_num_pack_is_little_endian() {
    let mut out = Vec::new();
    0x11223344u32.pack(&mut out).unwrap();
    (-2i32).pack(&mut out).unwrap();
    assert_eq!(out, [0x44, 0x33, 0x22, 0x11, 0xFE, 0xFF, 0xFF, 0xFF]);
    let mut reader = crate::ext::io::MemReaderRef::new(&out);
    assert_eq!(u32::unpack(&mut reader).unwrap(), 0x11223344);
    assert_eq!(i32::unpack(&mut reader).unwrap(), -2);
}
