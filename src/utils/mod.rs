pub mod counter;
#[cfg(feature = "utils-crc16")]
pub mod crc16;
pub mod files;
#[cfg(feature = "utils-pcm")]
pub mod pcm;
pub mod struct_pack;
