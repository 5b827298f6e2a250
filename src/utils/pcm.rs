//! Minimal RIFF/WAVE writer for PCM sounds.
use crate::ext::io::*;
use crate::utils::struct_pack::*;
use crate::wavebank::sound::SoundEffect;
use anyhow::Result;
use std::io::{Read, Seek, Write};
use xwb_tool_macro::*;

const WAVE_FORMAT_PCM: u16 = 1;

#[derive(Debug, StructPack, StructUnpack)]
pub struct PcmFormat {
    format_tag: u16,
    channels: u16,
    sample_rate: u32,
    average_bytes_per_second: u32,
    block_align: u16,
    bits_per_sample: u16,
}

impl PcmFormat {
    pub fn from_sound(sound: &SoundEffect) -> Result<Self> {
        let channels = u16::try_from(sound.channels)?;
        let block_align = channels * (sound.bits_per_sample / 8);
        Ok(PcmFormat {
            format_tag: WAVE_FORMAT_PCM,
            channels,
            sample_rate: sound.sample_rate,
            average_bytes_per_second: sound.sample_rate * block_align as u32,
            block_align,
            bits_per_sample: sound.bits_per_sample,
        })
    }
}

pub fn write_pcm<W: Write + Seek, R: Read>(
    format: &PcmFormat,
    mut reader: R,
    mut writer: W,
) -> Result<()> {
    writer.write_all(b"RIFF")?;
    let mut total_size = 0x24u32;
    writer.write_u32(0)?; // Placeholder for total size
    writer.write_all(b"WAVE")?;
    writer.write_all(b"fmt ")?;
    writer.write_u32(16)?;
    format.pack(&mut writer)?;
    writer.write_all(b"data")?;
    let mut data_size = 0u32;
    writer.write_u32(0)?; // Placeholder for data size
    let mut buffer = [0u8; 4096];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        writer.write_all(&buffer[..bytes_read])?;
        data_size = data_size
            .checked_add(bytes_read as u32)
            .ok_or_else(|| anyhow::anyhow!("PCM data does not fit in a RIFF file"))?;
    }
    total_size = total_size
        .checked_add(data_size)
        .ok_or_else(|| anyhow::anyhow!("PCM data does not fit in a RIFF file"))?;
    writer.seek(std::io::SeekFrom::Start(4))?;
    writer.write_u32(total_size)?;
    writer.seek(std::io::SeekFrom::Start(40))?;
    writer.write_u32(data_size)?;
    Ok(())
}

/// Writes `sound` as a WAV file.
pub fn write_sound<W: Write + Seek>(sound: &SoundEffect, writer: W) -> Result<()> {
    let format = PcmFormat::from_sound(sound)?;
    write_pcm(&format, sound.audio_data.as_slice(), writer)
}

#[test]
fn test_write_sound() {
    use crate::wavebank::format::MiniFormatTag;
    let sound = SoundEffect {
        codec: MiniFormatTag::Pcm,
        audio_data: vec![1, 0, 2, 0, 3, 0, 4, 0, 5, 0],
        channels: 1,
        sample_rate: 22050,
        block_alignment: 2,
        bits_per_sample: 16,
        loop_start: 0,
        loop_length: 0,
    };
    let mut out = std::io::Cursor::new(Vec::new());
    write_sound(&sound, &mut out).unwrap();
    let out = out.into_inner();
    assert_eq!(out.len(), 44 + 10);
    assert_eq!(&out[..4], b"RIFF");
    assert_eq!(&out[4..8], &(36u32 + 10).to_le_bytes());
    assert_eq!(&out[8..16], b"WAVEfmt ");
    let mut reader = MemReaderRef::new(&out[20..36]);
    let format = PcmFormat::unpack(&mut reader).unwrap();
    assert_eq!(format.format_tag, 1);
    assert_eq!(format.average_bytes_per_second, 44100);
    assert_eq!(format.block_align, 2);
    assert_eq!(&out[36..40], b"data");
    assert_eq!(&out[40..44], &10u32.to_le_bytes());
    assert_eq!(&out[44..], sound.audio_data.as_slice());
}
