//! Bit-at-a-time CRC engine and the CRC-16 variant used for sound bank checksums.

/// Reverses the order of the low `num_bits` bits of `value`.
///
/// Bits above `num_bits` are ignored, widths above 64 are treated as 64.
pub fn reverse_bits(value: u64, num_bits: u32) -> u64 {
    let num_bits = num_bits.min(64);
    let mut result = 0;
    for i in 0..num_bits {
        if (value >> i) & 1 != 0 {
            result |= 1 << (num_bits - 1 - i);
        }
    }
    result
}

fn width_mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1 << width) - 1
    }
}

/// Parameters of a CRC variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CrcParams {
    pub width: u32,
    pub poly: u64,
    pub initial_remainder: u64,
    pub reflect_input_bytes: bool,
    pub reflect_final_output: bool,
    pub xor_final_output: u64,
}

/// CRC-16/B: poly 0x1021, reflected, init and final xor 0xFFFF.
pub const CRC16B: CrcParams = CrcParams {
    width: 16,
    poly: 0x1021,
    initial_remainder: 0xFFFF,
    reflect_input_bytes: true,
    reflect_final_output: true,
    xor_final_output: 0xFFFF,
};

fn update_remainder(params: &CrcParams, mut remainder: u64, data: &[u8]) -> u64 {
    let top_bit = 1u64 << (params.width - 1);
    let mask = width_mask(params.width);
    for &byte in data {
        let byte = if params.reflect_input_bytes {
            reverse_bits(byte as u64, 8)
        } else {
            byte as u64
        };
        for j in (0..8).rev() {
            let mut top = remainder & top_bit;
            remainder = (remainder << 1) & mask;
            if (byte >> j) & 1 != 0 {
                top ^= top_bit;
            }
            if top != 0 {
                remainder ^= params.poly;
            }
        }
    }
    remainder
}

fn finish_remainder(params: &CrcParams, remainder: u64) -> u64 {
    let remainder = if params.reflect_final_output {
        reverse_bits(remainder, params.width)
    } else {
        remainder
    };
    remainder ^ params.xor_final_output
}

/// Computes a CRC of `data` one bit at a time.
///
/// `width` must be between 1 and 64.
pub fn calc_crc(
    width: u32,
    data: &[u8],
    poly: u64,
    initial_remainder: u64,
    reflect_input_bytes: bool,
    reflect_final_output: bool,
    xor_final_output: u64,
) -> u64 {
    let params = CrcParams {
        width,
        poly,
        initial_remainder,
        reflect_input_bytes,
        reflect_final_output,
        xor_final_output,
    };
    let remainder = update_remainder(&params, initial_remainder, data);
    finish_remainder(&params, remainder)
}

/// Incremental CRC-16/B calculator.
pub struct Crc16B {
    remainder: u64,
}

impl Crc16B {
    pub fn new() -> Self {
        Crc16B {
            remainder: CRC16B.initial_remainder,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.remainder = update_remainder(&CRC16B, self.remainder, data);
    }

    pub fn value(&self) -> u16 {
        finish_remainder(&CRC16B, self.remainder) as u16
    }
}

pub fn calc_crc16b(data: &[u8]) -> u16 {
    let mut crc = Crc16B::new();
    crc.update(data);
    crc.value()
}

/// Sound bank checksum: CRC-16/B of `data`, least significant byte first.
pub fn soundbank_checksum(data: &[u8]) -> [u8; 2] {
    calc_crc16b(data).to_le_bytes()
}

#[cfg(test)]
const SOUNDBANK_SAMPLE: &[u8] = b"\
\x01\x01\x00\x00\x00\x00\x00\x10\x00\x01\x01\x00\x0b\x00\x00\x00\
\xd6\x00\x00\x00\xff\xff\xff\xff\x01\x01\x00\x00\xff\xff\xff\xff\
\xff\xff\xff\xff\xff\xff\xff\xff\x8a\x00\x00\x00\xdb\x00\x00\x00\
\xfb\x00\x00\x00\xca\x00\x00\x00911\x00\x00\x00\x00\x00\
\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\
\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\
\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\
\x00\x00\x00\x00\x00\x00\x00\x00911\x00\x00\x00\x00\x00\
\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\
\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\
\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\x00\
\x00\x00\x00\x00\x00\x00\x00\x00\x00\x01\x00\xb4\x00\x00\x00\x0c\
\x00\x00\x00\x00\x04\xca\x00\x00\x00\xff\xff\xff\xff\xff\xff\xff\
\xff\xff\xff\xff\xff\xff\xff\xff\xff\xff\xff\xff\xff\xff\xff\xff\
\xff\xff\xff\xff\xff\x00\x00\xff\xff\x01\x01\x00\x00\xff\xffG\
M_BGM_911\x00";

#[test]
fn test_reverse_bits() {
    // (input, expected), reversed over the input's own bit length
    let known = [
        (0b11111111u64, 0b11111111u64),
        (0b11110000, 0b00001111),
        (0b11110001, 0b10001111),
        (0b11000000, 0b00000011),
        (0b10000000, 0b00000001),
        (0b10, 0b01),
        (0b1001, 0b1001),
        (0b1101, 0b1011),
        (0b11000000000000000000001, 0b10000000000000000000011),
    ];
    for (input, expected) in known {
        let bits = 64 - input.leading_zeros();
        assert_eq!(reverse_bits(input, bits), expected, "input {:#b}", input);
    }
    assert_eq!(reverse_bits(0b11110000, 8), 0b00001111);
    assert_eq!(reverse_bits(0xFF00, 8), 0);
    assert_eq!(reverse_bits(0b1, 0), 0);
    assert_eq!(reverse_bits(1, 64), 1 << 63);
}

#[test]
fn test_crc16b() {
    assert_eq!(calc_crc16b(SOUNDBANK_SAMPLE), 0x9D88);
    assert_eq!(
        calc_crc(16, SOUNDBANK_SAMPLE, 0x1021, 0xFFFF, true, true, 0xFFFF),
        0x9D88
    );
}

#[test]
fn test_crc16b_incremental() {
    let mut crc = Crc16B::new();
    let (a, b) = SOUNDBANK_SAMPLE.split_at(77);
    crc.update(a);
    crc.update(b);
    assert_eq!(crc.value(), 0x9D88);
}

#[test]
fn test_crc_check_values() {
    // "123456789" check values from the CRC catalogue
    assert_eq!(calc_crc16b(b"123456789"), 0x906E);
    assert_eq!(
        calc_crc(16, b"123456789", 0x1021, 0xFFFF, false, false, 0),
        0x29B1
    );
    assert_eq!(
        calc_crc(32, b"123456789", 0x04C11DB7, 0xFFFFFFFF, true, true, 0xFFFFFFFF),
        0xCBF43926
    );
}

#[test]
fn test_soundbank_checksum() {
    assert_eq!(soundbank_checksum(SOUNDBANK_SAMPLE), [0x88, 0x9D]);
}
