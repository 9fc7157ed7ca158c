//! Frame checksum.
//!
//! The accessory firmware computes a CRC-CCITT (polynomial 0x1021, seed
//! 0xFFFF) over bit-reversed input bytes and transmits the bit-reversed
//! remainder. Both sides must agree bit for bit, otherwise every frame is
//! silently discarded by the receiver.

/// CRC-CCITT generator polynomial
pub const POLYNOMIAL: u16 = 0x1021;

/// Initial remainder
pub const SEED: u16 = 0xffff;

/// Bit reversal of every nibble value
pub const BIT_REVERSE: [u8; 16] = [
    0x0, 0x8, 0x4, 0xc, 0x2, 0xa, 0x6, 0xe, 0x1, 0x9, 0x5, 0xd, 0x3, 0xb, 0x7, 0xf,
];

/// MSB-first lookup table for [`POLYNOMIAL`]
pub static CRC_TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut remainder = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            remainder = if remainder & 0x8000 != 0 {
                (remainder << 1) ^ POLYNOMIAL
            } else {
                remainder << 1
            };
            bit += 1;
        }
        table[i] = remainder;
        i += 1;
    }
    table
}

/// Reverses the bit order of a byte through the nibble table
#[inline]
pub fn reverse_byte(byte: u8) -> u8 {
    (BIT_REVERSE[(byte & 0x0f) as usize] << 4) | BIT_REVERSE[(byte >> 4) as usize]
}

/// Computes the frame checksum over `data`
pub fn checksum(data: &[u8]) -> u16 {
    let mut remainder = SEED;
    for &byte in data {
        let index = reverse_byte(byte) ^ (remainder >> 8) as u8;
        remainder = CRC_TABLE[index as usize] ^ (remainder << 8);
    }
    remainder.reverse_bits()
}
