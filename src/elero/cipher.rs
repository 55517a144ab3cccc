//! # Elero Block Scrambling
//!
//! Reversible scrambling of the 8-byte payload block carried by every Elero
//! frame.
//!
//! Encoding runs four steps over the block:
//! 1. Parity nibble of the four byte pairs written to byte 7
//! 2. Running nibble-wise addition starting at 0xFE, decreasing by 0x22
//! 3. XOR of bytes 2..8 with the two rolling-code bytes
//! 4. Nibble substitution through [`ENCODE_TABLE`]
//!
//! Decoding inverts the steps. The rolling code in bytes 0 and 1 is kept, so
//! the decoded block can be fed straight back into [`encode_block`].

use super::protocol::ELERO_BLOCK_SIZE;

/// Nibble substitution table for encoding
pub const ENCODE_TABLE: [u8; 16] = [
    0x08, 0x02, 0x0d, 0x01, 0x0f, 0x0e, 0x07, 0x05, 0x09, 0x0c, 0x00, 0x0a, 0x03, 0x04, 0x0b, 0x06,
];

/// Inverse of [`ENCODE_TABLE`], generated at compile time
pub const DECODE_TABLE: [u8; 16] = invert_table(&ENCODE_TABLE);

/// Start value of the running nibble offset
const R20_START: u8 = 0xFE;

/// Running offset at block index 2 (two steps past the start)
const R20_DATA_START: u8 = 0xBA;

/// Decrement applied to the running offset per byte
const R20_STEP: u8 = 0x22;

const fn invert_table(table: &[u8; 16]) -> [u8; 16] {
    let mut inverse = [0u8; 16];
    let mut i = 0;

    while i < 16 {
        inverse[table[i] as usize] = i as u8;
        i += 1;
    }

    inverse
}

/// Parity (0 or 1) of the set bits in a byte
pub fn bit_parity(byte: u8) -> u8 {
    (byte.count_ones() & 0x01) as u8
}

/// Compute the parity byte for a block
///
/// Bit 7..4 hold the XOR of the parities of byte pairs (0,1), (2,3), (4,5)
/// and (6,7), in that order.
pub fn parity_byte(block: &[u8; ELERO_BLOCK_SIZE]) -> u8 {
    let mut p: u8 = 0;

    for pair in block.chunks_exact(2) {
        p |= bit_parity(pair[0]) ^ bit_parity(pair[1]);
        p <<= 1;
    }

    p << 3
}

fn add_r20(block: &mut [u8; ELERO_BLOCK_SIZE], mut r20: u8, start: usize, end: usize) {
    for byte in &mut block[start..end] {
        let low = byte.wrapping_add(r20) & 0x0F;
        let high = (*byte & 0xF0).wrapping_add(r20 & 0xF0);
        *byte = high | low;
        r20 = r20.wrapping_sub(R20_STEP);
    }
}

fn sub_r20(block: &mut [u8; ELERO_BLOCK_SIZE], mut r20: u8, start: usize, end: usize) {
    for byte in &mut block[start..end] {
        let low = byte.wrapping_sub(r20) & 0x0F;
        let high = (*byte & 0xF0).wrapping_sub(r20 & 0xF0);
        *byte = high | low;
        r20 = r20.wrapping_sub(R20_STEP);
    }
}

fn xor_data(block: &mut [u8; ELERO_BLOCK_SIZE], xor0: u8, xor1: u8) {
    for pair in block[2..].chunks_exact_mut(2) {
        pair[0] ^= xor0;
        pair[1] ^= xor1;
    }
}

fn substitute(block: &mut [u8; ELERO_BLOCK_SIZE], table: &[u8; 16]) {
    for byte in block.iter_mut() {
        let high = table[usize::from(*byte >> 4)];
        let low = table[usize::from(*byte & 0x0F)];
        *byte = (high << 4) | low;
    }
}

/// Scramble a block in place
///
/// Bytes 0 and 1 must already hold the rolling code. Byte 7 is replaced by
/// the parity byte.
pub fn encode_block(block: &mut [u8; ELERO_BLOCK_SIZE]) {
    let xor0 = block[0];
    let xor1 = block[1];

    block[7] = parity_byte(block);
    add_r20(block, R20_START, 0, ELERO_BLOCK_SIZE);
    xor_data(block, xor0, xor1);
    substitute(block, &ENCODE_TABLE);
}

/// Unscramble a block in place
pub fn decode_block(block: &mut [u8; ELERO_BLOCK_SIZE]) {
    substitute(block, &DECODE_TABLE);
    sub_r20(block, R20_START, 0, 2);

    let xor0 = block[0];
    let xor1 = block[1];
    xor_data(block, xor0, xor1);
    sub_r20(block, R20_DATA_START, 2, ELERO_BLOCK_SIZE);
}
