//! Frame encoding/decoding
//!
//! Frame format:
//! - standard: `STX payload CK CK ETX`
//! - extended: `STX DLE payload CK CK DLE ETX`
//!
//! `CK CK` is the low byte of the arithmetic sum of the payload bytes, written
//! as two ASCII hex digits. Validation locates the checksum from the end of the
//! frame: standard frames sum `[1, len-3)` and read the checksum at `len-3`,
//! extended frames sum `[2, len-4)` and read it at `len-4`.

use super::{DLE, ETX, MIN_FRAME_LEN, STX};

/// Low 8 bits of the byte sum
pub fn checksum(region: &[u8]) -> u8 {
    region.iter().fold(0u8, |sum, &b| sum.wrapping_add(b))
}

fn hex_digit(value: u8) -> u8 {
    b"0123456789ABCDEF"[(value & 0x0f) as usize]
}

fn hex_value(digit: u8) -> Option<u8> {
    (digit as char).to_digit(16).map(|v| v as u8)
}

/// Two ASCII hex digits (upper case) for a checksum
pub fn checksum_field(sum: u8) -> [u8; 2] {
    [hex_digit(sum >> 4), hex_digit(sum)]
}

fn parse_checksum_field(field: &[u8]) -> Option<u8> {
    match field {
        [hi, lo] => Some(hex_value(*hi)? << 4 | hex_value(*lo)?),
        _ => None,
    }
}

/// Checksummed region and checksum field of a frame with valid markers
fn split(msg: &[u8]) -> Option<(&[u8], &[u8])> {
    if msg.len() < MIN_FRAME_LEN || msg[0] != STX || msg[msg.len() - 1] != ETX {
        return None;
    }

    let len = msg.len();
    if msg[1] == DLE {
        Some((msg.get(2..len - 4).unwrap_or(&[]), &msg[len - 4..len - 2]))
    } else {
        Some((&msg[1..len - 3], &msg[len - 3..len - 1]))
    }
}

/// Check markers, length and checksum of a received frame.
///
/// Anything that fails is simply not a usable message; there is no error.
pub fn is_valid_message(msg: &[u8]) -> bool {
    split(msg)
        .and_then(|(region, field)| {
            parse_checksum_field(field).map(|expected| expected == checksum(region))
        })
        .unwrap_or(false)
}

/// Payload of a valid frame
pub fn payload(msg: &[u8]) -> Option<&[u8]> {
    if is_valid_message(msg) {
        split(msg).map(|(region, _)| region)
    } else {
        None
    }
}

/// Build a standard frame around `payload`
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 4);
    frame.push(STX);
    frame.extend_from_slice(payload);
    frame.extend_from_slice(&checksum_field(checksum(payload)));
    frame.push(ETX);
    frame
}

/// Build an extended frame around `payload`
pub fn encode_extended(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 6);
    frame.push(STX);
    frame.push(DLE);
    frame.extend_from_slice(payload);
    frame.extend_from_slice(&checksum_field(checksum(payload)));
    frame.push(DLE);
    frame.push(ETX);
    frame
}

/// Decode bytes as single-byte (ISO 8859-1) text
pub fn decode_text(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Encode text as single-byte (ISO 8859-1); unrepresentable characters become `?`
pub fn encode_text(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}
