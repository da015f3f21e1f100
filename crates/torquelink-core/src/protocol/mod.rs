//! MicroTorque ASCII protocol
//!
//! Checksummed ASCII framing, request/reply correlation and bounded retry on
//! top of a [`crate::session::DeviceSession`].

mod ascii;
pub mod commands;
pub mod frame;

pub use ascii::AsciiConnection;
pub use frame::{checksum, decode_text, encode_text, is_valid_message};

/// Start of text
pub const STX: u8 = 0x02;
/// End of text
pub const ETX: u8 = 0x03;
/// Enquiry
pub const ENQ: u8 = 0x05;
/// Acknowledge
pub const ACK: u8 = 0x06;
/// Data link escape; marks the extended frame form
pub const DLE: u8 = 0x10;
/// Negative acknowledge
pub const NAK: u8 = 0x15;

/// Shortest possible valid frame
pub const MIN_FRAME_LEN: usize = 5;

/// Length of an acknowledge/negative-acknowledge frame
pub const ACK_FRAME_LEN: usize = 6;
