//! Well-known ASCII commands and reply parsing

use crate::error::{ProtocolError, Result};

/// Query the tightening cycle counter
pub const CYCLE_COUNTER: &str = "IC";

/// Offset of the counter digits in a cycle counter reply
const CYCLE_COUNTER_OFFSET: usize = 4;

/// Number of hex digits of the counter
const CYCLE_COUNTER_DIGITS: usize = 8;

/// Extract the counter from a decoded `IC` reply.
///
/// The reply carries the counter as 8 hex digits at offset 4, e.g.
/// `"\x02" "0IC0000002A" CK CK "\x03"` holds 42.
pub fn parse_cycle_counter(reply: &str) -> Result<u32> {
    // Offsets count characters: decoded replies may hold non-ASCII bytes
    let digits: String = reply
        .chars()
        .skip(CYCLE_COUNTER_OFFSET)
        .take(CYCLE_COUNTER_DIGITS)
        .collect();
    if digits.chars().count() < CYCLE_COUNTER_DIGITS {
        return Err(ProtocolError::InvalidReply(format!(
            "cycle counter reply too short: {:?}",
            reply
        )));
    }

    u32::from_str_radix(&digits, 16).map_err(|e| {
        ProtocolError::InvalidReply(format!("cycle counter {:?} is not hex: {}", digits, e))
    })
}
