//! Fixed-layout binary event records.
//!
//! Each record is 56 bytes, little-endian:
//!
//! | offset | size | field                 |
//! |--------|------|-----------------------|
//! | 0      | 1    | mode                  |
//! | 1      | 3    | padding (zero)        |
//! | 4      | 4    | frame number (`i32`)  |
//! | 8      | 4    | chip number (`i32`)   |
//! | 12     | 4    | x (`i32`)             |
//! | 16     | 4    | y (`i32`)             |
//! | 20     | 36   | 3x3 pulse heights (`f32`) |

use crate::{Error, Result};
use ccdgrade_core::{Event, NEIGHBORHOOD};

/// Size of one encoded event record in bytes.
pub const RECORD_SIZE: usize = 56;

const FRAME: usize = 4;
const CHIP: usize = 8;
const X: usize = 12;
const Y: usize = 16;
const DATA: usize = 20;

#[inline]
fn word(bytes: &[u8], offset: usize) -> [u8; 4] {
    [
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ]
}

#[inline]
fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes(word(bytes, offset))
}

#[inline]
fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes(word(bytes, offset))
}

/// Decodes one record into an unclassified [`Event`].
///
/// # Errors
/// Returns [`Error::InvalidFormat`] if `bytes` is not exactly one record.
pub fn decode_record(bytes: &[u8]) -> Result<Event> {
    if bytes.len() != RECORD_SIZE {
        return Err(Error::InvalidFormat(format!(
            "event record must be {RECORD_SIZE} bytes, got {}",
            bytes.len()
        )));
    }
    Ok(decode_unchecked(bytes))
}

/// Decodes a slice already known to hold one full record.
pub(crate) fn decode_unchecked(bytes: &[u8]) -> Event {
    let mut data = [0.0f32; NEIGHBORHOOD];
    for (i, value) in data.iter_mut().enumerate() {
        *value = read_f32(bytes, DATA + 4 * i);
    }

    Event::new(read_i32(bytes, X), read_i32(bytes, Y), data)
        .with_frame(read_i32(bytes, FRAME), read_i32(bytes, CHIP))
        .with_mode(bytes[0])
}

/// Encodes an event into its record layout. Grading results are not stored.
#[must_use]
pub fn encode_record(event: &Event) -> [u8; RECORD_SIZE] {
    let mut out = [0u8; RECORD_SIZE];
    out[0] = event.mode;
    out[FRAME..FRAME + 4].copy_from_slice(&event.frame.to_le_bytes());
    out[CHIP..CHIP + 4].copy_from_slice(&event.chip.to_le_bytes());
    out[X..X + 4].copy_from_slice(&event.x.to_le_bytes());
    out[Y..Y + 4].copy_from_slice(&event.y.to_le_bytes());
    for (i, value) in event.data.iter().enumerate() {
        let at = DATA + 4 * i;
        out[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }
    out
}
