//! Storage byte format and the zero-copy views over it.
//!
//! A raw datum is one tag byte followed by the payload:
//!
//! ```text
//! 1  null      (no payload)
//! 2  false     (no payload)
//! 3  true      (no payload)
//! 4  number    8-byte LE IEEE-754 bits
//! 5  string    u32 LE length + bytes
//! 6  binary    u32 LE length + bytes
//! 7  array     u32 LE count + count x u32 LE offsets + elements
//! 8  object    u32 LE count + count x u32 LE offsets + pairs
//! ```
//!
//! Container offsets are element starts relative to the region after the
//! offset table; the first must be 0 and they increase strictly, so the
//! spans exactly partition the region. An object pair is a u32 LE key
//! length, the key bytes, and the element; pairs are in key byte order.
//! `codec::decode` validates a whole buffer once, then `BufArray` /
//! `BufObject` materialize elements lazily and infallibly, aliasing the
//! underlying `Bytes`.

pub(crate) mod codec;

mod view;

pub(crate) use view::{BufArray, BufObject};

// value tags
pub(crate) const TAG_NULL: u8 = 1;
pub(crate) const TAG_FALSE: u8 = 2;
pub(crate) const TAG_TRUE: u8 = 3;
pub(crate) const TAG_NUM: u8 = 4;
pub(crate) const TAG_STR: u8 = 5;
pub(crate) const TAG_BINARY: u8 = 6;
pub(crate) const TAG_ARR: u8 = 7;
pub(crate) const TAG_OBJ: u8 = 8;

/// Width of every length, count, and offset field.
pub(crate) const LEN_SIZE: usize = 4;

/// Width of a number payload.
pub(crate) const NUM_SIZE: usize = 8;

/// Read a `u32 LE` field. Callers hold the bounds invariant.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn read_u32(bytes: &[u8], at: usize) -> usize {
    let mut raw = [0u8; LEN_SIZE];
    raw.copy_from_slice(&bytes[at..at + LEN_SIZE]);

    u32::from_le_bytes(raw) as usize
}

/// Read the LE IEEE bits of a number payload.
pub(crate) fn read_f64(bytes: &[u8], at: usize) -> f64 {
    let mut raw = [0u8; NUM_SIZE];
    raw.copy_from_slice(&bytes[at..at + NUM_SIZE]);

    f64::from_le_bytes(raw)
}
