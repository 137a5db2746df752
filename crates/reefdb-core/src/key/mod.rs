//! Order-preserving index key encoding.
//!
//! Index entries are raw byte strings compared with `memcmp`, so every
//! datum that can serve as a key is rendered with a printable tag byte
//! naming its kind and a payload whose byte order agrees with
//! [`Datum`](crate::datum::Datum) order within the kind.
//!
//! Secondary keys are truncated to a fixed budget and composed with the
//! primary key and an optional multi-index tag into a single entry;
//! [`extract_all`] and friends take such an entry apart again.

mod compose;
mod encode;


pub use compose::{
    KeyComponents, extract_all, extract_primary, extract_secondary, extract_tag,
    extract_truncated_secondary, key_is_truncated,
};

/// Hard cap on a composed index entry, in bytes.
pub const MAX_KEY_SIZE: usize = 250;

/// Hard cap on an encoded primary key, in bytes.
pub const MAX_PRIMARY_KEY_SIZE: usize = 128;

/// Width of the multi-index tag when present.
pub const TAG_SIZE: usize = 8;

/// The two offset bytes at the end of every composed entry.
pub const OFFSET_TRAILER_SIZE: usize = 2;

/// High bit of the first secondary-key byte. Set for [`SkeyVersion::Current`]
/// keys; stored keys otherwise begin with an ASCII tag byte, leaving the bit
/// free to carry the version.
const SKEY_VERSION_FLAG: u8 = 0x80;

/// Budget left for the secondary-key portion once a primary key of the
/// given encoded length, a tag slot, and the offset trailer are accounted
/// for. Callers keep `primary_key_len` within [`MAX_PRIMARY_KEY_SIZE`].
#[must_use]
pub const fn trunc_size(primary_key_len: usize) -> usize {
    MAX_KEY_SIZE - primary_key_len - TAG_SIZE - OFFSET_TRAILER_SIZE
}

/// The secondary budget under the largest admissible primary key. Keys cut
/// to this length are comparable regardless of the primary key they were
/// composed with.
#[must_use]
pub const fn max_trunc_size() -> usize {
    trunc_size(MAX_PRIMARY_KEY_SIZE)
}

///
/// SkeyVersion
///
/// Secondary-key format generation. `Legacy` writes string and binary
/// payloads raw; `Current` escapes NUL and the escape byte so the `\0`
/// array separator is unambiguous, and marks the entry by setting the high
/// bit of its first byte.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SkeyVersion {
    Legacy,
    Current,
}

impl SkeyVersion {
    /// Recover the version a composed entry was written under.
    ///
    /// The legacy maxval filler (`0xFF`) also carries the high bit, but it
    /// appears only in scan bounds, never in stored entries.
    #[must_use]
    pub fn from_key(key: &[u8]) -> Self {
        match key.first() {
            Some(first) if first & SKEY_VERSION_FLAG != 0 => Self::Current,
            _ => Self::Legacy,
        }
    }
}
