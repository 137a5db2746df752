use bytes::Bytes;
use std::{
    borrow::{Borrow, Cow},
    fmt,
    str::Utf8Error,
};

///
/// Text
///
/// Shared UTF-8 string payload. Ordering and equality are plain byte order,
/// which is exactly what object-field sorting and the index key encoding
/// require, so no UTF-8 decode happens on any comparison path. The payload
/// may alias a storage buffer.
///

#[derive(Clone, Eq, Ord, PartialEq, PartialOrd)]
pub struct Text(Bytes);

impl Text {
    /// Wrap shared bytes, checking UTF-8.
    pub(crate) fn from_utf8(bytes: Bytes) -> Result<Self, Utf8Error> {
        std::str::from_utf8(&bytes)?;

        Ok(Self(bytes))
    }

    /// Wrap bytes a validation pass has already proven to be UTF-8.
    pub(crate) fn from_validated(bytes: Bytes) -> Self {
        debug_assert!(std::str::from_utf8(&bytes).is_ok());

        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Borrow as `&str`; fails only if the UTF-8 invariant was bypassed.
    pub fn try_str(&self) -> Result<&str, Utf8Error> {
        std::str::from_utf8(&self.0)
    }

    /// Lossy rendering for diagnostics.
    #[must_use]
    pub fn to_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// lookup by raw bytes shares the byte-order Ord, so map access stays coherent
impl Borrow<[u8]> for Text {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Text {
    fn from(s: &str) -> Self {
        Self(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Text {
    fn from(s: String) -> Self {
        Self(Bytes::from(s.into_bytes()))
    }
}

impl PartialEq<str> for Text {
    fn eq(&self, other: &str) -> bool {
        self.0 == other.as_bytes()
    }
}

impl fmt::Debug for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_lossy())
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_lossy())
    }
}
