use crate::error::{DatumError, Result};

///
/// Limits
///
/// Caller-configured resource limits, threaded explicitly through every
/// construction and merge path that can grow an array.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Limits {
    array_size_limit: usize,
}

impl Limits {
    /// Default cap on array length.
    pub const DEFAULT_ARRAY_SIZE_LIMIT: usize = 100_000;

    #[must_use]
    pub const fn new(array_size_limit: usize) -> Self {
        Self { array_size_limit }
    }

    /// Limits with every cap effectively disabled.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self {
            array_size_limit: usize::MAX,
        }
    }

    #[must_use]
    pub const fn array_size_limit(&self) -> usize {
        self.array_size_limit
    }

    /// Fail with a resource-limit error when `len` exceeds the array cap.
    pub(crate) fn check_array_size(&self, len: usize) -> Result<()> {
        if len > self.array_size_limit {
            return Err(DatumError::resource_limit(format!(
                "array over size limit `{}`",
                self.array_size_limit
            )));
        }

        Ok(())
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::new(Self::DEFAULT_ARRAY_SIZE_LIMIT)
    }
}

///
/// CONSTANTS
///

/// Maximum container nesting depth admitted through any validation seam.
///
/// Scalars have depth zero and each container level adds one. Values deeper
/// than this cannot be constructed, deserialized, or decoded, which keeps
/// every recursive walk over an admitted value stack-bounded.
pub const MAX_DATUM_DEPTH: usize = 100;

/// Fail with a resource-limit error when `depth` exceeds the nesting cap.
pub(crate) fn check_depth(depth: usize) -> Result<()> {
    if depth > MAX_DATUM_DEPTH {
        return Err(DatumError::resource_limit(format!(
            "nesting depth over limit `{MAX_DATUM_DEPTH}`"
        )));
    }

    Ok(())
}
