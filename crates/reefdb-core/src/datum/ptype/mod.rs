pub(crate) mod binary;
pub(crate) mod geometry;
pub(crate) mod literal;
pub(crate) mod time;

use crate::{
    datum::{Datum, DatumKind},
    error::{DatumError, Result},
};
use std::fmt;

/// Reserved object field carrying the pseudo-type discriminator.
pub const PTYPE_FIELD: &str = "$reql_type$";

///
/// PtypeTag
///
/// Closed set of pseudo-type discriminators. Variants stay in tag-name order;
/// cross-tag comparison relies on the derived `Ord`.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum PtypeTag {
    Binary,
    Geometry,
    Literal,
    Time,
}

impl PtypeTag {
    /// Tag payload as it appears under the reserved field.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Binary => "BINARY",
            Self::Geometry => "GEOMETRY",
            Self::Literal => "LITERAL",
            Self::Time => "TIME",
        }
    }

    /// Pseudo-type-aware display name for error messages.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Binary => "PTYPE<BINARY>",
            Self::Geometry => "PTYPE<GEOMETRY>",
            Self::Literal => "PTYPE<LITERAL>",
            Self::Time => "PTYPE<TIME>",
        }
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            b"BINARY" => Some(Self::Binary),
            b"GEOMETRY" => Some(Self::Geometry),
            b"LITERAL" => Some(Self::Literal),
            b"TIME" => Some(Self::Time),
            _ => None,
        }
    }
}

impl fmt::Display for PtypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

///
/// PtypeAllowance
///
/// Explicit permission set threaded through construction seams. Only the
/// literal pseudo-type is conditionally legal: it is a merge directive, not a
/// storable value, so it is admitted only while building merge or update
/// arguments.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PtypeAllowance {
    literal: bool,
}

impl PtypeAllowance {
    /// No conditional pseudo-types allowed (the default for documents).
    #[must_use]
    pub const fn none() -> Self {
        Self { literal: false }
    }

    /// Allow literal pseudo-types.
    #[must_use]
    pub const fn with_literal() -> Self {
        Self { literal: true }
    }

    #[must_use]
    pub const fn literal_allowed(&self) -> bool {
        self.literal
    }
}

/// Sanitize a freshly built object that may carry the reserved type field.
///
/// BINARY rewrites into the native binary cell, TIME canonicalizes its
/// timezone, LITERAL and GEOMETRY validate shape in place. Objects without
/// the reserved field pass through untouched.
pub(crate) fn sanitize_object(datum: Datum, allowance: PtypeAllowance) -> Result<Datum> {
    debug_assert!(datum.kind() == DatumKind::Object);

    let Some(tag_datum) = datum.get_field_opt(PTYPE_FIELD) else {
        return Ok(datum);
    };
    let tag = tag_datum.as_str()?;

    match PtypeTag::from_bytes(tag.as_bytes()) {
        Some(PtypeTag::Time) => time::sanitize(datum),
        Some(PtypeTag::Binary) => binary::from_ptype(&datum),
        Some(PtypeTag::Literal) => {
            if !allowance.literal_allowed() {
                return Err(DatumError::logic(
                    "stray literal keyword found: literal is only legal inside \
                     merge or update arguments and cannot nest inside other literals",
                ));
            }
            literal::validate(&datum)?;

            Ok(datum)
        }
        Some(PtypeTag::Geometry) => {
            geometry::validate(&datum)?;

            Ok(datum)
        }
        None => Err(DatumError::logic(format!(
            "unknown `{PTYPE_FIELD}` value `{tag}`"
        ))),
    }
}
