//! Core value model for ReefDB: the `Datum` JSON superset with pseudo-types,
//! its total order and merge semantics, builders, the storage byte format,
//! and the order-preserving index key encoding.
#![warn(unreachable_pub)]

pub(crate) mod buffer;

// public exports are one module level down
pub mod builder;
pub mod datum;
pub mod error;
pub mod key;
pub mod limits;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, builders, codecs, or helpers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        datum::{Datum, DatumKind, PtypeAllowance, PtypeTag, Text},
        key::SkeyVersion,
        limits::Limits,
    };
}
