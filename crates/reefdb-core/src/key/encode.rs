use std::io::Write as _;

use crate::{
    datum::{Cell, Datum, DatumKind, PtypeTag, ptype::time},
    error::{DatumError, Result},
    key::{MAX_KEY_SIZE, SkeyVersion},
};

// Kind tag bytes. Every stored key starts with one of these ASCII bytes,
// which is what leaves the high bit free for the version flag.
const ARRAY_TAG: u8 = b'A';
const BOOL_TAG: u8 = b'B';
const NUMBER_TAG: u8 = b'N';
const STRING_TAG: u8 = b'S';
const BINARY_PREFIX: &[u8] = b"PBINARY:";
const TIME_PREFIX: &[u8] = b"PTIME:";

// Extrema bytes sit just outside the tag range: 0x40 below `A`, 0x5B above
// `Z`, so they bracket every tag byte.
const MINVAL_BYTE: u8 = ARRAY_TAG - 1;
const MAXVAL_BYTE: u8 = b'Z' + 1;

const SIGN_BIT: u64 = 0x8000_0000_0000_0000;

///
/// KeyRole
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum KeyRole {
    Primary,
    Secondary,
}

///
/// NulPolicy
///
/// What happens to NUL bytes in string and binary payloads. Primary keys
/// ban them outright, legacy secondary keys write them raw, and current
/// secondary keys escape them so the array separator stays unambiguous.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum NulPolicy {
    Ban,
    Raw,
    Escape,
}

///
/// EncodeCtx
///

pub(super) struct EncodeCtx {
    version: SkeyVersion,
    role: KeyRole,
    extrema_ok: bool,
}

impl EncodeCtx {
    /// Primary keys encode the same under both versions; no flag, no
    /// escaping, NUL banned.
    pub(super) const fn primary() -> Self {
        Self {
            version: SkeyVersion::Current,
            role: KeyRole::Primary,
            extrema_ok: false,
        }
    }

    pub(super) const fn secondary(version: SkeyVersion, extrema_ok: bool) -> Self {
        Self {
            version,
            role: KeyRole::Secondary,
            extrema_ok,
        }
    }

    const fn nul_policy(&self) -> NulPolicy {
        match (self.role, self.version) {
            (KeyRole::Primary, _) => NulPolicy::Ban,
            (KeyRole::Secondary, SkeyVersion::Legacy) => NulPolicy::Raw,
            (KeyRole::Secondary, SkeyVersion::Current) => NulPolicy::Escape,
        }
    }
}

/// Append the key form of one value.
///
/// Secondary entry points dispatch top-level extrema before calling in, so
/// the extrema arm here serves array elements, and primaries, which reject
/// extrema at any depth.
pub(super) fn push_value(datum: &Datum, ctx: &EncodeCtx, out: &mut Vec<u8>) -> Result<()> {
    match datum.cell() {
        Cell::Minval | Cell::Maxval => match ctx.role {
            KeyRole::Primary => Err(DatumError::logic(format!(
                "cannot use `{}` in a primary key",
                datum.trunc_print()
            ))),
            KeyRole::Secondary => {
                if ctx.version == SkeyVersion::Legacy || ctx.extrema_ok {
                    push_extremum(datum, ctx.version, out);
                    Ok(())
                } else {
                    Err(invalid_key_material(datum))
                }
            }
        },
        Cell::Bool(value) => {
            out.push(BOOL_TAG);
            out.push(if *value { b't' } else { b'f' });
            Ok(())
        }
        Cell::Num(value) => {
            out.push(NUMBER_TAG);
            push_mangled(*value, out);
            Ok(())
        }
        Cell::Str(text) => {
            out.push(STRING_TAG);
            push_escaped(text.as_bytes(), ctx.nul_policy(), out)
        }
        Cell::Binary(bytes) => {
            out.extend_from_slice(BINARY_PREFIX);
            push_escaped(bytes, ctx.nul_policy(), out)
        }
        Cell::Arr(_) | Cell::BufArr(_) => push_array(datum, ctx, out),
        Cell::Obj(_) | Cell::BufObj(_) => match datum.ptype_tag() {
            Some(PtypeTag::Time) => {
                push_time(datum, out);
                Ok(())
            }
            _ => Err(invalid_key_material(datum)),
        },
        Cell::Null => Err(invalid_key_material(datum)),
    }
}

/// Append an extremum byte. Legacy maxval fills the rest of the key budget
/// with `0xFF` so it compares above any stored entry.
pub(super) fn push_extremum(datum: &Datum, version: SkeyVersion, out: &mut Vec<u8>) {
    match (version, datum.kind()) {
        (SkeyVersion::Current, DatumKind::Minval) => out.push(MINVAL_BYTE),
        (SkeyVersion::Current, DatumKind::Maxval) => out.push(MAXVAL_BYTE),
        (SkeyVersion::Legacy, DatumKind::Minval) => out.push(0x00),
        (SkeyVersion::Legacy, DatumKind::Maxval) => {
            if out.len() < MAX_KEY_SIZE {
                out.resize(MAX_KEY_SIZE, 0xFF);
            }
        }
        _ => debug_assert!(false, "push_extremum on a non-extremum datum"),
    }
}

pub(super) fn invalid_key_material(datum: &Datum) -> DatumError {
    DatumError::type_error(format!(
        "cannot use {} as a key: `{}`",
        datum.type_name(),
        datum.trunc_print()
    ))
}

/// Order-preserving double payload: the sign-mangled big-endian bits in
/// hex, then `#` and the decimal rendering so the exact value survives a
/// round trip through the key.
fn push_mangled(value: f64, out: &mut Vec<u8>) {
    let bits = value.to_bits();
    let mangled = if bits & SIGN_BIT == 0 {
        bits ^ SIGN_BIT
    } else {
        !bits
    };

    // io::Write on Vec<u8> cannot fail
    let _ = write!(out, "{mangled:016x}#{value}");
}

fn push_escaped(bytes: &[u8], policy: NulPolicy, out: &mut Vec<u8>) -> Result<()> {
    match policy {
        NulPolicy::Ban => {
            if bytes.contains(&0) {
                return Err(DatumError::logic("primary keys cannot contain a null byte"));
            }
            out.extend_from_slice(bytes);
        }
        NulPolicy::Raw => {
            let room = MAX_KEY_SIZE.saturating_sub(out.len());
            out.extend_from_slice(&bytes[..bytes.len().min(room)]);
        }
        NulPolicy::Escape => {
            for &byte in bytes {
                if out.len() >= MAX_KEY_SIZE {
                    break;
                }
                match byte {
                    0x00 => out.extend_from_slice(&[0x01, 0x01]),
                    0x01 => out.extend_from_slice(&[0x01, 0x02]),
                    _ => out.push(byte),
                }
            }
        }
    }

    Ok(())
}

/// Arrays render as `A`, then each element's encoding followed by a NUL
/// separator. Encoding stops once the key budget is full; the caller
/// truncates to the exact budget afterwards.
fn push_array(datum: &Datum, ctx: &EncodeCtx, out: &mut Vec<u8>) -> Result<()> {
    out.push(ARRAY_TAG);
    for i in 0..datum.elem_count() {
        if out.len() >= MAX_KEY_SIZE {
            break;
        }
        push_value(&datum.elem(i), ctx, out)?;
        out.push(0x00);
    }

    Ok(())
}

/// Times order by epoch seconds alone, so the key is the epoch payload
/// under a kind prefix. The zero fallback for a missing `epoch_time`
/// matches the comparator.
fn push_time(datum: &Datum, out: &mut Vec<u8>) {
    out.extend_from_slice(TIME_PREFIX);
    push_mangled(time::epoch_time(datum), out);
}
