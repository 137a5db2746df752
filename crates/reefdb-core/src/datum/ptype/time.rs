use crate::{
    datum::{Datum, DatumKind, ptype::PTYPE_FIELD},
    error::{DatumError, Result},
};
use chrono::FixedOffset;
use std::cmp::Ordering;

/// Seconds since the UNIX epoch, as a double.
pub const EPOCH_TIME_FIELD: &str = "epoch_time";

/// Display timezone, canonicalized to `+HH:MM` / `-HH:MM`.
pub const TIMEZONE_FIELD: &str = "timezone";

/// Validate a TIME-tagged object and canonicalize its timezone.
///
/// Exactly the reserved field, a numeric `epoch_time`, and an optional
/// string `timezone` are legal. A parseable but non-canonical timezone is
/// rewritten in place.
pub(crate) fn sanitize(datum: Datum) -> Result<Datum> {
    match scan(&datum)? {
        Some(tz) => {
            let entries = datum
                .pairs()?
                .map(|(key, value)| {
                    if key == *TIMEZONE_FIELD {
                        (key, tz.clone())
                    } else {
                        (key, value)
                    }
                })
                .collect();

            // keys are unchanged, so the sorted-unique invariant holds
            Ok(Datum::object_presorted(entries))
        }
        None => Ok(datum),
    }
}

/// True for an object already in the storable form: valid shape and a
/// canonical timezone, nothing to rewrite.
pub(crate) fn is_canonical(datum: &Datum) -> bool {
    matches!(scan(datum), Ok(None))
}

/// Shape-check a TIME-tagged object. Returns the replacement value for a
/// parseable but non-canonical `timezone` field, `None` when the object can
/// be used as-is.
fn scan(datum: &Datum) -> Result<Option<Datum>> {
    let mut epoch_seen = false;
    let mut rewrite_tz: Option<Datum> = None;

    for (key, value) in datum.pairs()? {
        if key == *PTYPE_FIELD {
            continue;
        } else if key == *EPOCH_TIME_FIELD {
            if value.kind() != DatumKind::Number {
                return Err(invalid(
                    &format!(
                        "field `{EPOCH_TIME_FIELD}` must be a number, got type {}",
                        value.type_name()
                    ),
                    datum,
                ));
            }
            epoch_seen = true;
        } else if key == *TIMEZONE_FIELD {
            let tz = value.as_str()?;
            let Some(canonical) = canonical_timezone(tz) else {
                return Err(invalid(&format!("invalid timezone `{tz}`"), datum));
            };
            if canonical != tz {
                rewrite_tz = Some(Datum::string(canonical));
            }
        } else {
            return Err(invalid(&format!("unrecognized field `{key}`"), datum));
        }
    }

    if !epoch_seen {
        return Err(invalid(&format!("no field `{EPOCH_TIME_FIELD}`"), datum));
    }

    Ok(rewrite_tz)
}

fn invalid(detail: &str, datum: &Datum) -> DatumError {
    DatumError::logic(format!(
        "invalid time object ({detail}): `{}`",
        datum.trunc_print()
    ))
}

/// Canonicalize an offset timezone.
///
/// Accepts `Z`, `+HH`, `-HH`, `+HHMM`, `-HHMM`, `+HH:MM` and `-HH:MM` with a
/// magnitude under 24 hours; returns the `+HH:MM` / `-HH:MM` form.
pub(crate) fn canonical_timezone(tz: &str) -> Option<String> {
    if tz == "Z" {
        return Some("+00:00".to_string());
    }

    let negative = match tz.as_bytes().first()? {
        b'+' => false,
        b'-' => true,
        _ => return None,
    };
    let digits = &tz[1..];
    if !digits.is_ascii() {
        return None;
    }
    let (hours, minutes): (i32, i32) = match digits.len() {
        2 => (digits.parse().ok()?, 0),
        4 => (digits[..2].parse().ok()?, digits[2..].parse().ok()?),
        5 if digits.as_bytes()[2] == b':' => (digits[..2].parse().ok()?, digits[3..].parse().ok()?),
        _ => return None,
    };
    if hours < 0 || minutes < 0 || minutes > 59 {
        return None;
    }

    let seconds = (hours * 3600 + minutes * 60) * if negative { -1 } else { 1 };
    // FixedOffset enforces the under-24h bound
    FixedOffset::east_opt(seconds)?;

    let sign = if negative { '-' } else { '+' };
    Some(format!("{sign}{hours:02}:{minutes:02}"))
}

/// Payload rule: sanitized times order by epoch seconds alone (the display
/// timezone never participates).
pub(crate) fn cmp(left: &Datum, right: &Datum) -> Ordering {
    epoch_time(left).total_cmp(&epoch_time(right))
}

// Sanitized time objects always carry a numeric epoch_time; the zero
// fallback keeps the comparator total for anything else.
pub(crate) fn epoch_time(datum: &Datum) -> f64 {
    datum
        .get_field_opt(EPOCH_TIME_FIELD)
        .and_then(|field| field.num_opt())
        .unwrap_or(0.0)
}
