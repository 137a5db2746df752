use crate::{
    buffer::{
        LEN_SIZE, NUM_SIZE, TAG_ARR, TAG_BINARY, TAG_FALSE, TAG_NULL, TAG_NUM, TAG_OBJ, TAG_STR,
        TAG_TRUE, read_f64, read_u32, view,
    },
    datum::{
        Cell, Datum, PtypeTag,
        ptype::{PTYPE_FIELD, geometry, time},
    },
    error::{DatumError, Result},
    limits,
};
use bytes::Bytes;

// static corruption reasons, stable across releases
const ERR_TRUNCATED: &str = "truncated buffer";
const ERR_TRAILING: &str = "trailing bytes";
const ERR_TAG: &str = "unknown tag";
const ERR_OFFSETS: &str = "offsets not monotonic";
const ERR_UTF8: &str = "invalid utf-8";
const ERR_KEY_ORDER: &str = "unsorted or duplicate keys";
const ERR_NON_FINITE: &str = "non-finite number payload";
const ERR_NEG_ZERO: &str = "negative-zero number payload";
const ERR_PTYPE: &str = "unsanitized pseudo-type";

fn corrupt(reason: &'static str) -> DatumError {
    DatumError::logic(format!("corrupt raw datum: {reason}"))
}

/// Encode a datum into the storage byte format.
///
/// Phase 1 walks the value to reject unstorable shapes and precompute the
/// exact capacity; phase 2 writes without reallocating.
pub(crate) fn encode(datum: &Datum) -> Result<Vec<u8>> {
    let size = encoded_size(datum)?;
    if u32::try_from(size).is_err() {
        return Err(DatumError::resource_limit(
            "value too large for the storage format",
        ));
    }

    let mut out = Vec::with_capacity(size);
    write_value(datum, &mut out);
    debug_assert_eq!(out.len(), size);

    Ok(out)
}

/// Validate a raw buffer and wrap it as a datum.
///
/// The single pass proves every invariant the views rely on (bounds, tags,
/// offset monotonicity, UTF-8, key order, finite numbers, nesting depth,
/// sanitized pseudo-type shapes), so element access afterwards is
/// infallible.
pub(crate) fn decode(buf: Bytes) -> Result<Datum> {
    validate_value(&buf, 0, buf.len(), 0)?;

    Ok(view::materialize(buf))
}

fn encoded_size(datum: &Datum) -> Result<usize> {
    let size = match datum.cell() {
        Cell::Minval | Cell::Maxval => {
            return Err(DatumError::logic(format!(
                "cannot encode `{}` as a raw datum",
                datum.trunc_print()
            )));
        }
        Cell::Null | Cell::Bool(_) => 1,
        Cell::Num(_) => 1 + NUM_SIZE,
        Cell::Str(text) => 1 + LEN_SIZE + text.len(),
        Cell::Binary(bytes) => 1 + LEN_SIZE + bytes.len(),
        Cell::Arr(_) | Cell::BufArr(_) => {
            let count = datum.elem_count();
            let mut size = 1 + LEN_SIZE + count * LEN_SIZE;
            for i in 0..count {
                size += encoded_size(&datum.elem(i))?;
            }
            size
        }
        Cell::Obj(_) | Cell::BufObj(_) => {
            check_storable_object(datum)?;
            let count = datum.pair_count();
            let mut size = 1 + LEN_SIZE + count * LEN_SIZE;
            for i in 0..count {
                let (key, value) = datum.pair(i);
                size += LEN_SIZE + key.len() + encoded_size(&value)?;
            }
            size
        }
    };

    Ok(size)
}

/// Objects must be fully sanitized before they reach storage: BINARY and
/// LITERAL shapes never store, TIME must be canonical, GEOMETRY must hold
/// its shape, and unknown tags are rejected outright.
fn check_storable_object(datum: &Datum) -> Result<()> {
    if !datum.is_ptype() {
        return Ok(());
    }

    match datum.ptype_tag() {
        Some(PtypeTag::Time) => {
            if time::is_canonical(datum) {
                Ok(())
            } else {
                Err(DatumError::logic(format!(
                    "cannot encode unsanitized time object as a raw datum: `{}`",
                    datum.trunc_print()
                )))
            }
        }
        Some(PtypeTag::Geometry) => geometry::validate(datum),
        Some(tag @ (PtypeTag::Binary | PtypeTag::Literal)) => Err(DatumError::logic(format!(
            "cannot encode pseudo-type {} as a raw datum",
            tag.display_name()
        ))),
        None => Err(DatumError::logic(format!(
            "cannot encode object with unknown `{PTYPE_FIELD}` value as a raw datum: `{}`",
            datum.trunc_print()
        ))),
    }
}

fn write_value(datum: &Datum, out: &mut Vec<u8>) {
    match datum.cell() {
        Cell::Minval | Cell::Maxval => debug_assert!(false, "rejected in the capacity phase"),
        Cell::Null => out.push(TAG_NULL),
        Cell::Bool(false) => out.push(TAG_FALSE),
        Cell::Bool(true) => out.push(TAG_TRUE),
        Cell::Num(value) => {
            out.push(TAG_NUM);
            out.extend_from_slice(&value.to_le_bytes());
        }
        Cell::Str(text) => {
            out.push(TAG_STR);
            write_len(out, text.len());
            out.extend_from_slice(text.as_bytes());
        }
        Cell::Binary(bytes) => {
            out.push(TAG_BINARY);
            write_len(out, bytes.len());
            out.extend_from_slice(bytes);
        }
        Cell::Arr(_) | Cell::BufArr(_) => {
            out.push(TAG_ARR);
            let count = datum.elem_count();
            write_len(out, count);
            let table = out.len();
            out.resize(table + count * LEN_SIZE, 0);
            let region = out.len();
            for i in 0..count {
                let offset = out.len() - region;
                patch_offset(out, table + i * LEN_SIZE, offset);
                write_value(&datum.elem(i), out);
            }
        }
        Cell::Obj(_) | Cell::BufObj(_) => {
            out.push(TAG_OBJ);
            let count = datum.pair_count();
            write_len(out, count);
            let table = out.len();
            out.resize(table + count * LEN_SIZE, 0);
            let region = out.len();
            for i in 0..count {
                let offset = out.len() - region;
                patch_offset(out, table + i * LEN_SIZE, offset);
                let (key, value) = datum.pair(i);
                write_len(out, key.len());
                out.extend_from_slice(key.as_bytes());
                write_value(&value, out);
            }
        }
    }
}

// the root capacity check bounds every length, count, and offset to u32
#[allow(clippy::cast_possible_truncation)]
fn write_len(out: &mut Vec<u8>, len: usize) {
    out.extend_from_slice(&(len as u32).to_le_bytes());
}

#[allow(clippy::cast_possible_truncation)]
fn patch_offset(out: &mut [u8], at: usize, offset: usize) {
    out[at..at + LEN_SIZE].copy_from_slice(&(offset as u32).to_le_bytes());
}

/// Validate one value region (`start..end` within `buf`). `depth` is the
/// number of enclosing containers.
fn validate_value(buf: &Bytes, start: usize, end: usize, depth: usize) -> Result<()> {
    if start >= end {
        return Err(corrupt(ERR_TRUNCATED));
    }
    let tag = buf[start];
    let payload_start = start + 1;
    let payload_len = end - payload_start;

    match tag {
        TAG_NULL | TAG_FALSE | TAG_TRUE => {
            if payload_len != 0 {
                return Err(corrupt(ERR_TRAILING));
            }
            Ok(())
        }
        TAG_NUM => {
            if payload_len < NUM_SIZE {
                return Err(corrupt(ERR_TRUNCATED));
            }
            if payload_len > NUM_SIZE {
                return Err(corrupt(ERR_TRAILING));
            }
            let value = read_f64(buf, payload_start);
            if !value.is_finite() {
                return Err(corrupt(ERR_NON_FINITE));
            }
            if value == 0.0 && value.is_sign_negative() {
                return Err(corrupt(ERR_NEG_ZERO));
            }
            Ok(())
        }
        TAG_STR | TAG_BINARY => {
            if payload_len < LEN_SIZE {
                return Err(corrupt(ERR_TRUNCATED));
            }
            let declared = read_u32(buf, payload_start);
            let actual = payload_len - LEN_SIZE;
            if actual < declared {
                return Err(corrupt(ERR_TRUNCATED));
            }
            if actual > declared {
                return Err(corrupt(ERR_TRAILING));
            }
            if tag == TAG_STR {
                std::str::from_utf8(&buf[payload_start + LEN_SIZE..end])
                    .map_err(|_| corrupt(ERR_UTF8))?;
            }
            Ok(())
        }
        TAG_ARR => validate_container(buf, payload_start, end, depth, false),
        TAG_OBJ => {
            validate_container(buf, payload_start, end, depth, true)?;
            check_stored_ptype(buf, start, end)
        }
        _ => Err(corrupt(ERR_TAG)),
    }
}

fn validate_container(
    buf: &Bytes,
    payload_start: usize,
    end: usize,
    depth: usize,
    keyed: bool,
) -> Result<()> {
    limits::check_depth(depth + 1)?;

    let avail = end - payload_start;
    if avail < LEN_SIZE {
        return Err(corrupt(ERR_TRUNCATED));
    }
    let count = read_u32(buf, payload_start);
    let table_len = count
        .checked_mul(LEN_SIZE)
        .ok_or_else(|| corrupt(ERR_TRUNCATED))?;
    if avail - LEN_SIZE < table_len {
        return Err(corrupt(ERR_TRUNCATED));
    }
    let table = payload_start + LEN_SIZE;
    let region = table + table_len;
    let region_len = end - region;
    if count == 0 {
        if region_len != 0 {
            return Err(corrupt(ERR_TRAILING));
        }
        return Ok(());
    }

    let mut prev_key: Option<&[u8]> = None;
    for i in 0..count {
        let span_start = read_u32(buf, table + i * LEN_SIZE);
        let span_end = if i + 1 < count {
            read_u32(buf, table + (i + 1) * LEN_SIZE)
        } else {
            region_len
        };
        if (i == 0 && span_start != 0) || span_start >= span_end || span_end > region_len {
            return Err(corrupt(ERR_OFFSETS));
        }
        let elem_start = region + span_start;
        let elem_end = region + span_end;

        if keyed {
            if elem_end - elem_start < LEN_SIZE {
                return Err(corrupt(ERR_TRUNCATED));
            }
            let key_len = read_u32(buf, elem_start);
            let key_start = elem_start + LEN_SIZE;
            if elem_end - key_start < key_len {
                return Err(corrupt(ERR_TRUNCATED));
            }
            let key = &buf[key_start..key_start + key_len];
            std::str::from_utf8(key).map_err(|_| corrupt(ERR_UTF8))?;
            if let Some(prev) = prev_key
                && prev >= key
            {
                return Err(corrupt(ERR_KEY_ORDER));
            }
            prev_key = Some(key);
            validate_value(buf, key_start + key_len, elem_end, depth + 1)?;
        } else {
            validate_value(buf, elem_start, elem_end, depth + 1)?;
        }
    }

    Ok(())
}

/// Pseudo-type gate for a structurally valid stored object. Runs after the
/// object's children validate, so materializing fields here is safe.
fn check_stored_ptype(buf: &Bytes, start: usize, end: usize) -> Result<()> {
    let object = view::materialize(buf.slice(start..end));
    if object.get_field_opt(PTYPE_FIELD).is_none() {
        return Ok(());
    }

    match object.ptype_tag() {
        Some(PtypeTag::Time) => {
            if time::is_canonical(&object) {
                Ok(())
            } else {
                Err(corrupt(ERR_PTYPE))
            }
        }
        Some(PtypeTag::Geometry) => geometry::validate(&object).map_err(|_| corrupt(ERR_PTYPE)),
        Some(PtypeTag::Binary | PtypeTag::Literal) | None => Err(corrupt(ERR_PTYPE)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        datum::PtypeAllowance,
        error::ErrorKind,
        limits::{Limits, MAX_DATUM_DEPTH},
    };

    fn num(value: f64) -> Datum {
        Datum::number(value).expect("finite number")
    }

    fn doc() -> Datum {
        Datum::from_json_str(
            r#"{"active":true,"name":"coral","scores":[1,2.5,3],"tags":{"reef":null}}"#,
            PtypeAllowance::none(),
            Limits::default(),
        )
        .expect("valid document")
    }

    fn corrupt_reason(bytes: Vec<u8>) -> String {
        Datum::try_from_raw(bytes).expect_err("corrupt buffer must fail").message
    }

    #[test]
    fn scalars_round_trip() {
        let values = [
            Datum::null(),
            Datum::boolean(false),
            Datum::boolean(true),
            num(0.0),
            num(-12.75),
            Datum::string("reef"),
            Datum::string(""),
            Datum::binary(vec![0u8, 1, 255]),
        ];
        for value in values {
            let raw = value.to_raw().expect("encodes");
            let back = Datum::try_from_raw(raw).expect("decodes");
            assert_eq!(back, value);
            assert_eq!(back.kind(), value.kind());
        }
    }

    #[test]
    fn documents_round_trip_through_views() {
        let original = doc();
        let back = Datum::try_from_raw(original.to_raw().expect("encodes")).expect("decodes");

        assert_eq!(back, original);
        assert_eq!(back.get_field("name").expect("field").as_str().expect("str"), "coral");
        assert_eq!(back.get_field("scores").expect("field").arr_len().expect("array"), 3);
        assert_eq!(
            back.get_field("tags").expect("field").get_field("reef").expect("field"),
            Datum::null()
        );
    }

    #[test]
    fn layout_is_byte_stable() {
        assert_eq!(Datum::null().to_raw().expect("encodes"), vec![1]);
        assert_eq!(Datum::boolean(false).to_raw().expect("encodes"), vec![2]);
        assert_eq!(Datum::boolean(true).to_raw().expect("encodes"), vec![3]);

        let mut one = vec![4];
        one.extend_from_slice(&1.0f64.to_le_bytes());
        assert_eq!(num(1.0).to_raw().expect("encodes"), one);

        assert_eq!(
            Datum::string("hi").to_raw().expect("encodes"),
            vec![5, 2, 0, 0, 0, b'h', b'i']
        );

        let array = Datum::array(vec![Datum::boolean(true)], Limits::default()).expect("array");
        assert_eq!(array.to_raw().expect("encodes"), vec![7, 1, 0, 0, 0, 0, 0, 0, 0, 3]);

        let object = Datum::object(vec![("a".to_string(), Datum::null())]).expect("object");
        assert_eq!(
            object.to_raw().expect("encodes"),
            vec![8, 1, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, b'a', 1]
        );
    }

    #[test]
    fn string_payloads_alias_the_buffer() {
        let raw = Bytes::from(doc().to_raw().expect("encodes"));
        let decoded = Datum::try_from_raw(raw.clone()).expect("decodes");

        let name = decoded.get_field("name").expect("field");
        let payload = name.as_str().expect("str").as_ptr() as usize;
        let base = raw.as_ptr() as usize;
        assert!(payload >= base && payload < base + raw.len());
    }

    #[test]
    fn rejects_extrema_and_unsanitized_shapes() {
        assert_eq!(
            Datum::minval().to_raw().expect_err("must fail").message,
            "cannot encode `minval` as a raw datum"
        );
        assert!(Datum::maxval().to_raw().is_err());

        let literal = Datum::from_json_str(
            r#"{"$reql_type$":"LITERAL","value":1}"#,
            PtypeAllowance::with_literal(),
            Limits::default(),
        )
        .expect("literal parses");
        assert_eq!(
            literal.to_raw().expect_err("must fail").message,
            "cannot encode pseudo-type PTYPE<LITERAL> as a raw datum"
        );

        let binary_shaped = Datum::object(vec![
            ("$reql_type$".to_string(), Datum::string("BINARY")),
            ("data".to_string(), Datum::string("AA==")),
        ])
        .expect("object");
        assert!(binary_shaped.to_raw().is_err());

        let unknown = Datum::object(vec![("$reql_type$".to_string(), Datum::string("BOGUS"))])
            .expect("object");
        assert!(unknown.to_raw().expect_err("must fail").message.contains("unknown"));

        let broken_time = Datum::object(vec![("$reql_type$".to_string(), Datum::string("TIME"))])
            .expect("object");
        assert!(
            broken_time
                .to_raw()
                .expect_err("must fail")
                .message
                .contains("unsanitized time object")
        );
    }

    #[test]
    fn rejects_truncated_and_trailing_buffers() {
        assert_eq!(corrupt_reason(vec![]), "corrupt raw datum: truncated buffer");
        assert_eq!(corrupt_reason(vec![4, 0, 0]), "corrupt raw datum: truncated buffer");
        assert_eq!(
            corrupt_reason(vec![5, 4, 0, 0, 0, b'x']),
            "corrupt raw datum: truncated buffer"
        );
        assert_eq!(corrupt_reason(vec![1, 9]), "corrupt raw datum: trailing bytes");
        assert_eq!(
            corrupt_reason(vec![5, 1, 0, 0, 0, b'x', b'y']),
            "corrupt raw datum: trailing bytes"
        );
    }

    #[test]
    fn rejects_unknown_tags() {
        assert_eq!(corrupt_reason(vec![0]), "corrupt raw datum: unknown tag");
        assert_eq!(corrupt_reason(vec![9]), "corrupt raw datum: unknown tag");
    }

    #[test]
    fn rejects_bad_number_payloads() {
        let mut nan = vec![4];
        nan.extend_from_slice(&f64::NAN.to_le_bytes());
        assert_eq!(corrupt_reason(nan), "corrupt raw datum: non-finite number payload");

        let mut neg_zero = vec![4];
        neg_zero.extend_from_slice(&(-0.0f64).to_le_bytes());
        assert_eq!(corrupt_reason(neg_zero), "corrupt raw datum: negative-zero number payload");
    }

    #[test]
    fn rejects_non_monotonic_offsets() {
        let array = Datum::array(
            vec![Datum::boolean(true), Datum::boolean(false)],
            Limits::default(),
        )
        .expect("array");
        let mut raw = array.to_raw().expect("encodes");
        // second element offset rewound to 0
        raw[9] = 0;
        assert_eq!(corrupt_reason(raw), "corrupt raw datum: offsets not monotonic");
    }

    #[test]
    fn rejects_unsorted_or_duplicate_keys() {
        fn pair(key: u8) -> Vec<u8> {
            vec![1, 0, 0, 0, key, 1]
        }
        fn object(first: u8, second: u8) -> Vec<u8> {
            let mut raw = vec![8, 2, 0, 0, 0, 0, 0, 0, 0, 6, 0, 0, 0];
            raw.extend(pair(first));
            raw.extend(pair(second));
            raw
        }

        assert_eq!(
            corrupt_reason(object(b'b', b'a')),
            "corrupt raw datum: unsorted or duplicate keys"
        );
        assert_eq!(
            corrupt_reason(object(b'a', b'a')),
            "corrupt raw datum: unsorted or duplicate keys"
        );
    }

    #[test]
    fn rejects_invalid_utf8() {
        assert_eq!(corrupt_reason(vec![5, 1, 0, 0, 0, 0xFF]), "corrupt raw datum: invalid utf-8");

        // invalid byte in an object key
        let mut raw = vec![8, 1, 0, 0, 0, 0, 0, 0, 0];
        raw.extend(vec![1, 0, 0, 0, 0xFF, 1]);
        assert_eq!(corrupt_reason(raw), "corrupt raw datum: invalid utf-8");
    }

    #[test]
    fn rejects_unsanitized_stored_ptypes() {
        let time = Datum::time(1.0, Some("+01:00")).expect("time");
        let mut raw = time.to_raw().expect("encodes");
        let at = raw.windows(4).position(|w| w == b"TIME").expect("label present");
        raw[at] = b'X';
        assert_eq!(corrupt_reason(raw), "corrupt raw datum: unsanitized pseudo-type");

        // BINARY wire shape assembled by hand
        let mut pair0 = vec![11, 0, 0, 0];
        pair0.extend_from_slice(b"$reql_type$");
        pair0.extend(vec![5, 6, 0, 0, 0]);
        pair0.extend_from_slice(b"BINARY");
        let mut pair1 = vec![4, 0, 0, 0];
        pair1.extend_from_slice(b"data");
        pair1.extend(vec![5, 0, 0, 0, 0]);
        let mut raw = vec![8, 2, 0, 0, 0, 0, 0, 0, 0];
        write_len(&mut raw, pair0.len());
        raw.extend(pair0);
        raw.extend(pair1);
        assert_eq!(corrupt_reason(raw), "corrupt raw datum: unsanitized pseudo-type");
    }

    #[test]
    fn depth_cap_applies_to_buffers() {
        fn wrap(inner: Vec<u8>) -> Vec<u8> {
            let mut out = vec![7, 1, 0, 0, 0, 0, 0, 0, 0];
            out.extend(inner);
            out
        }

        let mut at_cap = vec![1];
        for _ in 0..MAX_DATUM_DEPTH {
            at_cap = wrap(at_cap);
        }
        assert!(Datum::try_from_raw(at_cap.clone()).is_ok());

        let over = wrap(at_cap);
        assert_eq!(
            Datum::try_from_raw(over).expect_err("must fail").kind,
            ErrorKind::ResourceLimit
        );
    }

    #[test]
    fn round_trips_canonical_time_objects() {
        let time = Datum::time(1_375_147_296.681, Some("-07:00")).expect("time");
        let back = Datum::try_from_raw(time.to_raw().expect("encodes")).expect("decodes");
        assert_eq!(back, time);
        assert_eq!(
            back.get_field("timezone").expect("field").as_str().expect("str"),
            "-07:00"
        );
    }
}
