use crate::{
    datum::{Cell, Datum, PtypeAllowance, ptype, ptype::binary},
    error::{DatumError, Result},
    limits::Limits,
};
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{self, MapAccess, SeqAccess, Visitor},
    ser::{Error as _, SerializeMap, SerializeSeq},
};
use std::fmt;

impl Serialize for Datum {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.cell() {
            Cell::Minval | Cell::Maxval => Err(S::Error::custom(format!(
                "cannot convert `{}` to JSON",
                self.trunc_print()
            ))),
            Cell::Null => serializer.serialize_unit(),
            Cell::Bool(value) => serializer.serialize_bool(*value),
            Cell::Num(value) => {
                if value.abs() <= super::MAX_SAFE_INT && value.fract() == 0.0 {
                    #[allow(clippy::cast_possible_truncation)]
                    let int = *value as i64;
                    serializer.serialize_i64(int)
                } else {
                    serializer.serialize_f64(*value)
                }
            }
            Cell::Str(text) => match text.try_str() {
                Ok(s) => serializer.serialize_str(s),
                Err(_) => Err(S::Error::custom("string payload is not valid utf-8")),
            },
            Cell::Binary(bytes) => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry(ptype::PTYPE_FIELD, ptype::PtypeTag::Binary.label())?;
                map.serialize_entry(binary::DATA_FIELD, &binary::to_base64(bytes))?;
                map.end()
            }
            Cell::Arr(_) | Cell::BufArr(_) => {
                let count = self.elem_count();
                let mut seq = serializer.serialize_seq(Some(count))?;
                for i in 0..count {
                    seq.serialize_element(&self.elem(i))?;
                }
                seq.end()
            }
            Cell::Obj(_) | Cell::BufObj(_) => {
                let count = self.pair_count();
                let mut map = serializer.serialize_map(Some(count))?;
                for i in 0..count {
                    let (key, value) = self.pair(i);
                    match key.try_str() {
                        Ok(k) => map.serialize_entry(k, &value)?,
                        Err(_) => return Err(S::Error::custom("object key is not valid utf-8")),
                    }
                }
                map.end()
            }
        }
    }
}

///
/// WireDatum
///
/// Raw parse of a JSON document: insertion order, duplicate keys, unsanitized
/// pseudo-type shapes and all. Conversion into `Datum` applies sorting,
/// duplicate rejection, limits, and pseudo-type sanitization in one pass.
///

#[derive(Debug)]
enum WireDatum {
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Arr(Vec<WireDatum>),
    Obj(Vec<(String, WireDatum)>),
}

impl WireDatum {
    fn into_datum(self, allowance: PtypeAllowance, limits: Limits) -> Result<Datum> {
        match self {
            Self::Null => Ok(Datum::null()),
            Self::Bool(value) => Ok(Datum::boolean(value)),
            Self::Num(value) => Datum::number(value),
            Self::Str(value) => Ok(Datum::string(value)),
            Self::Arr(elements) => {
                let elements = elements
                    .into_iter()
                    .map(|element| element.into_datum(allowance, limits))
                    .collect::<Result<Vec<_>>>()?;
                Datum::array(elements, limits)
            }
            Self::Obj(entries) => {
                let entries = entries
                    .into_iter()
                    .map(|(key, value)| Ok((key, value.into_datum(allowance, limits)?)))
                    .collect::<Result<Vec<_>>>()?;
                let object = Datum::object(entries)?;

                ptype::sanitize_object(object, allowance)
            }
        }
    }
}

impl<'de> Deserialize<'de> for WireDatum {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(WireVisitor)
    }
}

struct WireVisitor;

impl<'de> Visitor<'de> for WireVisitor {
    type Value = WireDatum;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_unit<E>(self) -> std::result::Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(WireDatum::Null)
    }

    fn visit_bool<E>(self, value: bool) -> std::result::Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(WireDatum::Bool(value))
    }

    #[allow(clippy::cast_precision_loss)]
    fn visit_i64<E>(self, value: i64) -> std::result::Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(WireDatum::Num(value as f64))
    }

    #[allow(clippy::cast_precision_loss)]
    fn visit_u64<E>(self, value: u64) -> std::result::Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(WireDatum::Num(value as f64))
    }

    fn visit_f64<E>(self, value: f64) -> std::result::Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(WireDatum::Num(value))
    }

    fn visit_str<E>(self, value: &str) -> std::result::Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(WireDatum::Str(value.to_owned()))
    }

    fn visit_string<E>(self, value: String) -> std::result::Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(WireDatum::Str(value))
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut elements = Vec::new();
        while let Some(element) = seq.next_element()? {
            elements.push(element);
        }

        Ok(WireDatum::Arr(elements))
    }

    fn visit_map<A>(self, mut map: A) -> std::result::Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        // duplicates survive the parse and are rejected during conversion
        let mut entries = Vec::new();
        while let Some(entry) = map.next_entry()? {
            entries.push(entry);
        }

        Ok(WireDatum::Obj(entries))
    }
}

impl Datum {
    /// Parse a JSON document into a sanitized value.
    pub fn from_json_str(input: &str, allowance: PtypeAllowance, limits: Limits) -> Result<Self> {
        let wire: WireDatum = serde_json::from_str(input)
            .map_err(|err| DatumError::logic(format!("failed to parse JSON: {err}")))?;

        wire.into_datum(allowance, limits)
    }

    /// Convert an already-parsed JSON value.
    pub fn from_json(
        value: serde_json::Value,
        allowance: PtypeAllowance,
        limits: Limits,
    ) -> Result<Self> {
        let wire: WireDatum = serde_json::from_value(value)
            .map_err(|err| DatumError::logic(format!("failed to parse JSON: {err}")))?;

        wire.into_datum(allowance, limits)
    }

    /// Render as a `serde_json` value; extrema do not convert.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|err| DatumError::logic(err.to_string()))
    }

    /// Render as a JSON string; extrema do not convert.
    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|err| DatumError::logic(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        datum::PtypeTag,
        error::ErrorKind,
        limits::MAX_DATUM_DEPTH,
    };

    fn parse(input: &str) -> Result<Datum> {
        Datum::from_json_str(input, PtypeAllowance::none(), Limits::default())
    }

    #[test]
    fn documents_round_trip_through_json() {
        let input = r#"{"active":true,"name":"coral","score":12.5,"tags":[1,"two",null]}"#;
        let datum = parse(input).expect("parses");

        let rendered = datum.to_json_string().expect("renders");
        assert_eq!(rendered, input);
        assert_eq!(parse(&rendered).expect("parses"), datum);
    }

    #[test]
    fn integral_doubles_render_as_integers() {
        fn render(value: f64) -> String {
            Datum::number(value)
                .expect("finite number")
                .to_json_string()
                .expect("renders")
        }

        assert_eq!(render(5.0), "5");
        assert_eq!(render(-3.0), "-3");
        assert_eq!(render(0.0), "0");
        assert_eq!(render(5.5), "5.5");
        assert_eq!(render(9_007_199_254_740_992.0), "9007199254740992");

        // above 2^53 the double renders as a float but still round-trips
        let big = Datum::number(2f64.powi(54)).expect("finite number");
        let rendered = big.to_json_string().expect("renders");
        assert_eq!(parse(&rendered).expect("parses"), big);
    }

    #[test]
    fn extrema_do_not_convert() {
        let err = Datum::minval().to_json_string().expect_err("must fail");
        assert_eq!(err.message, "cannot convert `minval` to JSON");
        assert!(Datum::maxval().to_json().is_err());
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let err = parse(r#"{"a":1,"a":2}"#).expect_err("must fail");
        assert_eq!(err.message, "duplicate key `a` in object");
    }

    #[test]
    fn parse_errors_carry_the_source_message() {
        let err = parse("{").expect_err("must fail");
        assert!(err.message.starts_with("failed to parse JSON:"));
    }

    #[test]
    fn binary_wire_form_round_trips() {
        let input = r#"{"$reql_type$":"BINARY","data":"aGVsbG8="}"#;
        let datum = parse(input).expect("parses");

        assert_eq!(datum.as_binary().expect("binary"), b"hello");
        assert_eq!(datum.to_json_string().expect("renders"), input);
    }

    #[test]
    fn time_timezones_canonicalize() {
        let datum =
            parse(r#"{"$reql_type$":"TIME","epoch_time":1375147296.681,"timezone":"+05"}"#)
                .expect("parses");

        assert_eq!(datum.ptype_tag(), Some(PtypeTag::Time));
        assert_eq!(
            datum.get_field("timezone").expect("field").as_str().expect("str"),
            "+05:00"
        );
    }

    #[test]
    fn stray_literals_are_rejected() {
        let input = r#"{"a":{"$reql_type$":"LITERAL","value":1}}"#;

        let err = parse(input).expect_err("must fail");
        assert!(err.message.starts_with("stray literal keyword"));

        let datum = Datum::from_json_str(input, PtypeAllowance::with_literal(), Limits::default())
            .expect("parses");
        assert_eq!(
            datum.get_field("a").expect("field").ptype_tag(),
            Some(PtypeTag::Literal)
        );
    }

    #[test]
    fn nested_literals_are_rejected_even_when_allowed() {
        let input = r#"{"$reql_type$":"LITERAL","value":{"$reql_type$":"LITERAL","value":1}}"#;
        let err = Datum::from_json_str(input, PtypeAllowance::with_literal(), Limits::default())
            .expect_err("must fail");

        assert_eq!(
            err.message,
            "literal pseudo-types cannot nest inside other literals"
        );
    }

    #[test]
    fn unknown_ptype_tags_are_rejected() {
        let err = parse(r#"{"$reql_type$":"BOGUS"}"#).expect_err("must fail");
        assert_eq!(err.message, "unknown `$reql_type$` value `BOGUS`");
    }

    #[test]
    fn depth_cap_applies_to_parsing() {
        let nested = |depth: usize| format!("{}{}", "[".repeat(depth), "]".repeat(depth));

        assert!(parse(&nested(MAX_DATUM_DEPTH)).is_ok());
        let err = parse(&nested(MAX_DATUM_DEPTH + 1)).expect_err("must fail");
        assert_eq!(err.kind, ErrorKind::ResourceLimit);
    }

    #[test]
    fn array_limit_applies_to_parsing() {
        let err = Datum::from_json_str("[1,2,3]", PtypeAllowance::none(), Limits::new(2))
            .expect_err("must fail");
        assert_eq!(err.kind, ErrorKind::ResourceLimit);
    }

    #[test]
    fn from_json_accepts_parsed_values() {
        let value = serde_json::json!({"b": [true, null], "a": 1});
        let datum =
            Datum::from_json(value, PtypeAllowance::none(), Limits::default()).expect("converts");

        assert_eq!(
            datum.get_field("a").expect("field"),
            Datum::number(1.0).expect("finite number")
        );
        assert_eq!(datum.get_field("b").expect("field").arr_len().expect("array"), 2);
    }
}
