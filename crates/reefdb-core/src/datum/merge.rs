use crate::{
    builder::{ArrayBuilder, ObjectBuilder},
    datum::{Datum, DatumKind, PtypeTag, Text, ptype::literal},
    error::{DatumError, Result},
    limits::Limits,
};
use std::collections::BTreeSet;

impl Datum {
    /// Right-biased deep merge.
    ///
    /// Anything other than object-into-object resolves to `rhs` (stripped of
    /// literal directives). Otherwise fields merge one by one: shared object
    /// fields recurse, a literal directive substitutes its `value` (or deletes
    /// the field when it carries none), and everything else overwrites.
    pub fn merge(&self, rhs: &Self) -> Result<Self> {
        if self.kind() != DatumKind::Object
            || rhs.kind() != DatumKind::Object
            || rhs.ptype_tag() == Some(PtypeTag::Literal)
        {
            let (stripped, _) = rhs.drop_literals();
            return Ok(stripped.unwrap_or_else(Self::null));
        }

        let mut out = ObjectBuilder::from_datum(self);
        for (key, incoming) in rhs.pairs()? {
            let is_literal = incoming.ptype_tag() == Some(PtypeTag::Literal);

            if let Some(current) = self.field_by_bytes(key.as_bytes())
                && incoming.kind() == DatumKind::Object
                && !is_literal
            {
                out.overwrite(key, current.merge(&incoming)?);
                continue;
            }

            let substituted = if is_literal {
                incoming.get_field_opt(literal::VALUE_FIELD)
            } else {
                Some(incoming)
            };
            let value = substituted.and_then(|value| {
                let (stripped, nested) = value.drop_literals();
                debug_assert!(
                    !(nested && is_literal),
                    "literal value must not contain nested literals"
                );
                stripped
            });
            match value {
                Some(value) => out.overwrite(key, value),
                None => {
                    out.delete_field_by_bytes(key.as_bytes());
                }
            }
        }

        out.to_datum()
    }

    /// Merge with a caller-supplied conflict resolver.
    ///
    /// Both sides must be objects. Fields present on both sides go through
    /// `resolver`; fields only on the right are added as-is. `conditions`
    /// collects non-fatal warnings the resolver wants surfaced.
    pub fn merge_with<F>(
        &self,
        rhs: &Self,
        mut resolver: F,
        limits: Limits,
        conditions: &mut BTreeSet<String>,
    ) -> Result<Self>
    where
        F: FnMut(&Text, &Self, &Self, Limits, &mut BTreeSet<String>) -> Result<Self>,
    {
        if self.kind() != DatumKind::Object {
            return Err(self.type_mismatch("OBJECT"));
        }

        let mut out = ObjectBuilder::from_datum(self);
        for (key, right) in rhs.pairs()? {
            match self.field_by_bytes(key.as_bytes()) {
                Some(left) => {
                    let resolved = resolver(&key, &left, &right, limits, conditions)?;
                    out.overwrite(key, resolved);
                }
                None => out.overwrite(key, right),
            }
        }

        out.to_datum()
    }

    /// Strip literal directives from a value, copy-on-write.
    ///
    /// Returns the stripped value (`None` when the value was a bare literal
    /// with no `value` payload) and whether any literal was encountered.
    /// Array elements and object fields that vanish are removed. Containers
    /// rebuild only on the first change; an untouched value comes back as a
    /// cheap clone.
    #[must_use]
    pub fn drop_literals(&self) -> (Option<Self>, bool) {
        if self.ptype_tag() == Some(PtypeTag::Literal) {
            let stripped = self.get_field_opt(literal::VALUE_FIELD).and_then(|value| {
                let (value, nested) = value.drop_literals();
                debug_assert!(!nested, "nested literal inside a literal value");
                value
            });
            return (stripped, true);
        }

        match self.kind() {
            DatumKind::Array => {
                let len = self.elem_count();
                let mut rebuilt: Option<Vec<Self>> = None;
                for i in 0..len {
                    let (stripped, changed) = self.elem(i).drop_literals();
                    if changed && rebuilt.is_none() {
                        rebuilt = Some((0..i).map(|j| self.elem(j)).collect());
                    }
                    if let Some(out) = &mut rebuilt
                        && let Some(value) = stripped
                    {
                        out.push(value);
                    }
                }
                match rebuilt {
                    Some(elements) => (Some(Self::array_unchecked(elements)), true),
                    None => (Some(self.clone()), false),
                }
            }
            DatumKind::Object => {
                let len = self.pair_count();
                let mut rebuilt: Option<Vec<(Text, Self)>> = None;
                for i in 0..len {
                    let (key, value) = self.pair(i);
                    let (stripped, changed) = value.drop_literals();
                    if changed && rebuilt.is_none() {
                        rebuilt = Some((0..i).map(|j| self.pair(j)).collect());
                    }
                    if let Some(out) = &mut rebuilt
                        && let Some(value) = stripped
                    {
                        out.push((key, value));
                    }
                }
                match rebuilt {
                    Some(entries) => (Some(Self::object_presorted(entries)), true),
                    None => (Some(self.clone()), false),
                }
            }
            _ => (Some(self.clone()), false),
        }
    }
}

/// Conflict resolver for write-statistics objects (inserted/replaced counts,
/// generated keys, change feeds). Numbers add, arrays concatenate left then
/// right up to the array size limit, matching strings keep the left value.
pub fn stats_merge(
    _key: &Text,
    left: &Datum,
    right: &Datum,
    limits: Limits,
    conditions: &mut BTreeSet<String>,
) -> Result<Datum> {
    if left.kind() == DatumKind::Number && right.kind() == DatumKind::Number {
        return Datum::number(left.as_num()? + right.as_num()?);
    }
    if left.kind() == DatumKind::Array && right.kind() == DatumKind::Array {
        let cap = limits.array_size_limit();
        let mut out = ArrayBuilder::new(limits);
        let mut truncated = false;
        for side in [left, right] {
            for element in side.elems()? {
                if out.len() >= cap {
                    truncated = true;
                    break;
                }
                out.add(element)?;
            }
        }
        if truncated {
            conditions.insert(format!("too many changes, array truncated to {cap}"));
        }
        return out.to_datum();
    }
    if left.kind() == DatumKind::String && right.kind() == DatumKind::String {
        return Ok(left.clone());
    }

    Err(DatumError::logic(format!(
        "cannot merge statistics `{}` (type {}) and `{}` (type {})",
        left.trunc_print(),
        left.type_name(),
        right.trunc_print(),
        right.type_name()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datum::ptype::PTYPE_FIELD;

    fn num(value: f64) -> Datum {
        Datum::number(value).expect("finite number")
    }

    fn obj(entries: Vec<(&str, Datum)>) -> Datum {
        let entries = entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect();
        Datum::object(entries).expect("valid object")
    }

    fn arr(elements: Vec<Datum>) -> Datum {
        Datum::array(elements, Limits::default()).expect("valid array")
    }

    fn literal(value: Option<Datum>) -> Datum {
        let mut entries = vec![(PTYPE_FIELD.to_string(), Datum::string("LITERAL"))];
        if let Some(value) = value {
            entries.push(("value".to_string(), value));
        }
        Datum::object(entries).expect("valid literal shape")
    }

    #[test]
    fn rhs_wins_when_either_side_is_not_an_object() {
        let object = obj(vec![("a", num(1.0))]);

        assert_eq!(num(5.0).merge(&object).expect("merges"), object);
        assert_eq!(object.merge(&num(5.0)).expect("merges"), num(5.0));
        assert_eq!(
            Datum::string("x").merge(&Datum::null()).expect("merges"),
            Datum::null()
        );
    }

    #[test]
    fn rhs_literal_substitutes_at_top_level() {
        let object = obj(vec![("a", num(1.0))]);

        let replacement = obj(vec![("b", num(2.0))]);
        assert_eq!(
            object.merge(&literal(Some(replacement.clone()))).expect("merges"),
            replacement
        );
        assert_eq!(object.merge(&literal(None)).expect("merges"), Datum::null());
    }

    #[test]
    fn merges_objects_field_by_field() {
        let left = obj(vec![("a", num(1.0)), ("b", num(2.0))]);
        let right = obj(vec![("b", num(3.0)), ("c", num(4.0))]);

        let merged = left.merge(&right).expect("merges");
        assert_eq!(
            merged,
            obj(vec![("a", num(1.0)), ("b", num(3.0)), ("c", num(4.0))])
        );
    }

    #[test]
    fn shared_object_fields_merge_recursively() {
        let left = obj(vec![("a", obj(vec![("x", num(1.0)), ("y", num(2.0))]))]);
        let right = obj(vec![("a", obj(vec![("y", num(3.0)), ("z", num(4.0))]))]);

        let merged = left.merge(&right).expect("merges");
        assert_eq!(
            merged,
            obj(vec![(
                "a",
                obj(vec![("x", num(1.0)), ("y", num(3.0)), ("z", num(4.0))])
            )])
        );
    }

    #[test]
    fn merge_is_idempotent() {
        let value = obj(vec![
            ("a", num(1.0)),
            ("b", arr(vec![num(1.0), Datum::string("two")])),
            ("c", obj(vec![("nested", Datum::boolean(true))])),
        ]);

        assert_eq!(value.merge(&value).expect("merges"), value);
    }

    #[test]
    fn literal_field_substitutes_without_recursion() {
        let left = obj(vec![("a", obj(vec![("x", num(1.0))]))]);
        let replacement = obj(vec![("y", num(2.0))]);
        let right = obj(vec![("a", literal(Some(replacement.clone())))]);

        assert_eq!(
            left.merge(&right).expect("merges"),
            obj(vec![("a", replacement)])
        );
    }

    #[test]
    fn valueless_literal_deletes_the_field() {
        let left = obj(vec![("a", num(1.0)), ("b", num(2.0))]);
        let right = obj(vec![("a", literal(None))]);

        assert_eq!(left.merge(&right).expect("merges"), obj(vec![("b", num(2.0))]));
    }

    #[test]
    fn literals_strip_inside_added_fields() {
        let left = obj(vec![]);
        let right = obj(vec![("a", obj(vec![("b", literal(Some(num(5.0))))]))]);
        assert_eq!(
            left.merge(&right).expect("merges"),
            obj(vec![("a", obj(vec![("b", num(5.0))]))])
        );

        let right = obj(vec![("a", obj(vec![("b", literal(None))]))]);
        assert_eq!(
            left.merge(&right).expect("merges"),
            obj(vec![("a", obj(vec![]))])
        );
    }

    #[test]
    fn drop_literals_is_copy_on_write() {
        let plain = obj(vec![("a", arr(vec![num(1.0)]))]);
        let (stripped, changed) = plain.drop_literals();
        assert_eq!(stripped, Some(plain));
        assert!(!changed);

        let (stripped, changed) = literal(None).drop_literals();
        assert_eq!(stripped, None);
        assert!(changed);

        let with_nested = obj(vec![("a", literal(Some(num(7.0))))]);
        let (stripped, changed) = with_nested.drop_literals();
        assert_eq!(stripped, Some(obj(vec![("a", num(7.0))])));
        assert!(changed);
    }

    #[test]
    fn drop_literals_removes_vanished_array_elements() {
        let array = arr(vec![num(1.0), literal(None), num(2.0)]);
        let (stripped, changed) = array.drop_literals();

        assert_eq!(stripped, Some(arr(vec![num(1.0), num(2.0)])));
        assert!(changed);
    }

    #[test]
    fn merge_with_resolves_shared_fields() {
        let left = obj(vec![("a", num(1.0)), ("b", num(1.0))]);
        let right = obj(vec![("b", num(2.0)), ("c", num(3.0))]);
        let mut conditions = BTreeSet::new();

        let merged = left
            .merge_with(&right, stats_merge, Limits::default(), &mut conditions)
            .expect("merges");
        assert_eq!(
            merged,
            obj(vec![("a", num(1.0)), ("b", num(3.0)), ("c", num(3.0))])
        );
        assert!(conditions.is_empty());
    }

    #[test]
    fn merge_with_requires_objects() {
        let mut conditions = BTreeSet::new();
        let err = num(1.0)
            .merge_with(&obj(vec![]), stats_merge, Limits::default(), &mut conditions)
            .expect_err("must fail");
        assert!(err.is_type());

        let err = obj(vec![])
            .merge_with(&num(1.0), stats_merge, Limits::default(), &mut conditions)
            .expect_err("must fail");
        assert!(err.is_type());
    }

    #[test]
    fn stats_merge_adds_numbers() {
        let mut conditions = BTreeSet::new();
        let sum = stats_merge(
            &Text::from("inserted"),
            &num(2.0),
            &num(3.0),
            Limits::default(),
            &mut conditions,
        )
        .expect("merges");

        assert_eq!(sum, num(5.0));
    }

    #[test]
    fn stats_merge_rejects_overflowing_numbers() {
        let mut conditions = BTreeSet::new();
        let err = stats_merge(
            &Text::from("inserted"),
            &num(f64::MAX),
            &num(f64::MAX),
            Limits::default(),
            &mut conditions,
        )
        .expect_err("must fail");

        assert!(err.message.contains("non-finite"));
    }

    #[test]
    fn stats_merge_concatenates_left_then_right() {
        let mut conditions = BTreeSet::new();
        let merged = stats_merge(
            &Text::from("changes"),
            &arr(vec![num(1.0), num(2.0)]),
            &arr(vec![num(3.0)]),
            Limits::default(),
            &mut conditions,
        )
        .expect("merges");

        assert_eq!(merged, arr(vec![num(1.0), num(2.0), num(3.0)]));
        assert!(conditions.is_empty());
    }

    #[test]
    fn stats_merge_truncates_and_records_a_condition() {
        let limits = Limits::new(2);
        let mut conditions = BTreeSet::new();
        let merged = stats_merge(
            &Text::from("changes"),
            &Datum::array(vec![num(1.0), num(2.0)], limits).expect("array"),
            &Datum::array(vec![num(3.0)], limits).expect("array"),
            limits,
            &mut conditions,
        )
        .expect("merges");

        assert_eq!(
            merged,
            Datum::array(vec![num(1.0), num(2.0)], limits).expect("array")
        );
        assert!(conditions.contains("too many changes, array truncated to 2"));
    }

    #[test]
    fn stats_merge_keeps_the_left_string() {
        let mut conditions = BTreeSet::new();
        let merged = stats_merge(
            &Text::from("first_error"),
            &Datum::string("left"),
            &Datum::string("right"),
            Limits::default(),
            &mut conditions,
        )
        .expect("merges");

        assert_eq!(merged, Datum::string("left"));
    }

    #[test]
    fn stats_merge_rejects_mismatched_types() {
        let mut conditions = BTreeSet::new();
        let err = stats_merge(
            &Text::from("inserted"),
            &num(1.0),
            &Datum::string("one"),
            Limits::default(),
            &mut conditions,
        )
        .expect_err("must fail");

        assert_eq!(
            err.message,
            "cannot merge statistics `1` (type NUMBER) and `\"one\"` (type STRING)"
        );
    }
}
