use crate::{
    datum::{Datum, DatumKind, PtypeAllowance, Text, ptype},
    error::Result,
    limits::{self, Limits},
};
use std::collections::{BTreeMap, BTreeSet, btree_map::Entry};

/// Field collecting non-fatal warnings on a write-result document.
pub const WARNINGS_FIELD: &str = "warnings";

/// Field counting errors on a write-result document.
pub const ERRORS_FIELD: &str = "errors";

/// Field holding the first error message on a write-result document.
pub const FIRST_ERROR_FIELD: &str = "first_error";

///
/// ObjectBuilder
///
/// Mutable object under construction. Keys stay unique by construction; the
/// finished object comes out sorted and depth-checked. The write-result
/// helpers maintain the `warnings` / `errors` / `first_error` bookkeeping
/// fields of command responses.
///

#[derive(Debug, Default)]
pub struct ObjectBuilder {
    map: BTreeMap<Text, Datum>,
}

impl ObjectBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing object's fields.
    #[must_use]
    pub fn from_datum(datum: &Datum) -> Self {
        debug_assert!(datum.kind() == DatumKind::Object);

        let map = (0..datum.pair_count()).map(|i| datum.pair(i)).collect();

        Self { map }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Add a field. Returns `true`, leaving the builder untouched, when the
    /// key is already present.
    #[must_use]
    pub fn add(&mut self, key: impl Into<Text>, value: Datum) -> bool {
        match self.map.entry(key.into()) {
            Entry::Occupied(_) => true,
            Entry::Vacant(slot) => {
                slot.insert(value);
                false
            }
        }
    }

    /// Set a field unconditionally.
    pub fn overwrite(&mut self, key: impl Into<Text>, value: Datum) {
        self.map.insert(key.into(), value);
    }

    /// Remove a field; `true` when it was present.
    pub fn delete_field(&mut self, name: &str) -> bool {
        self.delete_field_by_bytes(name.as_bytes())
    }

    pub(crate) fn delete_field_by_bytes(&mut self, name: &[u8]) -> bool {
        self.map.remove(name).is_some()
    }

    /// Current value of a field, if present.
    #[must_use]
    pub fn try_get(&self, name: &str) -> Option<Datum> {
        self.map.get(name.as_bytes()).cloned()
    }

    /// Append to the `warnings` array field, ignoring repeats of a message
    /// already recorded.
    pub fn add_warning(&mut self, msg: &str, limits: Limits) -> Result<()> {
        let mut elements: Vec<Datum> = match self.map.get(WARNINGS_FIELD.as_bytes()) {
            Some(existing) => {
                for element in existing.elems()? {
                    if element.as_str()? == msg {
                        return Ok(());
                    }
                }
                existing.elems()?.collect()
            }
            None => Vec::new(),
        };
        elements.push(Datum::string(msg));
        let warnings = Datum::array(elements, limits)?;
        self.map.insert(Text::from(WARNINGS_FIELD), warnings);

        Ok(())
    }

    /// Merge a batch of warning messages.
    pub fn add_warnings(&mut self, msgs: &BTreeSet<String>, limits: Limits) -> Result<()> {
        for msg in msgs {
            self.add_warning(msg, limits)?;
        }

        Ok(())
    }

    /// Bump the `errors` counter and record `msg` as `first_error` if no
    /// earlier error claimed it.
    pub fn add_error(&mut self, msg: &str) -> Result<()> {
        let count = match self.map.get(ERRORS_FIELD.as_bytes()) {
            Some(existing) => existing.as_num()? + 1.0,
            None => 1.0,
        };
        self.map.insert(Text::from(ERRORS_FIELD), Datum::number(count)?);
        self.map
            .entry(Text::from(FIRST_ERROR_FIELD))
            .or_insert_with(|| Datum::string(msg));

        Ok(())
    }

    /// Finish into an object datum.
    pub fn to_datum(self) -> Result<Datum> {
        let entries: Vec<(Text, Datum)> = self.map.into_iter().collect();
        let depth = 1 + entries
            .iter()
            .map(|(_, value)| value.nesting_depth())
            .max()
            .unwrap_or(0);
        limits::check_depth(depth)?;

        Ok(Datum::object_presorted(entries))
    }

    /// Finish, sanitizing a pseudo-type shape at the top level.
    pub fn to_datum_with(self, allowance: PtypeAllowance) -> Result<Datum> {
        let datum = self.to_datum()?;

        ptype::sanitize_object(datum, allowance)
    }
}
