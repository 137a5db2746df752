pub(crate) mod compare;
mod kind;
mod merge;
pub(crate) mod ptype;
mod text;
mod wire;


use crate::{
    buffer::{BufArray, BufObject, codec},
    error::{DatumError, Result},
    limits::{self, Limits},
};
use bytes::Bytes;
use std::{
    fmt::{self, Write as _},
    sync::Arc,
};

// re-exports
pub use kind::DatumKind;
pub use merge::stats_merge;
pub use ptype::{PTYPE_FIELD, PtypeAllowance, PtypeTag};
pub use text::Text;

///
/// CONSTANTS
///

/// Rendering cap for values embedded in error messages.
const TRUNC_LEN: usize = 300;

/// Largest double with an exact integer round-trip (2^53).
const MAX_SAFE_INT: f64 = 9_007_199_254_740_992.0;

///
/// Cell
///
/// Storage cell behind `Datum`. Construction invariants (finite numbers with
/// no negative zero, sorted unique object keys, sanitized pseudo-types,
/// bounded nesting) are enforced by the `Datum` constructors and validation
/// seams, never here. The `Buf` variants are lazy views over a validated
/// storage buffer.
///

#[derive(Clone, Debug)]
pub(crate) enum Cell {
    Minval,
    Maxval,
    Null,
    Bool(bool),
    Num(f64),
    Str(Text),
    Binary(Bytes),
    Arr(Arc<Vec<Datum>>),
    Obj(Arc<Vec<(Text, Datum)>>),
    BufArr(BufArray),
    BufObj(BufObject),
}

///
/// Datum
///
/// Immutable value of the document model: the JSON types plus binary,
/// pseudo-types tagged through the reserved `$reql_type$` field, and the
/// `minval` / `maxval` query bounds. Cloning is cheap (shared payloads) and
/// the `Ord` impl is the total order every index relies on.
///

#[derive(Clone, Debug)]
pub struct Datum {
    cell: Cell,
}

impl Datum {
    ///
    /// CONSTRUCTION
    ///

    pub(crate) const fn from_cell(cell: Cell) -> Self {
        Self { cell }
    }

    #[must_use]
    pub const fn null() -> Self {
        Self::from_cell(Cell::Null)
    }

    /// Lower query bound; sorts before every value.
    #[must_use]
    pub const fn minval() -> Self {
        Self::from_cell(Cell::Minval)
    }

    /// Upper query bound; sorts after every value.
    #[must_use]
    pub const fn maxval() -> Self {
        Self::from_cell(Cell::Maxval)
    }

    #[must_use]
    pub const fn boolean(value: bool) -> Self {
        Self::from_cell(Cell::Bool(value))
    }

    /// Numbers must be finite; negative zero canonicalizes to positive zero
    /// so ordering and key encoding see a single zero.
    pub fn number(value: f64) -> Result<Self> {
        if !value.is_finite() {
            return Err(DatumError::logic(format!(
                "non-finite number `{value}` is not a valid value"
            )));
        }
        let value = if value == 0.0 { 0.0 } else { value };

        Ok(Self::from_cell(Cell::Num(value)))
    }

    #[must_use]
    pub fn string(value: impl Into<Text>) -> Self {
        Self::from_cell(Cell::Str(value.into()))
    }

    #[must_use]
    pub fn binary(value: impl Into<Bytes>) -> Self {
        Self::from_cell(Cell::Binary(value.into()))
    }

    /// Build an array, checking the size limit and the nesting cap.
    pub fn array(elements: Vec<Self>, limits: Limits) -> Result<Self> {
        limits.check_array_size(elements.len())?;
        let depth = 1 + elements.iter().map(Self::nesting_depth).max().unwrap_or(0);
        limits::check_depth(depth)?;

        Ok(Self::array_unchecked(elements))
    }

    /// Build an object from unordered entries: sorts by key bytes, rejects
    /// duplicates, checks the nesting cap. No pseudo-type interpretation.
    pub fn object(entries: Vec<(String, Self)>) -> Result<Self> {
        let mut entries: Vec<(Text, Self)> = entries
            .into_iter()
            .map(|(key, value)| (Text::from(key), value))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        for window in entries.windows(2) {
            if window[0].0 == window[1].0 {
                return Err(DatumError::logic(format!(
                    "duplicate key `{}` in object",
                    window[0].0
                )));
            }
        }
        let depth = 1 + entries
            .iter()
            .map(|(_, value)| value.nesting_depth())
            .max()
            .unwrap_or(0);
        limits::check_depth(depth)?;

        Ok(Self::object_presorted(entries))
    }

    /// Time pseudo-type from epoch seconds and an optional offset timezone.
    pub fn time(epoch_time: f64, timezone: Option<&str>) -> Result<Self> {
        let epoch = Self::number(epoch_time)?;
        let mut entries = vec![
            (Text::from(PTYPE_FIELD), Self::string(PtypeTag::Time.label())),
            (Text::from(ptype::time::EPOCH_TIME_FIELD), epoch),
        ];
        if let Some(tz) = timezone {
            let Some(canonical) = ptype::time::canonical_timezone(tz) else {
                return Err(DatumError::logic(format!("invalid timezone `{tz}`")));
            };
            entries.push((
                Text::from(ptype::time::TIMEZONE_FIELD),
                Self::string(canonical),
            ));
        }

        // field names are in byte order already
        Ok(Self::object_presorted(entries))
    }

    /// Array from elements the caller has already bounded.
    pub(crate) fn array_unchecked(elements: Vec<Self>) -> Self {
        Self::from_cell(Cell::Arr(Arc::new(elements)))
    }

    /// Object from entries already sorted by key bytes and unique.
    pub(crate) fn object_presorted(entries: Vec<(Text, Self)>) -> Self {
        debug_assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));

        Self::from_cell(Cell::Obj(Arc::new(entries)))
    }

    ///
    /// INTROSPECTION
    ///

    #[must_use]
    pub const fn kind(&self) -> DatumKind {
        match &self.cell {
            Cell::Minval => DatumKind::Minval,
            Cell::Maxval => DatumKind::Maxval,
            Cell::Null => DatumKind::Null,
            Cell::Bool(_) => DatumKind::Bool,
            Cell::Num(_) => DatumKind::Number,
            Cell::Str(_) => DatumKind::String,
            Cell::Binary(_) => DatumKind::Binary,
            Cell::Arr(_) | Cell::BufArr(_) => DatumKind::Array,
            Cell::Obj(_) | Cell::BufObj(_) => DatumKind::Object,
        }
    }

    /// True for the native binary cell and for any object carrying the
    /// reserved type field, known tag or not.
    #[must_use]
    pub fn is_ptype(&self) -> bool {
        matches!(self.cell, Cell::Binary(_))
            || (self.kind() == DatumKind::Object && self.get_field_opt(PTYPE_FIELD).is_some())
    }

    /// Recognized pseudo-type tag, if any.
    #[must_use]
    pub fn ptype_tag(&self) -> Option<PtypeTag> {
        match &self.cell {
            Cell::Binary(_) => Some(PtypeTag::Binary),
            Cell::Obj(_) | Cell::BufObj(_) => match self.get_field_opt(PTYPE_FIELD) {
                Some(tag) => match tag.cell() {
                    Cell::Str(text) => PtypeTag::from_bytes(text.as_bytes()),
                    _ => None,
                },
                None => None,
            },
            _ => None,
        }
    }

    /// Pseudo-type-aware display name.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self.ptype_tag() {
            Some(tag) => tag.display_name(),
            None => self.kind().name(),
        }
    }

    pub(crate) const fn cell(&self) -> &Cell {
        &self.cell
    }

    pub(crate) const fn num_opt(&self) -> Option<f64> {
        match &self.cell {
            Cell::Num(value) => Some(*value),
            _ => None,
        }
    }

    /// Container nesting depth; scalars are zero.
    pub(crate) fn nesting_depth(&self) -> usize {
        match &self.cell {
            Cell::Arr(_) | Cell::BufArr(_) => {
                1 + (0..self.elem_count())
                    .map(|i| self.elem(i).nesting_depth())
                    .max()
                    .unwrap_or(0)
            }
            Cell::Obj(_) | Cell::BufObj(_) => {
                1 + (0..self.pair_count())
                    .map(|i| self.pair(i).1.nesting_depth())
                    .max()
                    .unwrap_or(0)
            }
            _ => 0,
        }
    }

    ///
    /// SCALAR ACCESS
    ///

    pub fn as_bool(&self) -> Result<bool> {
        match &self.cell {
            Cell::Bool(value) => Ok(*value),
            _ => Err(self.type_mismatch("BOOL")),
        }
    }

    pub fn as_num(&self) -> Result<f64> {
        match &self.cell {
            Cell::Num(value) => Ok(*value),
            _ => Err(self.type_mismatch("NUMBER")),
        }
    }

    /// Integer accessor; fails on a fractional part or magnitude above 2^53.
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_int(&self) -> Result<i64> {
        let value = self.as_num()?;
        if !(-MAX_SAFE_INT..=MAX_SAFE_INT).contains(&value) {
            return Err(DatumError::logic(format!(
                "number not an integer (magnitude above 2^53): `{value}`"
            )));
        }
        if value.fract() != 0.0 {
            return Err(DatumError::logic(format!("number not an integer: `{value}`")));
        }

        Ok(value as i64)
    }

    pub fn as_str(&self) -> Result<&str> {
        match &self.cell {
            Cell::Str(text) => text
                .try_str()
                .map_err(|_| DatumError::logic("string payload is not valid utf-8")),
            _ => Err(self.type_mismatch("STRING")),
        }
    }

    pub fn as_binary(&self) -> Result<&[u8]> {
        match &self.cell {
            Cell::Binary(bytes) => Ok(bytes.as_ref()),
            _ => Err(self.type_mismatch("PTYPE<BINARY>")),
        }
    }

    ///
    /// CONTAINER ACCESS
    ///

    /// Element count; type error unless array.
    pub fn arr_len(&self) -> Result<usize> {
        match &self.cell {
            Cell::Arr(elements) => Ok(elements.len()),
            Cell::BufArr(view) => Ok(view.len()),
            _ => Err(self.type_mismatch("ARRAY")),
        }
    }

    /// Field count; type error unless object.
    pub fn obj_len(&self) -> Result<usize> {
        match &self.cell {
            Cell::Obj(entries) => Ok(entries.len()),
            Cell::BufObj(view) => Ok(view.len()),
            _ => Err(self.type_mismatch("OBJECT")),
        }
    }

    /// Array element; non-existence error when out of bounds.
    pub fn get(&self, index: usize) -> Result<Self> {
        let len = self.arr_len()?;
        if index >= len {
            return Err(DatumError::non_existence(format!(
                "index `{index}` out of bounds for array of size `{len}`"
            )));
        }

        Ok(self.elem(index))
    }

    /// Array element; `None` on a miss or a non-array receiver.
    #[must_use]
    pub fn get_opt(&self, index: usize) -> Option<Self> {
        match &self.cell {
            Cell::Arr(elements) => elements.get(index).cloned(),
            Cell::BufArr(view) => (index < view.len()).then(|| view.get(index)),
            _ => None,
        }
    }

    /// Object field; non-existence error on a miss.
    pub fn get_field(&self, name: &str) -> Result<Self> {
        match self.get_field_opt(name) {
            Some(value) => Ok(value),
            None if self.kind() == DatumKind::Object => Err(DatumError::non_existence(format!(
                "no attribute `{name}` in object: `{}`",
                self.trunc_print()
            ))),
            None => Err(self.type_mismatch("OBJECT")),
        }
    }

    /// Object field by binary search; `None` on a miss or a non-object
    /// receiver.
    #[must_use]
    pub fn get_field_opt(&self, name: &str) -> Option<Self> {
        self.field_by_bytes(name.as_bytes())
    }

    pub(crate) fn field_by_bytes(&self, name: &[u8]) -> Option<Self> {
        match &self.cell {
            Cell::Obj(entries) => entries
                .binary_search_by(|(key, _)| key.as_bytes().cmp(name))
                .ok()
                .map(|i| entries[i].1.clone()),
            Cell::BufObj(view) => view.field(name),
            _ => None,
        }
    }

    /// Iterate array elements; type error unless array.
    pub fn elems(&self) -> Result<Elems<'_>> {
        match &self.cell {
            Cell::Arr(elements) => Ok(Elems {
                inner: ElemsInner::Owned(elements.iter()),
            }),
            Cell::BufArr(view) => Ok(Elems {
                inner: ElemsInner::Buf { view, next: 0 },
            }),
            _ => Err(self.type_mismatch("ARRAY")),
        }
    }

    /// Iterate sorted field pairs; type error unless object.
    pub fn pairs(&self) -> Result<Pairs<'_>> {
        match &self.cell {
            Cell::Obj(entries) => Ok(Pairs {
                inner: PairsInner::Owned(entries.iter()),
            }),
            Cell::BufObj(view) => Ok(Pairs {
                inner: PairsInner::Buf { view, next: 0 },
            }),
            _ => Err(self.type_mismatch("OBJECT")),
        }
    }

    // Infallible container accessors for walks that hold the array/object
    // invariant already. Misuse yields a neutral value, never a panic.

    pub(crate) fn elem_count(&self) -> usize {
        match &self.cell {
            Cell::Arr(elements) => elements.len(),
            Cell::BufArr(view) => view.len(),
            _ => 0,
        }
    }

    pub(crate) fn elem(&self, index: usize) -> Self {
        match &self.cell {
            Cell::Arr(elements) => elements[index].clone(),
            Cell::BufArr(view) => view.get(index),
            _ => {
                debug_assert!(false, "elem() on a non-array");
                Self::null()
            }
        }
    }

    pub(crate) fn pair_count(&self) -> usize {
        match &self.cell {
            Cell::Obj(entries) => entries.len(),
            Cell::BufObj(view) => view.len(),
            _ => 0,
        }
    }

    pub(crate) fn pair(&self, index: usize) -> (Text, Self) {
        match &self.cell {
            Cell::Obj(entries) => entries[index].clone(),
            Cell::BufObj(view) => view.pair(index),
            _ => {
                debug_assert!(false, "pair() on a non-object");
                (Text::from(""), Self::null())
            }
        }
    }

    ///
    /// STORAGE
    ///

    /// Encode into the storage byte format.
    pub fn to_raw(&self) -> Result<Vec<u8>> {
        codec::encode(self)
    }

    /// Decode the storage byte format. The whole buffer is validated once up
    /// front; containers come back as zero-copy views over it.
    pub fn try_from_raw(buf: impl Into<Bytes>) -> Result<Self> {
        codec::decode(buf.into())
    }

    ///
    /// RENDERING
    ///

    /// Bounded JSON-ish rendering for diagnostics. Deliberately lossy:
    /// extrema and invalid UTF-8 still render.
    #[must_use]
    pub fn trunc_print(&self) -> String {
        let mut out = String::new();
        self.debug_render(&mut out);
        if out.len() > TRUNC_LEN {
            let mut cut = TRUNC_LEN - 3;
            while !out.is_char_boundary(cut) {
                cut -= 1;
            }
            out.truncate(cut);
            out.push_str("...");
        }

        out
    }

    fn debug_render(&self, out: &mut String) {
        match &self.cell {
            Cell::Minval => out.push_str("minval"),
            Cell::Maxval => out.push_str("maxval"),
            Cell::Null => out.push_str("null"),
            Cell::Bool(true) => out.push_str("true"),
            Cell::Bool(false) => out.push_str("false"),
            Cell::Num(value) => {
                let _ = write!(out, "{value}");
            }
            Cell::Str(text) => {
                let _ = write!(out, "{:?}", text.to_lossy());
            }
            Cell::Binary(bytes) => {
                let _ = write!(out, "<binary, {} bytes>", bytes.len());
            }
            Cell::Arr(_) | Cell::BufArr(_) => {
                out.push('[');
                for i in 0..self.elem_count() {
                    if i > 0 {
                        out.push(',');
                    }
                    self.elem(i).debug_render(out);
                }
                out.push(']');
            }
            Cell::Obj(_) | Cell::BufObj(_) => {
                out.push('{');
                for i in 0..self.pair_count() {
                    if i > 0 {
                        out.push(',');
                    }
                    let (key, value) = self.pair(i);
                    let _ = write!(out, "{:?}:", key.to_lossy());
                    value.debug_render(out);
                }
                out.push('}');
            }
        }
    }

    pub(crate) fn type_mismatch(&self, expected: &str) -> DatumError {
        DatumError::type_error(format!(
            "expected type {expected} but found {}: `{}`",
            self.type_name(),
            self.trunc_print()
        ))
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        self.debug_render(&mut out);
        write!(f, "{out}")
    }
}

impl From<bool> for Datum {
    fn from(value: bool) -> Self {
        Self::boolean(value)
    }
}

impl From<&str> for Datum {
    fn from(value: &str) -> Self {
        Self::string(value)
    }
}

impl From<String> for Datum {
    fn from(value: String) -> Self {
        Self::string(value)
    }
}

// bytes are binary payload, not an array of numbers
impl From<Vec<u8>> for Datum {
    fn from(value: Vec<u8>) -> Self {
        Self::binary(value)
    }
}

impl TryFrom<f64> for Datum {
    type Error = DatumError;

    fn try_from(value: f64) -> Result<Self> {
        Self::number(value)
    }
}

macro_rules! impl_from_int {
    ($($int:ty),* $(,)?) => {
        $(
            impl From<$int> for Datum {
                fn from(value: $int) -> Self {
                    Self::from_cell(Cell::Num(f64::from(value)))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, u8, u16, u32);

///
/// Elems
///
/// Iterator over array elements. Payload handles are shared, so items are
/// cloned out of both representations.
///

pub struct Elems<'a> {
    inner: ElemsInner<'a>,
}

enum ElemsInner<'a> {
    Owned(std::slice::Iter<'a, Datum>),
    Buf { view: &'a BufArray, next: usize },
}

impl Iterator for Elems<'_> {
    type Item = Datum;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            ElemsInner::Owned(iter) => iter.next().cloned(),
            ElemsInner::Buf { view, next } => {
                if *next >= view.len() {
                    return None;
                }
                let element = view.get(*next);
                *next += 1;

                Some(element)
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match &self.inner {
            ElemsInner::Owned(iter) => iter.len(),
            ElemsInner::Buf { view, next } => view.len() - *next,
        };

        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Elems<'_> {}

///
/// Pairs
///
/// Iterator over an object's field pairs in key byte order.
///

pub struct Pairs<'a> {
    inner: PairsInner<'a>,
}

enum PairsInner<'a> {
    Owned(std::slice::Iter<'a, (Text, Datum)>),
    Buf { view: &'a BufObject, next: usize },
}

impl Iterator for Pairs<'_> {
    type Item = (Text, Datum);

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.inner {
            PairsInner::Owned(iter) => iter.next().cloned(),
            PairsInner::Buf { view, next } => {
                if *next >= view.len() {
                    return None;
                }
                let pair = view.pair(*next);
                *next += 1;

                Some(pair)
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match &self.inner {
            PairsInner::Owned(iter) => iter.len(),
            PairsInner::Buf { view, next } => view.len() - *next,
        };

        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Pairs<'_> {}
