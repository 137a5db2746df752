use crate::{
    datum::{Datum, DatumKind},
    error::{DatumError, Result},
    limits::{self, Limits},
};

///
/// ArrayBuilder
///
/// Mutable array under construction. The size limit applies to growth through
/// `add`; `insert` and `splice` skip it so that arrays persisted before a
/// limit was lowered stay editable.
///

#[derive(Debug)]
pub struct ArrayBuilder {
    elements: Vec<Datum>,
    limits: Limits,
}

impl ArrayBuilder {
    #[must_use]
    pub fn new(limits: Limits) -> Self {
        Self {
            elements: Vec::new(),
            limits,
        }
    }

    /// Start from an existing array's elements.
    #[must_use]
    pub fn from_datum(datum: &Datum, limits: Limits) -> Self {
        debug_assert!(datum.kind() == DatumKind::Array);

        let elements = (0..datum.elem_count()).map(|i| datum.elem(i)).collect();

        Self { elements, limits }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Append, then check the size limit.
    pub fn add(&mut self, value: Datum) -> Result<()> {
        self.elements.push(value);

        self.limits.check_array_size(self.elements.len())
    }

    /// Replace the element at `index`.
    pub fn change(&mut self, index: usize, value: Datum) -> Result<()> {
        let len = self.elements.len();
        match self.elements.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(out_of_bounds(index, len)),
        }
    }

    /// Insert at `index`, shifting the tail. The size limit is deliberately
    /// not applied here.
    pub fn insert(&mut self, index: usize, value: Datum) -> Result<()> {
        if index > self.elements.len() {
            return Err(out_of_bounds(index, self.elements.len()));
        }
        self.elements.insert(index, value);

        Ok(())
    }

    /// Splice an array in at `index`. Skips the size limit, as `insert` does.
    pub fn splice(&mut self, index: usize, values: &Datum) -> Result<()> {
        if index > self.elements.len() {
            return Err(out_of_bounds(index, self.elements.len()));
        }
        let incoming: Vec<Datum> = values.elems()?.collect();
        self.elements.splice(index..index, incoming);

        Ok(())
    }

    /// Remove the element at `index`.
    pub fn erase(&mut self, index: usize) -> Result<()> {
        if index >= self.elements.len() {
            return Err(out_of_bounds(index, self.elements.len()));
        }
        self.elements.remove(index);

        Ok(())
    }

    /// Remove the elements in `start..end` (end exclusive).
    pub fn erase_range(&mut self, start: usize, end: usize) -> Result<()> {
        let len = self.elements.len();
        if start > len {
            return Err(out_of_bounds(start, len));
        }
        if end > len {
            return Err(out_of_bounds(end, len));
        }
        if start > end {
            return Err(DatumError::logic(format!(
                "start index `{start}` is greater than end index `{end}`"
            )));
        }
        self.elements.drain(start..end);

        Ok(())
    }

    /// Finish into an array datum. The size limit is not re-applied, so an
    /// over-limit array built through `insert` or `splice` still finishes;
    /// only nesting is checked.
    pub fn to_datum(self) -> Result<Datum> {
        let depth = 1 + self
            .elements
            .iter()
            .map(Datum::nesting_depth)
            .max()
            .unwrap_or(0);
        limits::check_depth(depth)?;

        Ok(Datum::array_unchecked(self.elements))
    }
}

fn out_of_bounds(index: usize, len: usize) -> DatumError {
    DatumError::non_existence(format!(
        "index `{index}` out of bounds for array of size `{len}`"
    ))
}
