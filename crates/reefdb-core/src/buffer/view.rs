use crate::{
    buffer::{
        LEN_SIZE, TAG_ARR, TAG_BINARY, TAG_FALSE, TAG_NULL, TAG_NUM, TAG_OBJ, TAG_STR, TAG_TRUE,
        read_f64, read_u32,
    },
    datum::{Cell, Datum, Text},
};
use bytes::Bytes;
use std::cmp::Ordering;

/// Materialize one validated value region into a datum.
///
/// Scalars slice their payload out of the buffer; containers wrap it in a
/// view. Only called on regions `codec` has validated, so access is
/// infallible.
pub(crate) fn materialize(data: Bytes) -> Datum {
    match data[0] {
        TAG_NULL => Datum::null(),
        TAG_FALSE => Datum::boolean(false),
        TAG_TRUE => Datum::boolean(true),
        TAG_NUM => Datum::from_cell(Cell::Num(read_f64(&data, 1))),
        TAG_STR => {
            let payload = data.slice(1 + LEN_SIZE..);
            Datum::from_cell(Cell::Str(Text::from_validated(payload)))
        }
        TAG_BINARY => Datum::from_cell(Cell::Binary(data.slice(1 + LEN_SIZE..))),
        TAG_ARR => Datum::from_cell(Cell::BufArr(BufArray::new(data))),
        TAG_OBJ => Datum::from_cell(Cell::BufObj(BufObject::new(data))),
        _ => {
            debug_assert!(false, "materialize on an unvalidated region");
            Datum::null()
        }
    }
}

/// Span of element `index` inside a validated container, bounds absolute
/// within `data`.
fn span_in(data: &Bytes, count: usize, index: usize) -> (usize, usize) {
    let table = 1 + LEN_SIZE;
    let region = table + count * LEN_SIZE;
    let start = region + read_u32(data, table + index * LEN_SIZE);
    let end = if index + 1 < count {
        region + read_u32(data, table + (index + 1) * LEN_SIZE)
    } else {
        data.len()
    };

    (start, end)
}

///
/// BufArray
///
/// Zero-copy array view over one validated raw-array region (tag byte
/// included). Element spans come from the offset table and `get` cannot
/// fail.
///

#[derive(Clone, Debug)]
pub(crate) struct BufArray {
    data: Bytes,
    count: usize,
}

impl BufArray {
    pub(crate) fn new(data: Bytes) -> Self {
        debug_assert_eq!(data.first(), Some(&TAG_ARR));
        let count = read_u32(&data, 1);

        Self { data, count }
    }

    pub(crate) const fn len(&self) -> usize {
        self.count
    }

    pub(crate) fn get(&self, index: usize) -> Datum {
        let (start, end) = span_in(&self.data, self.count, index);

        materialize(self.data.slice(start..end))
    }
}

///
/// BufObject
///
/// Zero-copy object view over one validated raw-object region. Pairs are in
/// key byte order, so field lookup is binary search over the spans.
///

#[derive(Clone, Debug)]
pub(crate) struct BufObject {
    data: Bytes,
    count: usize,
}

impl BufObject {
    pub(crate) fn new(data: Bytes) -> Self {
        debug_assert_eq!(data.first(), Some(&TAG_OBJ));
        let count = read_u32(&data, 1);

        Self { data, count }
    }

    pub(crate) const fn len(&self) -> usize {
        self.count
    }

    pub(crate) fn pair(&self, index: usize) -> (Text, Datum) {
        let (_, span_end) = span_in(&self.data, self.count, index);
        let (key_start, key_end) = self.key_range(index);
        let key = Text::from_validated(self.data.slice(key_start..key_end));
        let value = materialize(self.data.slice(key_end..span_end));

        (key, value)
    }

    pub(crate) fn field(&self, name: &[u8]) -> Option<Datum> {
        let mut lo = 0;
        let mut hi = self.count;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let (key_start, key_end) = self.key_range(mid);
            match self.data[key_start..key_end].cmp(name) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => {
                    let (_, span_end) = span_in(&self.data, self.count, mid);
                    return Some(materialize(self.data.slice(key_end..span_end)));
                }
            }
        }

        None
    }

    fn key_range(&self, index: usize) -> (usize, usize) {
        let (span_start, _) = span_in(&self.data, self.count, index);
        let key_len = read_u32(&self.data, span_start);
        let key_start = span_start + LEN_SIZE;

        (key_start, key_start + key_len)
    }
}
