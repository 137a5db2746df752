use crate::datum::{
    Cell, Datum, DatumKind,
    ptype::{PtypeTag, time},
};
use std::cmp::Ordering;

impl PartialEq for Datum {
    fn eq(&self, other: &Self) -> bool {
        cmp_datums(self, other) == Ordering::Equal
    }
}

impl Eq for Datum {}

impl PartialOrd for Datum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Datum {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_datums(self, other)
    }
}

/// Pseudo-types with their own payload ordering rule. Geometry and literal
/// shapes fall through and order structurally as plain objects.
#[derive(Clone, Copy, Eq, PartialEq)]
enum KeyedPtype {
    Binary,
    Time,
}

impl KeyedPtype {
    const fn tag(self) -> PtypeTag {
        match self {
            Self::Binary => PtypeTag::Binary,
            Self::Time => PtypeTag::Time,
        }
    }

    /// Type name used when interleaving with plain kinds.
    const fn sorting_name(self) -> &'static str {
        match self {
            Self::Binary => "PTYPE<BINARY>",
            Self::Time => "PTYPE<TIME>",
        }
    }
}

fn keyed_ptype(datum: &Datum) -> Option<KeyedPtype> {
    match datum.ptype_tag() {
        Some(PtypeTag::Binary) => Some(KeyedPtype::Binary),
        Some(PtypeTag::Time) => Some(KeyedPtype::Time),
        _ => None,
    }
}

/// Sorting identity: a rank class (extrema bracket everything) plus a type
/// name for the mixed ptype/plain interleave.
fn sort_key(datum: &Datum) -> (i8, &'static str) {
    if let Some(keyed) = keyed_ptype(datum) {
        return (0, keyed.sorting_name());
    }

    match datum.kind() {
        DatumKind::Minval => (-1, DatumKind::Minval.name()),
        DatumKind::Maxval => (1, DatumKind::Maxval.name()),
        kind => (0, kind.name()),
    }
}

/// Total order over all datums.
///
/// Both sides payload-keyed pseudo-types: tag-name order, then the payload
/// rule (binary bytes, time epoch seconds). Exactly one side: the name
/// interleave via `sort_key`. Neither: cross-kind rank, then the same-kind
/// structural rule.
pub(crate) fn cmp_datums(left: &Datum, right: &Datum) -> Ordering {
    match (keyed_ptype(left), keyed_ptype(right)) {
        (Some(lt), Some(rt)) => {
            if lt != rt {
                return lt.tag().cmp(&rt.tag());
            }
            match lt {
                KeyedPtype::Binary => match (left.cell(), right.cell()) {
                    (Cell::Binary(a), Cell::Binary(b)) => a.cmp(b),
                    // tagged object shapes that were never rewritten
                    _ => same_kind_cmp(left, right, DatumKind::Object),
                },
                KeyedPtype::Time => time::cmp(left, right),
            }
        }
        (Some(_), None) | (None, Some(_)) => sort_key(left).cmp(&sort_key(right)),
        (None, None) => {
            let (lk, rk) = (left.kind(), right.kind());
            if lk == rk {
                same_kind_cmp(left, right, lk)
            } else {
                lk.cmp(&rk)
            }
        }
    }
}

fn same_kind_cmp(left: &Datum, right: &Datum, kind: DatumKind) -> Ordering {
    match kind {
        DatumKind::Minval | DatumKind::Maxval | DatumKind::Null => Ordering::Equal,
        DatumKind::Bool => match (left.cell(), right.cell()) {
            (Cell::Bool(a), Cell::Bool(b)) => a.cmp(b),
            _ => Ordering::Equal,
        },
        DatumKind::Number => match (left.num_opt(), right.num_opt()) {
            // finite with one canonical zero, so total_cmp is numeric order
            (Some(a), Some(b)) => a.total_cmp(&b),
            _ => Ordering::Equal,
        },
        DatumKind::String => match (left.cell(), right.cell()) {
            (Cell::Str(a), Cell::Str(b)) => a.cmp(b),
            _ => Ordering::Equal,
        },
        DatumKind::Binary => match (left.cell(), right.cell()) {
            (Cell::Binary(a), Cell::Binary(b)) => a.cmp(b),
            _ => Ordering::Equal,
        },
        DatumKind::Array => {
            let (ln, rn) = (left.elem_count(), right.elem_count());
            for i in 0..ln.min(rn) {
                let ordering = cmp_datums(&left.elem(i), &right.elem(i));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }

            ln.cmp(&rn)
        }
        DatumKind::Object => {
            let (ln, rn) = (left.pair_count(), right.pair_count());
            for i in 0..ln.min(rn) {
                let (lk, lv) = left.pair(i);
                let (rk, rv) = right.pair(i);
                let ordering = lk.cmp(&rk).then_with(|| cmp_datums(&lv, &rv));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }

            ln.cmp(&rn)
        }
    }
}
