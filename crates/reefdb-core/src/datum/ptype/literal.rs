use crate::{
    datum::{Datum, DatumKind, PtypeTag, ptype::PTYPE_FIELD},
    error::{DatumError, Result},
};

/// Optional replacement payload of a literal directive.
pub const VALUE_FIELD: &str = "value";

/// Shape check for an admitted literal: only the reserved field and an
/// optional `value` are legal, and the payload may not itself contain
/// literals at any depth.
pub(crate) fn validate(datum: &Datum) -> Result<()> {
    for (key, value) in datum.pairs()? {
        if key == *PTYPE_FIELD {
            continue;
        } else if key == *VALUE_FIELD {
            if contains_literal(&value) {
                return Err(DatumError::logic(
                    "literal pseudo-types cannot nest inside other literals",
                ));
            }
        } else {
            return Err(DatumError::logic(format!(
                "invalid literal with illegal field `{key}`"
            )));
        }
    }

    Ok(())
}

fn contains_literal(datum: &Datum) -> bool {
    if datum.ptype_tag() == Some(PtypeTag::Literal) {
        return true;
    }

    match datum.kind() {
        DatumKind::Array => (0..datum.elem_count()).any(|i| contains_literal(&datum.elem(i))),
        DatumKind::Object => (0..datum.pair_count()).any(|i| contains_literal(&datum.pair(i).1)),
        _ => false,
    }
}
