use crate::{
    datum::{Datum, ptype::PTYPE_FIELD},
    error::{DatumError, Result},
};
use base64::{Engine, engine::general_purpose::STANDARD};

/// Base64 payload field of the BINARY wire form.
pub const DATA_FIELD: &str = "data";

/// Rewrite a BINARY-tagged wire object into the native binary cell.
pub(crate) fn from_ptype(datum: &Datum) -> Result<Datum> {
    let mut data: Option<Datum> = None;

    for (key, value) in datum.pairs()? {
        if key == *PTYPE_FIELD {
            continue;
        } else if key == *DATA_FIELD {
            data = Some(value);
        } else {
            return Err(DatumError::logic(format!(
                "invalid binary pseudo-type: illegal field `{key}`"
            )));
        }
    }

    let Some(data) = data else {
        return Err(DatumError::logic(format!(
            "invalid binary pseudo-type: missing `{DATA_FIELD}` field"
        )));
    };
    let decoded = STANDARD.decode(data.as_str()?).map_err(|err| {
        DatumError::logic(format!("invalid base64 in `{DATA_FIELD}` field: {err}"))
    })?;

    Ok(Datum::binary(decoded))
}

/// Base64 rendering used when a binary cell goes back over the wire.
pub(crate) fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
