use crate::{
    datum::{Datum, DatumKind},
    error::{DatumError, Result},
};

pub const TYPE_FIELD: &str = "type";
pub const COORDINATES_FIELD: &str = "coordinates";

const GEOMETRY_TYPES: [&str; 3] = ["LineString", "Point", "Polygon"];

/// Shallow GeoJSON shape check. Coordinate and winding validation belongs to
/// the geometry subsystem that consumes these objects; foreign members are
/// tolerated here.
pub(crate) fn validate(datum: &Datum) -> Result<()> {
    let Some(geo_type) = datum.get_field_opt(TYPE_FIELD) else {
        return Err(invalid(&format!("no field `{TYPE_FIELD}`"), datum));
    };
    let name = geo_type.as_str()?;
    if !GEOMETRY_TYPES.contains(&name) {
        return Err(invalid(
            &format!("field `{TYPE_FIELD}` must be one of Point, LineString or Polygon, got `{name}`"),
            datum,
        ));
    }

    let Some(coordinates) = datum.get_field_opt(COORDINATES_FIELD) else {
        return Err(invalid(&format!("no field `{COORDINATES_FIELD}`"), datum));
    };
    if coordinates.kind() != DatumKind::Array {
        return Err(invalid(
            &format!("field `{COORDINATES_FIELD}` must be an array"),
            datum,
        ));
    }

    Ok(())
}

fn invalid(detail: &str, datum: &Datum) -> DatumError {
    DatumError::logic(format!(
        "invalid geometry object ({detail}): `{}`",
        datum.trunc_print()
    ))
}
