use crate::{
    datum::Datum,
    error::{DatumError, Result},
    key::{
        MAX_KEY_SIZE, MAX_PRIMARY_KEY_SIZE, OFFSET_TRAILER_SIZE, SKEY_VERSION_FLAG, SkeyVersion,
        TAG_SIZE,
        encode::{self, EncodeCtx},
        max_trunc_size, trunc_size,
    },
};

// static validation reasons, stable across releases
const ERR_TOO_SHORT: &str = "composed key too short";
const ERR_OFFSETS: &str = "composed key offsets out of range";
const ERR_TAG_LEN: &str = "composed key tag length invalid";

///
/// KeyComponents
///
/// The three regions of a composed index entry, borrowed from the entry
/// bytes.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KeyComponents<'a> {
    pub secondary: &'a [u8],
    pub primary: &'a [u8],
    pub tag: Option<u64>,
}

impl Datum {
    ///
    /// KEYS
    ///

    /// Render this datum as a primary key.
    ///
    /// Errors if the value is not key material, contains a NUL byte, or
    /// encodes longer than [`MAX_PRIMARY_KEY_SIZE`].
    pub fn print_primary(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(MAX_PRIMARY_KEY_SIZE);
        encode::push_value(self, &EncodeCtx::primary(), &mut out)?;
        if out.len() > MAX_PRIMARY_KEY_SIZE {
            return Err(DatumError::resource_limit(format!(
                "primary key too long (max {} characters): `{}`",
                MAX_PRIMARY_KEY_SIZE - 1,
                self.trunc_print()
            )));
        }

        Ok(out)
    }

    /// Render this datum as a stored secondary index entry: the truncated
    /// secondary encoding, then the primary key, the multi-index tag when
    /// present, and the two offset bytes.
    pub fn print_secondary(
        &self,
        version: SkeyVersion,
        primary_key: &[u8],
        tag: Option<u64>,
    ) -> Result<Vec<u8>> {
        if self.kind().is_extremum() {
            return Err(encode::invalid_key_material(self));
        }
        if primary_key.len() > MAX_PRIMARY_KEY_SIZE {
            return Err(DatumError::resource_limit(format!(
                "primary key too long (max {} characters): `{}`",
                MAX_PRIMARY_KEY_SIZE - 1,
                String::from_utf8_lossy(primary_key)
            )));
        }

        let mut secondary = Vec::with_capacity(MAX_KEY_SIZE);
        encode::push_value(self, &EncodeCtx::secondary(version, false), &mut secondary)?;
        apply_version_flag(version, &mut secondary);
        secondary.truncate(trunc_size(primary_key.len()));

        Ok(compose(&secondary, primary_key, tag))
    }

    /// Render just the secondary portion, cut to the budget a maximal
    /// primary key would leave, so the result is comparable against any
    /// stored entry's truncated prefix.
    ///
    /// Scan bounds are built this way, which is the one place extrema are
    /// admitted at the top level.
    pub fn truncated_secondary(&self, version: SkeyVersion, extrema_ok: bool) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(MAX_KEY_SIZE);
        if self.kind().is_extremum() {
            if !extrema_ok {
                return Err(encode::invalid_key_material(self));
            }
            encode::push_extremum(self, version, &mut out);
        } else {
            encode::push_value(self, &EncodeCtx::secondary(version, extrema_ok), &mut out)?;
        }
        apply_version_flag(version, &mut out);
        out.truncate(max_trunc_size());

        Ok(out)
    }
}

/// Mark a current-format key in the high bit of its first byte.
fn apply_version_flag(version: SkeyVersion, out: &mut [u8]) {
    if version == SkeyVersion::Current
        && let Some(first) = out.first_mut()
    {
        *first |= SKEY_VERSION_FLAG;
    }
}

/// Stitch the already-encoded regions into one entry. The budget
/// arithmetic keeps both offsets under 256.
fn compose(secondary: &[u8], primary: &[u8], tag: Option<u64>) -> Vec<u8> {
    let pk_offset = u8::try_from(secondary.len()).expect("secondary portion fits the key budget");
    let tag_offset =
        u8::try_from(secondary.len() + primary.len()).expect("offsets fit the key budget");

    let mut out = Vec::with_capacity(MAX_KEY_SIZE);
    out.extend_from_slice(secondary);
    out.extend_from_slice(primary);
    if let Some(tag) = tag {
        out.extend_from_slice(&tag.to_le_bytes());
    }
    out.push(pk_offset);
    out.push(tag_offset);
    debug_assert!(out.len() <= MAX_KEY_SIZE);

    out
}

fn split(key: &[u8]) -> Result<KeyComponents<'_>> {
    if key.len() < OFFSET_TRAILER_SIZE {
        return Err(DatumError::logic(ERR_TOO_SHORT));
    }
    let end = key.len() - OFFSET_TRAILER_SIZE;
    let pk_offset = usize::from(key[end]);
    let tag_offset = usize::from(key[end + 1]);
    if pk_offset > tag_offset || tag_offset > end {
        return Err(DatumError::logic(ERR_OFFSETS));
    }

    let tag = match end - tag_offset {
        0 => None,
        TAG_SIZE => {
            let mut bytes = [0_u8; TAG_SIZE];
            bytes.copy_from_slice(&key[tag_offset..end]);
            Some(u64::from_le_bytes(bytes))
        }
        _ => return Err(DatumError::logic(ERR_TAG_LEN)),
    };

    Ok(KeyComponents {
        secondary: &key[..pk_offset],
        primary: &key[pk_offset..tag_offset],
        tag,
    })
}

/// Split a composed entry into its regions.
pub fn extract_all(key: &[u8]) -> Result<KeyComponents<'_>> {
    split(key)
}

/// The primary-key region of a composed entry.
pub fn extract_primary(key: &[u8]) -> Result<&[u8]> {
    Ok(split(key)?.primary)
}

/// The secondary region of a composed entry, as stored.
pub fn extract_secondary(key: &[u8]) -> Result<&[u8]> {
    Ok(split(key)?.secondary)
}

/// The secondary region cut to [`max_trunc_size`], comparable against
/// [`Datum::truncated_secondary`] output regardless of the primary key the
/// entry was composed with.
pub fn extract_truncated_secondary(key: &[u8]) -> Result<&[u8]> {
    let secondary = split(key)?.secondary;

    Ok(&secondary[..secondary.len().min(max_trunc_size())])
}

/// The multi-index tag of a composed entry, when present.
pub fn extract_tag(key: &[u8]) -> Result<Option<u64>> {
    Ok(split(key)?.tag)
}

/// Whether an entry's secondary region may have been cut at the budget.
/// Only the composed lengths a full budget produces can mean truncation.
#[must_use]
pub fn key_is_truncated(key: &[u8]) -> bool {
    key.len() == MAX_KEY_SIZE || key.len() == MAX_KEY_SIZE - TAG_SIZE
}
