use std::fmt;

///
/// DatumKind
///
/// Public variant kinds. Declaration order is the fixed cross-kind rank
/// (minval < array < binary < bool < null < number < object < string <
/// maxval) and the comparator relies on the derived `Ord` for it.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum DatumKind {
    Minval,
    Array,
    Binary,
    Bool,
    Null,
    Number,
    Object,
    String,
    Maxval,
}

impl DatumKind {
    /// Canonical display name used in error messages and sorting identities.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Minval => "MINVAL",
            Self::Array => "ARRAY",
            Self::Binary => "BINARY",
            Self::Bool => "BOOL",
            Self::Null => "NULL",
            Self::Number => "NUMBER",
            Self::Object => "OBJECT",
            Self::String => "STRING",
            Self::Maxval => "MAXVAL",
        }
    }

    /// Extrema are query bounds, not storable values.
    #[must_use]
    pub const fn is_extremum(self) -> bool {
        matches!(self, Self::Minval | Self::Maxval)
    }
}

impl fmt::Display for DatumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
