//! SQL data type tags used by column descriptors and the store facade's
//! bind switch.

use std::fmt;

/// One of the data types the relational store facade knows how to bind
/// and render a `CREATE TABLE` column clause for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Blob,
    Bool,
    Char,
    Text,
    Varchar,
    Datetime,
    Numeric,
    Integer,
    Double,
    Float,
    Real,
    Null,
    Error,
}

impl TypeTag {
    /// Parse a type tag from its SQL-ish string name (case-insensitive).
    /// Unknown strings map to `TypeTag::Error` rather than panicking, since
    /// the source treats this as a recoverable argument error.
    pub fn from_str(s: &str) -> TypeTag {
        match s.to_ascii_uppercase().as_str() {
            "BLOB" => TypeTag::Blob,
            "BOOL" | "BOOLEAN" => TypeTag::Bool,
            "CHAR" => TypeTag::Char,
            "TEXT" => TypeTag::Text,
            "VARCHAR" => TypeTag::Varchar,
            "DATETIME" => TypeTag::Datetime,
            "NUMERIC" => TypeTag::Numeric,
            "INTEGER" | "INT" => TypeTag::Integer,
            "DOUBLE" => TypeTag::Double,
            "FLOAT" => TypeTag::Float,
            "REAL" => TypeTag::Real,
            "NULL" => TypeTag::Null,
            _ => TypeTag::Error,
        }
    }

    /// Render the `CREATE TABLE` column-type keyword for this tag.
    pub fn as_sql(&self) -> &'static str {
        match self {
            TypeTag::Blob => "BLOB",
            TypeTag::Bool => "BOOL",
            TypeTag::Char => "CHAR",
            TypeTag::Text => "TEXT",
            TypeTag::Varchar => "VARCHAR",
            TypeTag::Datetime => "DATETIME",
            TypeTag::Numeric => "NUMERIC",
            TypeTag::Integer => "INTEGER",
            TypeTag::Double => "DOUBLE",
            TypeTag::Float => "FLOAT",
            TypeTag::Real => "REAL",
            TypeTag::Null => "NULL",
            TypeTag::Error => "ERROR",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_tags() {
        for (s, tag) in [
            ("TEXT", TypeTag::Text),
            ("integer", TypeTag::Integer),
            ("NUMERIC", TypeTag::Numeric),
            ("double", TypeTag::Double),
        ] {
            assert_eq!(TypeTag::from_str(s), tag);
            assert_eq!(TypeTag::from_str(tag.as_sql()), tag);
        }
    }

    #[test]
    fn unknown_string_maps_to_error_tag() {
        assert_eq!(TypeTag::from_str("NOT_A_TYPE"), TypeTag::Error);
    }
}
