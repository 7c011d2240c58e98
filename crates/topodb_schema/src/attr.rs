//! Declared attribute types.

use serde::{Deserialize, Serialize};

/// Semantic type of a declared entity attribute.
///
/// The type drives how an incoming attribute value is converted to a
/// database value, and which column affinity the DDL generator declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttrType {
    /// Strings, booleans and ordinary numbers, stored as-is.
    Primitive,
    /// Fixed-point decimal values.
    Decimal,
    /// Large integer values.
    BigInt,
    /// Geographic points/shapes, stored in their text form.
    Geographic,
    /// Nested containers, stored as JSON text.
    Container,
}

impl AttrType {
    /// SQLite column type used by the DDL generator.
    #[must_use]
    pub const fn column_type(self) -> &'static str {
        match self {
            Self::Primitive | Self::Geographic | Self::Container => "TEXT",
            Self::Decimal => "REAL",
            Self::BigInt => "INTEGER",
        }
    }
}
