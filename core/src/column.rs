//! Column descriptions for stored record types.
//!
//! A [`Column`] pairs a physical column name with its logical
//! [`ColumnType`]. Record converters expose an ordered column list that
//! doubles as the read/write order contract for row conversion.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of the reserved identifier column.
///
/// Every table created by the schema planner gets an auto-incrementing
/// integer primary key under this name. A record field mapped to this
/// column becomes the record's identifier.
pub const ID_COLUMN: &str = "_id";

/// Logical type of a stored column.
///
/// The first four variants map directly to SQLite storage classes.
/// [`Virtual`](ColumnType::Virtual) marks a column that is only ever read
/// (for example a joined or aggregated value); it is part of a converter's
/// column list but is never written and never materialized in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    /// UTF-8 text.
    Text,
    /// 64-bit signed integer.
    Integer,
    /// 64-bit float.
    Real,
    /// Binary data.
    Blob,
    /// Read-only projection, never persisted.
    Virtual,
}

impl ColumnType {
    /// Returns the SQL type keyword for this column type, or `None` for
    /// [`Virtual`](ColumnType::Virtual) columns, which have no physical
    /// representation.
    pub fn sql_type(&self) -> Option<&'static str> {
        match self {
            ColumnType::Text => Some("text"),
            ColumnType::Integer => Some("integer"),
            ColumnType::Real => Some("real"),
            ColumnType::Blob => Some("blob"),
            ColumnType::Virtual => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Virtual => f.write_str("virtual"),
            other => f.write_str(other.sql_type().unwrap_or("virtual")),
        }
    }
}

/// A stored column: name plus logical type.
///
/// Equality is by name and type, which is what the schema planner uses
/// when diffing a desired column set against a live table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Physical column name.
    pub name: String,
    /// Logical column type.
    pub ty: ColumnType,
}

impl Column {
    /// Creates a column description.
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self { name: name.into(), ty }
    }

    /// Whether this column is a read-only projection.
    pub fn is_virtual(&self) -> bool {
        self.ty == ColumnType::Virtual
    }
}
