//! Error types for conversion and schema planning.
//!
//! Provides a unified error type covering converter resolution, record
//! conversion, and index definition failures. Resolution failures are never
//! cached, so registering a matching factory and retrying is always valid.

use thiserror::Error;

use crate::index::IndexDefinitionError;

/// Errors raised by the conversion engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Operation requested for a record type that was never registered.
    /// Always a programmer error; register the type first.
    #[error("record type is not registered: {type_name}")]
    UnregisteredType {
        /// The offending type.
        type_name: &'static str,
    },

    /// No record converter factory produced a converter for the type.
    #[error("cannot convert record of type {type_name}")]
    UnsupportedRecordType {
        /// The offending type.
        type_name: &'static str,
    },

    /// No field converter factory produced a converter for the type.
    #[error("cannot convert field of type {type_name}")]
    UnsupportedFieldType {
        /// The offending type.
        type_name: &'static str,
    },

    /// A record field's type could not be converted while building the
    /// record's converter.
    #[error("do not know how to convert field {field} of type {type_name} in record {record}")]
    UnsupportedField {
        /// The record type owning the field.
        record: &'static str,
        /// The field name.
        field: &'static str,
        /// The field's declared type.
        type_name: &'static str,
    },

    /// A forwarding placeholder converter was used before its delegate was
    /// wired. Indicates a resolver defect or an unsupported cyclic shape.
    #[error("converter used before its delegate was resolved")]
    PendingConverter,

    /// A field value handed to a converter did not have the type the
    /// converter stores.
    #[error("value is not of type {expected}")]
    ValueType {
        /// The expected Rust type.
        expected: &'static str,
    },

    /// A value did not have the type its converter expects.
    #[error("value for field {field} is not of type {expected}")]
    TypeMismatch {
        /// The field being converted.
        field: &'static str,
        /// The expected Rust type.
        expected: &'static str,
    },

    /// A stored cell could not be decoded back into the field's type.
    #[error("cannot decode '{value}' as {type_name}")]
    ValueDecode {
        /// The stored cell, rendered as text.
        value: String,
        /// The target Rust type.
        type_name: &'static str,
    },

    /// Conflicting per-field index declarations.
    #[error(transparent)]
    IndexDefinition(#[from] IndexDefinitionError),
}

/// Convenience alias for results with [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
