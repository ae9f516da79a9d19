//! Converter traits and the type-erased seams between them.
//!
//! Field converters are fully type-erased (they move values as
//! `&dyn Any` / `Box<dyn Any>`), which lets one registry serve every field
//! type through a single trait object. Record converters stay generic over
//! the record type; they cross the factory seam wrapped in an
//! [`ErasedRecordConverter`] and are downcast back by the registry.

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::column::{Column, ColumnType};
use crate::error::Result;
use crate::index::IndexSpec;
use crate::registry::Registry;
use crate::row::Row;
use crate::value::{RowValues, Value};

/// Identity of a Rust type inside the registry.
///
/// Wraps the `TypeId` together with the type name so resolution errors can
/// name the offending type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// The key for type `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The type's name, for diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Converts one field value to and from a row cell.
///
/// Implementations are stateless strategies; the registry caches one
/// instance per field type. `column_type` returning `Ok(None)` means the
/// field type must be skipped entirely: the record converter drops the
/// column rather than storing NULL.
pub trait FieldConverter {
    /// The column type this converter stores, or `None` to skip the field.
    ///
    /// Fallible so a forwarding placeholder can report
    /// [`Error::PendingConverter`](crate::Error::PendingConverter) when
    /// consulted before its delegate is wired.
    fn column_type(&self) -> Result<Option<ColumnType>>;

    /// Converts a non-null field value to its cell representation.
    fn to_value(&self, value: &dyn Any) -> Result<Value>;

    /// Reads the cell at `index` of `row` back into a field value.
    fn from_row(&self, row: &dyn Row, index: usize) -> Result<Box<dyn Any>>;
}

/// Converts a whole record to and from a row.
///
/// The column list is the read/write order contract: `from_row` expects a
/// row exposing exactly these columns in this order (a prefix is allowed),
/// and `to_row` emits cells for every retained non-virtual column.
pub trait RecordConverter<T> {
    /// The table this record type maps to.
    fn table(&self) -> Result<&str>;

    /// The ordered column list.
    fn columns(&self) -> Result<&[Column]>;

    /// The validated index definitions declared by the record's fields.
    fn index_specs(&self) -> Result<&[IndexSpec]>;

    /// Writes `record` into `values`, one cell per non-virtual column.
    ///
    /// Null fields are written as explicit NULL cells except for the
    /// identifier column, which is omitted when unset so the store can
    /// assign one.
    fn to_row(&self, record: &T, values: &mut RowValues) -> Result<()>;

    /// Builds a record from `row`.
    fn from_row(&self, row: &dyn Row) -> Result<T>;

    /// The record's identifier, or `None` when unset.
    fn id_of(&self, record: &T) -> Result<Option<i64>>;

    /// Sets the record's identifier, if it has an identifier field.
    fn set_id(&self, record: &mut T, id: i64) -> Result<()>;
}

/// A record converter carried across the type-erased factory seam.
///
/// Wraps an `Arc<dyn RecordConverter<T>>`; the registry downcasts it back
/// to the typed form when handing it to callers. Clones share the
/// underlying converter.
#[derive(Clone)]
pub struct ErasedRecordConverter {
    inner: Arc<dyn Any>,
}

impl ErasedRecordConverter {
    /// Erases a typed record converter.
    pub fn new<T: 'static>(converter: Arc<dyn RecordConverter<T>>) -> Self {
        Self { inner: Arc::new(converter) }
    }

    /// Recovers the typed converter, or `None` when `T` does not match the
    /// erased type.
    pub fn downcast<T: 'static>(&self) -> Option<Arc<dyn RecordConverter<T>>> {
        self.inner
            .downcast_ref::<Arc<dyn RecordConverter<T>>>()
            .cloned()
    }
}

impl std::fmt::Debug for ErasedRecordConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ErasedRecordConverter")
    }
}

/// Creates record converters. A single factory may support multiple record
/// types.
///
/// Factories are consulted in registration order, most recently registered
/// first, with the default mapped-schema factory always last. Returning
/// `Ok(None)` passes the type to the next factory; an error aborts
/// resolution (and is not cached).
pub trait RecordConverterFactory {
    /// Creates a converter for `ty`, or `Ok(None)` when this factory does
    /// not support the type.
    fn create(&self, registry: &Registry, ty: TypeKey) -> Result<Option<ErasedRecordConverter>>;
}

/// Creates field converters. A single factory may support multiple field
/// types.
pub trait FieldConverterFactory {
    /// Creates a converter for `ty`, or `Ok(None)` when this factory does
    /// not support the type.
    fn create(&self, registry: &Registry, ty: TypeKey)
    -> Result<Option<Arc<dyn FieldConverter>>>;
}
