//! Record-to-row conversion engine with cycle-safe converter resolution
//! and schema planning.
//!
//! This crate is the storage-agnostic half of rowmap. It knows how to:
//!
//! - Describe a record type's table mapping once, through [`Record`] and
//!   [`RecordSchema`], and turn it into a [`MappedRecordConverter`]
//! - Resolve record and field converters lazily through extensible
//!   factory chains, safely handling types that reference each other or
//!   themselves (see [`Registry`])
//! - Validate composite index declarations and render deterministic
//!   CREATE INDEX statements (see [`IndexBuilder`])
//! - Diff a desired [`TableSchema`] against an introspected [`LiveTable`]
//!   and plan the additive DDL that reconciles them (see [`plan_table`])
//! - Adapt any result [`Row`] to a converter's canonical column order
//!   (see [`ColumnOrderView`])
//!
//! Database access lives in backend crates such as `rowmap-sqlite`, which
//! feed introspection results in and execute planned statements.
//!
//! # Examples
//!
//! ```
//! use rowmap_core::{FieldDescriptor, Record, RecordSchema, RegistryBuilder, RowValues};
//!
//! #[derive(Debug, Default)]
//! struct Book {
//!     id: Option<i64>,
//!     title: String,
//! }
//!
//! impl Record for Book {
//!     fn schema() -> RecordSchema<Self> {
//!         RecordSchema::new("Book")
//!             .field(FieldDescriptor::optional(
//!                 "_id",
//!                 |b: &Book| b.id.as_ref(),
//!                 |b, v| b.id = v,
//!             ))
//!             .field(FieldDescriptor::required(
//!                 "title",
//!                 |b: &Book| &b.title,
//!                 |b, v| b.title = v,
//!             ))
//!     }
//! }
//!
//! # fn main() -> rowmap_core::Result<()> {
//! let registry = RegistryBuilder::new().register::<Book>().build();
//! let converter = registry.record_converter::<Book>()?;
//!
//! let mut values = RowValues::new();
//! converter.to_row(&Book { id: None, title: "Dune".into() }, &mut values)?;
//! assert!(values.contains("title"));
//!
//! let schema = registry.table_schema::<Book>()?;
//! assert!(schema.create_sql().starts_with("create table if not exists 'Book'"));
//! # Ok(())
//! # }
//! ```

mod column;
mod convert;
mod error;
mod fields;
mod index;
mod record;
mod registry;
mod row;
mod schema;
mod value;

pub use column::{Column, ColumnType, ID_COLUMN};
pub use convert::{
    ErasedRecordConverter, FieldConverter, FieldConverterFactory, RecordConverter,
    RecordConverterFactory, TypeKey,
};
pub use error::{Error, Result};
pub use fields::{EnumFieldConverter, ScalarConverterFactory, TextEnum};
pub use index::{
    IndexBuilder, IndexColumn, IndexDecl, IndexDefinitionError, IndexMembership, IndexSpec,
};
pub use record::{FieldDescriptor, MappedRecordConverter, Record, RecordSchema};
pub use registry::{Registry, RegistryBuilder};
pub use row::{ColumnOrderView, Row, ValueRow};
pub use schema::{
    LiveIndex, LiveTable, TableSchema, normalize_index_sql, plan_drop_indices, plan_drop_tables,
    plan_table,
};
pub use value::{RowValues, Value};
