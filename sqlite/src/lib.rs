//! SQLite storage backend for rowmap records.
//!
//! This crate connects the storage-agnostic engine in `rowmap-core` to a
//! rusqlite [`Connection`](rusqlite::Connection). It introspects the live
//! database shape, executes the engine's planned DDL, and provides
//! identifier-keyed CRUD for registered record types.
//!
//! # Architecture
//!
//! - **`store`** — [`Store`]: schema lifecycle plus put/get/delete/query
//! - **`introspect`** — live table snapshots from `pragma table_info` and
//!   `sqlite_master`
//! - **`row`** — buffering of rusqlite rows into the engine's row model
//!
//! # Quick start
//!
//! ```no_run
//! use rowmap_core::{FieldDescriptor, Record, RecordSchema, RegistryBuilder};
//! use rowmap_sqlite::Store;
//! use rusqlite::Connection;
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
//! let conn = Connection::open("library.db").unwrap();
//! let registry = RegistryBuilder::new().register::<Book>().build();
//! let store = Store::new(&conn, &registry);
//!
//! store.upgrade_tables().unwrap();
//!
//! let mut book = Book { id: None, title: "Dune".into() };
//! let id = store.put(&mut book).unwrap();
//! assert_eq!(book.id, Some(id));
//!
//! let loaded: Option<Book> = store.get(id).unwrap();
//! assert_eq!(loaded.unwrap().title, "Dune");
//! ```
//!
//! Calling [`Store::upgrade_tables`] on every startup keeps the database
//! additively in sync with the registered record types: new columns and
//! indexes appear, index drift is corrected, and existing data is never
//! touched.

mod error;
mod introspect;
mod row;
mod store;

pub use error::{Result, StoreError};
pub use introspect::live_table;
pub use store::Store;
