//! Record storage on top of a rusqlite connection.

use rowmap_core::{
    ColumnOrderView, ID_COLUMN, Record, Registry, RowValues, plan_drop_indices, plan_drop_tables,
    plan_table,
};
use rusqlite::{Connection, ToSql};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::introspect::live_table;
use crate::row::{buffer_row, sql_value};

/// Stores and loads registered records on one connection.
///
/// Borrows both the connection and the registry; a store is cheap to
/// construct wherever one is needed. Schema operations
/// ([`create_tables`](Self::create_tables),
/// [`upgrade_tables`](Self::upgrade_tables), and the drop variants) run
/// their planned statements inside a transaction, so a failing upgrade
/// leaves the database untouched.
///
/// # Examples
///
/// ```no_run
/// use rowmap_core::{Record, RegistryBuilder};
/// use rowmap_sqlite::Store;
/// use rusqlite::Connection;
/// # #[derive(Default)] struct Book { id: Option<i64> }
/// # impl Record for Book {
/// #     fn schema() -> rowmap_core::RecordSchema<Self> {
/// #         rowmap_core::RecordSchema::new("Book")
/// #     }
/// # }
///
/// let conn = Connection::open("library.db").unwrap();
/// let registry = RegistryBuilder::new().register::<Book>().build();
///
/// let store = Store::new(&conn, &registry);
/// store.upgrade_tables().unwrap();
///
/// let mut book = Book::default();
/// let id = store.put(&mut book).unwrap();
/// let loaded: Option<Book> = store.get(id).unwrap();
/// ```
pub struct Store<'a> {
    conn: &'a Connection,
    registry: &'a Registry,
}

impl<'a> Store<'a> {
    /// Creates a store over `conn` for the types registered in `registry`.
    pub fn new(conn: &'a Connection, registry: &'a Registry) -> Self {
        Self { conn, registry }
    }

    /// Creates tables and indexes for every registered record type.
    ///
    /// Uses `if not exists` throughout, so it is safe to call on a
    /// database that already has the tables; it will not reconcile drifted
    /// indexes or add missing columns (use
    /// [`upgrade_tables`](Self::upgrade_tables) for that).
    pub fn create_tables(&self) -> Result<()> {
        let mut statements = Vec::new();
        for schema in self.registry.table_schemas()? {
            statements.extend(plan_table(&schema, None));
        }
        self.apply(&statements)
    }

    /// Reconciles the database with the registered record types.
    ///
    /// Missing tables are created, missing columns are added, missing
    /// indexes are created, drifted indexes are recreated, and stale named
    /// indexes are dropped. Existing columns are never altered or removed.
    pub fn upgrade_tables(&self) -> Result<()> {
        let mut statements = Vec::new();
        for schema in self.registry.table_schemas()? {
            let live = live_table(self.conn, &schema.table)?;
            statements.extend(plan_table(&schema, live.as_ref()));
        }
        self.apply(&statements)
    }

    /// Drops the tables of every registered record type.
    pub fn drop_all_tables(&self) -> Result<()> {
        let schemas = self.registry.table_schemas()?;
        let statements = plan_drop_tables(schemas.iter().map(|schema| schema.table.as_str()));
        self.apply(&statements)
    }

    /// Drops every named index on the tables of registered record types.
    /// Automatic indexes are left alone.
    pub fn drop_all_indices(&self) -> Result<()> {
        let mut names = Vec::new();
        for schema in self.registry.table_schemas()? {
            if let Some(live) = live_table(self.conn, &schema.table)? {
                for index in live.indexes {
                    if index.sql.is_some() {
                        names.push(index.name);
                    }
                }
            }
        }
        let statements = plan_drop_indices(names.iter().map(String::as_str));
        self.apply(&statements)
    }

    fn apply(&self, statements: &[String]) -> Result<()> {
        if statements.is_empty() {
            return Ok(());
        }
        let tx = self.conn.unchecked_transaction()?;
        for statement in statements {
            debug!(statement = %statement, "applying ddl");
            tx.execute_batch(statement).map_err(|source| StoreError::SchemaApply {
                statement: statement.clone(),
                source,
            })?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Stores `record`, inserting or replacing by identifier, and returns
    /// the identifier. A record without one is inserted fresh and gets the
    /// assigned identifier written back.
    pub fn put<T: Record>(&self, record: &mut T) -> Result<i64> {
        let converter = self.registry.record_converter::<T>()?;
        let table = converter.table()?.to_string();

        let mut values = RowValues::new();
        converter.to_row(record, &mut values)?;

        if values.is_empty() {
            self.conn
                .execute(&format!("insert into '{table}' default values"), [])?;
        } else {
            let columns = values
                .iter()
                .map(|(name, _)| format!("'{name}'"))
                .collect::<Vec<_>>()
                .join(", ");
            let placeholders = (1..=values.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let sql =
                format!("insert or replace into '{table}' ({columns}) values ({placeholders})");
            let params =
                rusqlite::params_from_iter(values.iter().map(|(_, value)| sql_value(value)));
            self.conn.execute(&sql, params)?;
        }

        let id = match converter.id_of(record)? {
            Some(id) => id,
            None => self.conn.last_insert_rowid(),
        };
        converter.set_id(record, id)?;
        debug!(table = %table, id, "stored record");
        Ok(id)
    }

    /// Loads the record with identifier `id`, or `None` when absent.
    pub fn get<T: Record>(&self, id: i64) -> Result<Option<T>> {
        let converter = self.registry.record_converter::<T>()?;
        let sql = format!(
            "select * from '{}' where {} = ?1",
            converter.table()?,
            ID_COLUMN
        );
        let mut records = self.read_all::<T>(&sql, &[&id])?;
        Ok(records.pop())
    }

    /// Deletes the record with identifier `id`; returns whether a row was
    /// removed.
    pub fn delete<T: Record>(&self, id: i64) -> Result<bool> {
        let converter = self.registry.record_converter::<T>()?;
        let sql = format!(
            "delete from '{}' where {} = ?1",
            converter.table()?,
            ID_COLUMN
        );
        Ok(self.conn.execute(&sql, [id])? > 0)
    }

    /// Loads every stored record of type `T`.
    pub fn query<T: Record>(&self) -> Result<Vec<T>> {
        let converter = self.registry.record_converter::<T>()?;
        let sql = format!("select * from '{}'", converter.table()?);
        self.read_all::<T>(&sql, &[])
    }

    /// Loads the records of type `T` matching a WHERE clause with numbered
    /// parameters (`?1`, `?2`, ...).
    pub fn query_where<T: Record>(
        &self,
        where_clause: &str,
        params: &[&dyn ToSql],
    ) -> Result<Vec<T>> {
        let converter = self.registry.record_converter::<T>()?;
        let sql = format!(
            "select * from '{}' where {}",
            converter.table()?,
            where_clause
        );
        self.read_all::<T>(&sql, params)
    }

    fn read_all<T: Record>(&self, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<T>> {
        let converter = self.registry.record_converter::<T>()?;
        let names: Vec<String> = converter
            .columns()?
            .iter()
            .map(|column| column.name.clone())
            .collect();

        let mut statement = self.conn.prepare(sql)?;
        let mut rows = statement.query(params)?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            let buffered = buffer_row(row)?;
            // Converters read cells positionally; the view rearranges
            // whatever the statement produced into converter order.
            let view = ColumnOrderView::new(&buffered, &names);
            records.push(converter.from_row(&view)?);
        }
        Ok(records)
    }
}
