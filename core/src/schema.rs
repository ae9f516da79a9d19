//! Desired table schemas and the DDL planner.
//!
//! A [`TableSchema`] is the desired shape of one table, derived from a
//! record converter. The planner compares it against a [`LiveTable`]
//! snapshot introspected from the database and emits the DDL statements
//! that reconcile the two. Reconciliation is additive for columns (new
//! columns are added, existing ones are never altered or dropped) and
//! corrective for indexes (missing ones are created, definition drift is
//! fixed by drop-and-recreate, stale named indexes are dropped).
//! Automatic indexes, which have no stored SQL, are never touched.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::column::{Column, ID_COLUMN};
use crate::convert::RecordConverter;
use crate::error::Result;
use crate::index::IndexSpec;

/// The desired shape of one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub table: String,
    /// Desired columns, in converter order. Includes the identifier and
    /// any virtual columns; the planner skips both when emitting DDL.
    pub columns: Vec<Column>,
    /// Desired indexes.
    pub indexes: Vec<IndexSpec>,
}

impl TableSchema {
    /// Captures the desired schema of a record converter's table.
    pub fn for_converter<T>(converter: &dyn RecordConverter<T>) -> Result<Self> {
        Ok(Self {
            table: converter.table()?.to_string(),
            columns: converter.columns()?.to_vec(),
            indexes: converter.index_specs()?.to_vec(),
        })
    }

    /// The CREATE TABLE statement for this schema.
    ///
    /// The identifier column is emitted as the autoincrement primary key;
    /// virtual columns are not stored and do not appear.
    pub fn create_sql(&self) -> String {
        let mut sql = format!(
            "create table if not exists '{}' ({} integer primary key autoincrement",
            self.table, ID_COLUMN
        );
        for column in &self.columns {
            if column.name == ID_COLUMN {
                continue;
            }
            if let Some(ty) = column.ty.sql_type() {
                sql.push_str(&format!(", '{}' {}", column.name, ty));
            }
        }
        sql.push(')');
        sql
    }

    fn add_column_sql(&self, column: &Column, ty: &str) -> String {
        format!(
            "alter table '{}' add column '{}' {}",
            self.table, column.name, ty
        )
    }
}

/// A named index as it exists in the database.
#[derive(Debug, Clone)]
pub struct LiveIndex {
    /// Index name.
    pub name: String,
    /// The stored creation SQL, or `None` for automatic indexes (the ones
    /// SQLite creates for unique and primary key constraints).
    pub sql: Option<String>,
}

/// A table as it exists in the database: introspected column names and
/// index definitions.
#[derive(Debug, Clone, Default)]
pub struct LiveTable {
    /// Existing column names.
    pub columns: Vec<String>,
    /// Existing indexes on the table.
    pub indexes: Vec<LiveIndex>,
}

/// Canonical form of an index creation statement, for drift comparison.
///
/// Lowercases, collapses runs of whitespace, and strips the optional
/// `if not exists` clause, so that cosmetic differences between the stored
/// SQL and freshly generated SQL do not trigger a recreate.
pub fn normalize_index_sql(sql: &str) -> String {
    sql.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("if not exists ", "")
}

/// The DDL statements that reconcile a live table with its desired schema.
///
/// With no live table the plan creates the table and all of its indexes.
/// Against a live snapshot the plan adds missing columns, creates missing
/// indexes, recreates indexes whose stored definition drifted, and drops
/// named indexes the schema no longer wants. An up-to-date table yields an
/// empty plan.
pub fn plan_table(schema: &TableSchema, live: Option<&LiveTable>) -> Vec<String> {
    let mut statements = Vec::new();

    let Some(live) = live else {
        statements.push(schema.create_sql());
        for index in &schema.indexes {
            statements.push(index.creation_sql(&schema.table, true));
        }
        debug!(table = %schema.table, statements = statements.len(), "planned table creation");
        return statements;
    };

    for column in &schema.columns {
        let Some(ty) = column.ty.sql_type() else {
            continue;
        };
        if column.name == ID_COLUMN {
            continue;
        }
        let exists = live
            .columns
            .iter()
            .any(|name| name.eq_ignore_ascii_case(&column.name));
        if !exists {
            statements.push(schema.add_column_sql(column, ty));
        }
    }

    for index in &schema.indexes {
        // SQLite object names are case-insensitive, so the lookup is too.
        let found = live
            .indexes
            .iter()
            .find(|li| li.name.eq_ignore_ascii_case(&index.name));
        match found {
            None => {
                statements.push(index.creation_sql(&schema.table, true));
            }
            Some(LiveIndex { sql: Some(stored), .. }) => {
                let desired = index.creation_sql(&schema.table, false);
                if normalize_index_sql(stored) != normalize_index_sql(&desired) {
                    statements.push(format!("drop index if exists '{}'", index.name));
                    statements.push(index.creation_sql(&schema.table, true));
                }
            }
            // An automatic index under a name we want is left alone.
            Some(LiveIndex { sql: None, .. }) => {}
        }
    }

    for live_index in &live.indexes {
        if live_index.sql.is_none() {
            continue;
        }
        let wanted = schema
            .indexes
            .iter()
            .any(|i| i.name.eq_ignore_ascii_case(&live_index.name));
        if !wanted {
            statements.push(format!("drop index if exists '{}'", live_index.name));
        }
    }

    debug!(table = %schema.table, statements = statements.len(), "planned table upgrade");
    statements
}

/// Statements dropping every table named in `tables`.
pub fn plan_drop_tables<'a>(tables: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    tables
        .into_iter()
        .map(|table| format!("drop table if exists '{table}'"))
        .collect()
}

/// Statements dropping every named index in `indexes`.
pub fn plan_drop_indices<'a>(indexes: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    indexes
        .into_iter()
        .map(|index| format!("drop index if exists '{index}'"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnType;
    use crate::index::{IndexColumn, IndexSpec};

    fn sample_schema() -> TableSchema {
        TableSchema {
            table: "Book".into(),
            columns: vec![
                Column::new(ID_COLUMN, ColumnType::Integer),
                Column::new("title", ColumnType::Text),
                Column::new("pages", ColumnType::Integer),
                Column::new("rating", ColumnType::Real),
                Column::new("loan_count", ColumnType::Virtual),
            ],
            indexes: vec![IndexSpec {
                unique: false,
                name: "Book_title".into(),
                columns: vec![IndexColumn { name: "title".into(), ascending: true }],
            }],
        }
    }

    #[test]
    fn test_create_sql_skips_id_and_virtual_columns() {
        let schema = sample_schema();
        assert_eq!(
            schema.create_sql(),
            "create table if not exists 'Book' (_id integer primary key autoincrement, \
             'title' text, 'pages' integer, 'rating' real)"
        );
    }

    #[test]
    fn test_plan_for_missing_table_creates_everything() {
        let schema = sample_schema();
        let plan = plan_table(&schema, None);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0], schema.create_sql());
        assert_eq!(
            plan[1],
            "create index if not exists Book_title on Book ('title' ASC)"
        );
    }

    #[test]
    fn test_plan_adds_only_missing_columns() {
        let schema = sample_schema();
        let live = LiveTable {
            columns: vec!["_id".into(), "title".into()],
            indexes: vec![LiveIndex {
                name: "Book_title".into(),
                sql: Some("create index Book_title on Book ('title' ASC)".into()),
            }],
        };
        let plan = plan_table(&schema, Some(&live));
        assert_eq!(
            plan,
            [
                "alter table 'Book' add column 'pages' integer",
                "alter table 'Book' add column 'rating' real",
            ]
        );
    }

    #[test]
    fn test_plan_for_up_to_date_table_is_empty() {
        let schema = sample_schema();
        let live = LiveTable {
            columns: vec!["_id".into(), "title".into(), "pages".into(), "rating".into()],
            indexes: vec![LiveIndex {
                name: "Book_title".into(),
                // Cosmetic whitespace and case differences do not count
                // as drift.
                sql: Some("CREATE INDEX  Book_title ON Book ('title'  asc)".into()),
            }],
        };
        assert!(plan_table(&schema, Some(&live)).is_empty());
    }

    #[test]
    fn test_drifted_index_is_recreated() {
        let schema = sample_schema();
        let live = LiveTable {
            columns: vec!["_id".into(), "title".into(), "pages".into(), "rating".into()],
            indexes: vec![LiveIndex {
                name: "Book_title".into(),
                sql: Some("create index Book_title on Book ('title' DESC)".into()),
            }],
        };
        let plan = plan_table(&schema, Some(&live));
        assert_eq!(
            plan,
            [
                "drop index if exists 'Book_title'",
                "create index if not exists Book_title on Book ('title' ASC)",
            ]
        );
    }

    #[test]
    fn test_stale_named_index_is_dropped() {
        let schema = sample_schema();
        let live = LiveTable {
            columns: vec!["_id".into(), "title".into(), "pages".into(), "rating".into()],
            indexes: vec![
                LiveIndex {
                    name: "Book_title".into(),
                    sql: Some("create index Book_title on Book ('title' ASC)".into()),
                },
                LiveIndex {
                    name: "Book_obsolete".into(),
                    sql: Some("create index Book_obsolete on Book ('pages' ASC)".into()),
                },
            ],
        };
        let plan = plan_table(&schema, Some(&live));
        assert_eq!(plan, ["drop index if exists 'Book_obsolete'"]);
    }

    #[test]
    fn test_index_name_match_is_case_insensitive() {
        let schema = sample_schema();
        // Same index, lowercased name: SQLite treats the names as equal,
        // so the plan must neither recreate nor drop it.
        let live = LiveTable {
            columns: vec!["_id".into(), "title".into(), "pages".into(), "rating".into()],
            indexes: vec![LiveIndex {
                name: "book_title".into(),
                sql: Some("create index book_title on Book ('title' ASC)".into()),
            }],
        };
        assert!(plan_table(&schema, Some(&live)).is_empty());
    }

    #[test]
    fn test_automatic_indexes_are_never_touched() {
        let schema = sample_schema();
        let live = LiveTable {
            columns: vec!["_id".into(), "title".into(), "pages".into(), "rating".into()],
            indexes: vec![
                LiveIndex {
                    name: "Book_title".into(),
                    sql: Some("create index Book_title on Book ('title' ASC)".into()),
                },
                LiveIndex { name: "sqlite_autoindex_Book_1".into(), sql: None },
            ],
        };
        assert!(plan_table(&schema, Some(&live)).is_empty());
    }

    #[test]
    fn test_missing_index_is_created_on_existing_table() {
        let schema = sample_schema();
        let live = LiveTable {
            columns: vec!["_id".into(), "title".into(), "pages".into(), "rating".into()],
            indexes: vec![],
        };
        let plan = plan_table(&schema, Some(&live));
        assert_eq!(
            plan,
            ["create index if not exists Book_title on Book ('title' ASC)"]
        );
    }

    #[test]
    fn test_drop_helpers() {
        assert_eq!(
            plan_drop_tables(["Book", "Author"]),
            ["drop table if exists 'Book'", "drop table if exists 'Author'"]
        );
        assert_eq!(
            plan_drop_indices(["Book_title"]),
            ["drop index if exists 'Book_title'"]
        );
    }
}
