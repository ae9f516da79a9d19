//! Live schema introspection.
//!
//! Reads the actual shape of a table out of SQLite so the planner can diff
//! it against the desired schema: column names via `pragma table_info`,
//! index definitions via `sqlite_master`. Automatic indexes show up with a
//! NULL `sql` column and are preserved as such, which is what tells the
//! planner to leave them alone.

use rowmap_core::{LiveIndex, LiveTable};
use rusqlite::Connection;

use crate::error::Result;

/// Snapshots the live shape of `table`, or `None` when the table does not
/// exist.
pub fn live_table(conn: &Connection, table: &str) -> Result<Option<LiveTable>> {
    let count: i64 = conn.query_row(
        "select count(*) from sqlite_master where type = 'table' and name = ?1",
        [table],
        |row| row.get(0),
    )?;
    if count == 0 {
        return Ok(None);
    }

    let mut columns = Vec::new();
    let mut statement = conn.prepare(&format!("pragma table_info('{table}')"))?;
    let mut rows = statement.query([])?;
    while let Some(row) = rows.next()? {
        columns.push(row.get::<_, String>(1)?);
    }

    let mut indexes = Vec::new();
    let mut statement =
        conn.prepare("select name, sql from sqlite_master where type = 'index' and tbl_name = ?1")?;
    let mut rows = statement.query([table])?;
    while let Some(row) = rows.next()? {
        indexes.push(LiveIndex { name: row.get(0)?, sql: row.get(1)? });
    }

    Ok(Some(LiveTable { columns, indexes }))
}
