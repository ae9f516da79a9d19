//! Bridging between rusqlite rows and the engine's row model.

use rowmap_core::{Value, ValueRow};
use rusqlite::types::ValueRef;

/// Buffers one rusqlite result row into an owned [`ValueRow`].
///
/// Result rows only live for the duration of a statement step; converters
/// work against the buffered copy instead.
pub(crate) fn buffer_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ValueRow> {
    let statement = row.as_ref();
    let mut buffered = ValueRow::new();
    for index in 0..statement.column_count() {
        let name = statement.column_name(index)?.to_string();
        let value = match row.get_ref(index)? {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(v) => Value::Integer(v),
            ValueRef::Real(v) => Value::Real(v),
            ValueRef::Text(text) => Value::Text(String::from_utf8_lossy(text).into_owned()),
            ValueRef::Blob(blob) => Value::Blob(blob.to_vec()),
        };
        buffered.push(name, value);
    }
    Ok(buffered)
}

/// Converts an engine cell into an owned rusqlite parameter value.
pub(crate) fn sql_value(value: &Value) -> rusqlite::types::Value {
    match value {
        Value::Null => rusqlite::types::Value::Null,
        Value::Integer(v) => rusqlite::types::Value::Integer(*v),
        Value::Real(v) => rusqlite::types::Value::Real(*v),
        Value::Text(s) => rusqlite::types::Value::Text(s.clone()),
        Value::Blob(b) => rusqlite::types::Value::Blob(b.clone()),
    }
}
