//! Read-side row abstraction and the column-order view.
//!
//! A [`Row`] is the minimal surface a record converter reads from: a
//! column-name list, a per-index null test, and typed accessors that fall
//! back to the type's zero value when a cell is absent. [`ValueRow`] is an
//! owned row buffered from a query result; [`ColumnOrderView`] adapts any
//! row to a converter's canonical column order.

use crate::value::{RowValues, Value};

/// A readable result row.
///
/// Accessors take the index into [`columns`](Row::columns). An index whose
/// cell is absent or SQL NULL yields the zero value (`0`, `0.0`) for the
/// numeric accessors and `None` for [`text`](Row::text) and
/// [`blob`](Row::blob); [`is_null`](Row::is_null) reports `true` for both
/// absent and NULL cells.
pub trait Row {
    /// The column names this row exposes, in cell order.
    fn columns(&self) -> &[String];

    /// Whether the cell at `index` is absent or SQL NULL.
    fn is_null(&self, index: usize) -> bool;

    /// The cell at `index` as an integer.
    fn integer(&self, index: usize) -> i64;

    /// The cell at `index` as a float.
    fn real(&self, index: usize) -> f64;

    /// The cell at `index` as text, or `None` when absent, NULL, or not
    /// a text cell.
    fn text(&self, index: usize) -> Option<&str>;

    /// The cell at `index` as a blob, or `None` when absent, NULL, or not
    /// a blob cell.
    fn blob(&self, index: usize) -> Option<&[u8]>;
}

/// An owned row of named cells.
///
/// Storage backends buffer each result row into one of these before
/// handing it to a converter, and tests use it to fabricate rows.
#[derive(Debug, Clone, Default)]
pub struct ValueRow {
    columns: Vec<String>,
    cells: Vec<Value>,
}

impl ValueRow {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a named cell.
    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.columns.push(column.into());
        self.cells.push(value);
    }

    /// Builds a row from a write buffer, keeping its cell order.
    pub fn from_values(values: &RowValues) -> Self {
        let mut row = Self::new();
        for (name, value) in values.iter() {
            row.push(name, value.clone());
        }
        row
    }

    fn cell(&self, index: usize) -> Option<&Value> {
        self.cells.get(index)
    }
}

impl Row for ValueRow {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn is_null(&self, index: usize) -> bool {
        match self.cell(index) {
            Some(value) => value.is_null(),
            None => true,
        }
    }

    fn integer(&self, index: usize) -> i64 {
        match self.cell(index) {
            Some(Value::Integer(v)) => *v,
            Some(Value::Real(v)) => *v as i64,
            Some(Value::Text(s)) => s.parse().unwrap_or(0),
            _ => 0,
        }
    }

    fn real(&self, index: usize) -> f64 {
        match self.cell(index) {
            Some(Value::Real(v)) => *v,
            Some(Value::Integer(v)) => *v as f64,
            Some(Value::Text(s)) => s.parse().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    fn text(&self, index: usize) -> Option<&str> {
        match self.cell(index) {
            Some(Value::Text(s)) => Some(s),
            _ => None,
        }
    }

    fn blob(&self, index: usize) -> Option<&[u8]> {
        match self.cell(index) {
            Some(Value::Blob(b)) => Some(b),
            _ => None,
        }
    }
}

/// Presents a source row as if it exposed a requested column order.
///
/// The view is built once per read pass: for every requested column it
/// resolves the source index by case-insensitive name match, or marks the
/// column absent. Absent cells read as NULL/zero. The reported column list
/// is truncated after the last requested column actually present in the
/// source, so converters are never fed a trailing run of phantom columns;
/// absent columns *before* that point are kept and read as NULL.
///
/// # Examples
///
/// ```
/// use rowmap_core::{ColumnOrderView, Row, Value, ValueRow};
///
/// let mut source = ValueRow::new();
/// source.push("a", Value::Integer(1));
/// source.push("b", Value::Integer(2));
/// source.push("c", Value::Integer(3));
///
/// let view = ColumnOrderView::new(&source, &["c".into(), "a".into(), "b".into()]);
/// assert_eq!(view.columns(), ["c", "a", "b"]);
/// assert_eq!(view.integer(1), 1);
/// ```
pub struct ColumnOrderView<'a> {
    source: &'a dyn Row,
    columns: Vec<String>,
    map: Vec<Option<usize>>,
}

impl<'a> ColumnOrderView<'a> {
    /// Builds a view of `source` in the requested column order.
    pub fn new(source: &'a dyn Row, requested: &[String]) -> Self {
        let mut map = Vec::with_capacity(requested.len());
        let mut last_present = None;
        for (i, name) in requested.iter().enumerate() {
            let index = source
                .columns()
                .iter()
                .position(|col| col.eq_ignore_ascii_case(name));
            if index.is_some() {
                last_present = Some(i);
            }
            map.push(index);
        }
        // Drop the trailing run of requested columns the source does not have.
        let keep = last_present.map_or(0, |last| last + 1);
        map.truncate(keep);
        let columns = requested[..keep].to_vec();
        Self { source, columns, map }
    }

    fn source_index(&self, index: usize) -> Option<usize> {
        self.map.get(index).copied().flatten()
    }
}

impl Row for ColumnOrderView<'_> {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn is_null(&self, index: usize) -> bool {
        match self.source_index(index) {
            Some(i) => self.source.is_null(i),
            None => true,
        }
    }

    fn integer(&self, index: usize) -> i64 {
        self.source_index(index)
            .map_or(0, |i| self.source.integer(i))
    }

    fn real(&self, index: usize) -> f64 {
        self.source_index(index)
            .map_or(0.0, |i| self.source.real(i))
    }

    fn text(&self, index: usize) -> Option<&str> {
        self.source_index(index).and_then(|i| self.source.text(i))
    }

    fn blob(&self, index: usize) -> Option<&[u8]> {
        self.source_index(index).and_then(|i| self.source.blob(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> ValueRow {
        let mut row = ValueRow::new();
        row.push("a", Value::Integer(10));
        row.push("b", Value::Text("bee".into()));
        row.push("c", Value::Real(2.5));
        row
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_reorders_columns() {
        let row = source();
        let view = ColumnOrderView::new(&row, &names(&["c", "a", "b"]));
        assert_eq!(view.columns(), ["c", "a", "b"]);
        assert_eq!(view.real(0), 2.5);
        assert_eq!(view.integer(1), 10);
        assert_eq!(view.text(2), Some("bee"));
    }

    #[test]
    fn test_trailing_missing_columns_are_dropped() {
        let row = source();
        let view = ColumnOrderView::new(&row, &names(&["m1", "c", "a", "b", "m2", "m3"]));
        assert_eq!(view.columns(), ["m1", "c", "a", "b"]);
        assert!(view.is_null(0));
        assert_eq!(view.integer(0), 0);
        assert_eq!(view.text(0), None);
        assert_eq!(view.real(1), 2.5);
    }

    #[test]
    fn test_no_columns_match() {
        let row = source();
        let view = ColumnOrderView::new(&row, &names(&["x", "y"]));
        assert!(view.columns().is_empty());
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let row = source();
        let view = ColumnOrderView::new(&row, &names(&["B", "A"]));
        assert_eq!(view.columns(), ["B", "A"]);
        assert_eq!(view.text(0), Some("bee"));
        assert_eq!(view.integer(1), 10);
    }

    #[test]
    fn test_absent_mid_list_reads_as_null() {
        let row = source();
        let view = ColumnOrderView::new(&row, &names(&["a", "missing", "c"]));
        assert_eq!(view.columns(), ["a", "missing", "c"]);
        assert!(!view.is_null(0));
        assert!(view.is_null(1));
        assert!(!view.is_null(2));
    }
}
