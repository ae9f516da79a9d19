//! Record schemas and the default mapped record converter.
//!
//! A record type describes itself once through [`Record::schema`]: a table
//! name plus an ordered list of [`FieldDescriptor`]s, each carrying the
//! field's stored type and a pair of accessors. The registry turns that
//! static description into a [`MappedRecordConverter`], resolving one
//! field converter per retained field at construction time. Nothing about
//! a record is inspected per row.

use std::any::Any;
use std::sync::Arc;

use crate::column::{Column, ColumnType, ID_COLUMN};
use crate::convert::{FieldConverter, RecordConverter, TypeKey};
use crate::error::{Error, Result};
use crate::index::{IndexBuilder, IndexDecl, IndexSpec};
use crate::registry::Registry;
use crate::row::Row;
use crate::value::{RowValues, Value};

/// A record type that maps to one table.
///
/// The schema is consulted once, when the registry builds the type's
/// converter; the `Default` bound supplies the starting instance for the
/// read path (fields absent from a result row keep their default value).
pub trait Record: Default + Sized + 'static {
    /// The static field/column table for this type.
    fn schema() -> RecordSchema<Self>;
}

type Getter<T> = Box<dyn Fn(&T) -> Option<&dyn Any>>;
type Setter<T> = Box<dyn Fn(&mut T, Option<Box<dyn Any>>) -> Result<()>>;

/// One persistable field of a record type.
///
/// Built with [`required`](FieldDescriptor::required) for plain fields or
/// [`optional`](FieldDescriptor::optional) for `Option` fields, then
/// refined with the builder methods. On the write side an optional field
/// holding `None` becomes a NULL cell; on the read side a NULL cell sets
/// an optional field to `None` and leaves a required field at its default.
pub struct FieldDescriptor<T> {
    name: &'static str,
    rename: Option<&'static str>,
    ty: TypeKey,
    ignore: bool,
    is_virtual: bool,
    index: Option<IndexDecl>,
    get: Getter<T>,
    set: Setter<T>,
}

impl<T: 'static> FieldDescriptor<T> {
    /// Describes a required (non-`Option`) field of stored type `F`.
    pub fn required<F: Any>(name: &'static str, get: fn(&T) -> &F, set: fn(&mut T, F)) -> Self {
        Self {
            name,
            rename: None,
            ty: TypeKey::of::<F>(),
            ignore: false,
            is_virtual: false,
            index: None,
            get: Box::new(move |record| Some(get(record) as &dyn Any)),
            set: Box::new(move |record, value| {
                if let Some(value) = value {
                    let value = value.downcast::<F>().map_err(|_| Error::TypeMismatch {
                        field: name,
                        expected: std::any::type_name::<F>(),
                    })?;
                    set(record, *value);
                }
                Ok(())
            }),
        }
    }

    /// Describes an `Option` field of stored type `F`.
    pub fn optional<F: Any>(
        name: &'static str,
        get: fn(&T) -> Option<&F>,
        set: fn(&mut T, Option<F>),
    ) -> Self {
        Self {
            name,
            rename: None,
            ty: TypeKey::of::<F>(),
            ignore: false,
            is_virtual: false,
            index: None,
            get: Box::new(move |record| get(record).map(|value| value as &dyn Any)),
            set: Box::new(move |record, value| match value {
                Some(value) => {
                    let value = value.downcast::<F>().map_err(|_| Error::TypeMismatch {
                        field: name,
                        expected: std::any::type_name::<F>(),
                    })?;
                    set(record, Some(*value));
                    Ok(())
                }
                None => {
                    set(record, None);
                    Ok(())
                }
            }),
        }
    }

    /// Stores this field under `column` instead of the field name.
    ///
    /// Rename directives only take effect on registries built with
    /// `use_column_renames`; otherwise the raw field name is used.
    pub fn renamed(mut self, column: &'static str) -> Self {
        self.rename = Some(column);
        self
    }

    /// Excludes this field from persistence entirely.
    pub fn ignored(mut self) -> Self {
        self.ignore = true;
        self
    }

    /// Marks this field's column as a read-only projection (virtual): part
    /// of the column list and read from results, but never written and
    /// never created in the table.
    pub fn computed(mut self) -> Self {
        self.is_virtual = true;
        self
    }

    /// Declares index membership for this field's column.
    pub fn indexed(mut self, decl: IndexDecl) -> Self {
        self.index = Some(decl);
        self
    }

    /// The declared field name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The stored type's key.
    pub fn ty(&self) -> TypeKey {
        self.ty
    }

    fn column_name(&self, use_renames: bool) -> &'static str {
        if use_renames {
            self.rename.unwrap_or(self.name)
        } else {
            self.name
        }
    }
}

/// The static table mapping for a record type: table name plus field
/// descriptors in declaration order.
pub struct RecordSchema<T> {
    table: &'static str,
    fields: Vec<FieldDescriptor<T>>,
}

impl<T> RecordSchema<T> {
    /// Starts a schema for `table`.
    pub fn new(table: &'static str) -> Self {
        Self { table, fields: Vec::new() }
    }

    /// Appends a field descriptor; declaration order is column order.
    pub fn field(mut self, descriptor: FieldDescriptor<T>) -> Self {
        self.fields.push(descriptor);
        self
    }

    /// The table name.
    pub fn table(&self) -> &'static str {
        self.table
    }
}

struct BoundField<T> {
    descriptor: FieldDescriptor<T>,
    converter: Arc<dyn FieldConverter>,
}

/// The default record converter, built from a type's [`RecordSchema`].
///
/// Field handling follows the schema declaration order: ignored fields are
/// skipped, fields whose converter reports no column type are dropped from
/// the column list, and of two fields mapping to the same column name only
/// the first declared is kept. The identifier is the first retained field
/// whose column name is [`ID_COLUMN`].
pub struct MappedRecordConverter<T: Record> {
    table: String,
    columns: Vec<Column>,
    fields: Vec<BoundField<T>>,
    id_field: Option<usize>,
    indexes: Vec<IndexSpec>,
}

impl<T: Record> MappedRecordConverter<T> {
    /// Builds the converter, resolving one field converter per retained
    /// field through `registry`.
    pub fn build(registry: &Registry) -> Result<Self> {
        let schema = T::schema();
        let table = schema.table.to_string();
        let use_renames = registry.use_column_renames();

        let mut columns: Vec<Column> = Vec::with_capacity(schema.fields.len());
        let mut fields = Vec::with_capacity(schema.fields.len());
        let mut id_field = None;
        let mut index_builder = IndexBuilder::new();

        for descriptor in schema.fields {
            if descriptor.ignore {
                continue;
            }
            let converter = match registry.field_converter_for(descriptor.ty) {
                Ok(converter) => converter,
                Err(Error::UnsupportedFieldType { type_name }) => {
                    return Err(Error::UnsupportedField {
                        record: std::any::type_name::<T>(),
                        field: descriptor.name,
                        type_name,
                    });
                }
                Err(other) => return Err(other),
            };
            let Some(column_type) = converter.column_type()? else {
                // The field type is convertible but not storable; drop the
                // column entirely.
                continue;
            };
            let column_type = if descriptor.is_virtual {
                ColumnType::Virtual
            } else {
                column_type
            };
            let name = descriptor.column_name(use_renames);
            if columns.iter().any(|col| col.name.eq_ignore_ascii_case(name)) {
                // First declared field with a given column name wins.
                continue;
            }
            if let Some(decl) = &descriptor.index {
                index_builder.add_column(&table, name, decl)?;
            }
            if id_field.is_none() && name == ID_COLUMN {
                id_field = Some(fields.len());
            }
            columns.push(Column::new(name, column_type));
            fields.push(BoundField { descriptor, converter });
        }

        let indexes = index_builder.build()?;
        Ok(Self { table, columns, fields, id_field, indexes })
    }
}

impl<T: Record> RecordConverter<T> for MappedRecordConverter<T> {
    fn table(&self) -> Result<&str> {
        Ok(&self.table)
    }

    fn columns(&self) -> Result<&[Column]> {
        Ok(&self.columns)
    }

    fn index_specs(&self) -> Result<&[IndexSpec]> {
        Ok(&self.indexes)
    }

    fn to_row(&self, record: &T, values: &mut RowValues) -> Result<()> {
        for (field, column) in self.fields.iter().zip(&self.columns) {
            if column.is_virtual() {
                continue;
            }
            match (field.descriptor.get)(record) {
                Some(value) => {
                    values.put(column.name.clone(), field.converter.to_value(value)?);
                }
                None => {
                    // An unset identifier is omitted so the store assigns one.
                    if column.name != ID_COLUMN {
                        values.put(column.name.clone(), Value::Null);
                    }
                }
            }
        }
        Ok(())
    }

    fn from_row(&self, row: &dyn Row) -> Result<T> {
        let mut record = T::default();
        // The row is guaranteed to expose our columns in our order, but may
        // stop short of the full list.
        let count = row.columns().len().min(self.fields.len());
        for index in 0..count {
            let field = &self.fields[index];
            if row.is_null(index) {
                (field.descriptor.set)(&mut record, None)?;
            } else {
                let value = field.converter.from_row(row, index)?;
                (field.descriptor.set)(&mut record, Some(value))?;
            }
        }
        Ok(record)
    }

    fn id_of(&self, record: &T) -> Result<Option<i64>> {
        let Some(index) = self.id_field else {
            return Ok(None);
        };
        let field = &self.fields[index];
        match (field.descriptor.get)(record) {
            Some(value) => {
                let id = value.downcast_ref::<i64>().ok_or(Error::TypeMismatch {
                    field: field.descriptor.name,
                    expected: "i64",
                })?;
                Ok(Some(*id))
            }
            None => Ok(None),
        }
    }

    fn set_id(&self, record: &mut T, id: i64) -> Result<()> {
        if let Some(index) = self.id_field {
            let field = &self.fields[index];
            (field.descriptor.set)(record, Some(Box::new(id)))?;
        }
        Ok(())
    }
}
