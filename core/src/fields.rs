//! Built-in field converters and the factories that serve them.
//!
//! Scalars, strings, blobs and timestamps are covered by
//! [`ScalarConverterFactory`]; text-backed enums by [`EnumFieldConverter`]
//! (seeded per type through the registry builder); and fields holding
//! another registered record type by [`RecordFieldConverterFactory`], which
//! stores only the referenced record's identifier.

use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::column::ColumnType;
use crate::convert::{FieldConverter, FieldConverterFactory, RecordConverter, TypeKey};
use crate::error::{Error, Result};
use crate::record::Record;
use crate::registry::Registry;
use crate::row::Row;
use crate::value::Value;

fn expect<T: Any>(value: &dyn Any) -> Result<&T> {
    value.downcast_ref::<T>().ok_or(Error::ValueType {
        expected: std::any::type_name::<T>(),
    })
}

macro_rules! integer_converter {
    ($name:ident, $ty:ty) => {
        struct $name;

        impl FieldConverter for $name {
            fn column_type(&self) -> Result<Option<ColumnType>> {
                Ok(Some(ColumnType::Integer))
            }

            fn to_value(&self, value: &dyn Any) -> Result<Value> {
                Ok(Value::Integer(*expect::<$ty>(value)? as i64))
            }

            fn from_row(&self, row: &dyn Row, index: usize) -> Result<Box<dyn Any>> {
                Ok(Box::new(row.integer(index) as $ty))
            }
        }
    };
}

integer_converter!(I64Converter, i64);
integer_converter!(I32Converter, i32);
integer_converter!(I16Converter, i16);
integer_converter!(I8Converter, i8);
integer_converter!(U32Converter, u32);
integer_converter!(U16Converter, u16);
integer_converter!(U8Converter, u8);

macro_rules! real_converter {
    ($name:ident, $ty:ty) => {
        struct $name;

        impl FieldConverter for $name {
            fn column_type(&self) -> Result<Option<ColumnType>> {
                Ok(Some(ColumnType::Real))
            }

            fn to_value(&self, value: &dyn Any) -> Result<Value> {
                Ok(Value::Real(*expect::<$ty>(value)? as f64))
            }

            fn from_row(&self, row: &dyn Row, index: usize) -> Result<Box<dyn Any>> {
                Ok(Box::new(row.real(index) as $ty))
            }
        }
    };
}

real_converter!(F64Converter, f64);
real_converter!(F32Converter, f32);

struct BoolConverter;

impl FieldConverter for BoolConverter {
    fn column_type(&self) -> Result<Option<ColumnType>> {
        Ok(Some(ColumnType::Integer))
    }

    fn to_value(&self, value: &dyn Any) -> Result<Value> {
        Ok(Value::Integer(i64::from(*expect::<bool>(value)?)))
    }

    fn from_row(&self, row: &dyn Row, index: usize) -> Result<Box<dyn Any>> {
        // Tolerate textual booleans left behind by older schemas.
        let flag = match row.text(index) {
            Some(text) => text.eq_ignore_ascii_case("true"),
            None => row.integer(index) == 1,
        };
        Ok(Box::new(flag))
    }
}

struct StringConverter;

impl FieldConverter for StringConverter {
    fn column_type(&self) -> Result<Option<ColumnType>> {
        Ok(Some(ColumnType::Text))
    }

    fn to_value(&self, value: &dyn Any) -> Result<Value> {
        Ok(Value::Text(expect::<String>(value)?.clone()))
    }

    fn from_row(&self, row: &dyn Row, index: usize) -> Result<Box<dyn Any>> {
        Ok(Box::new(row.text(index).unwrap_or_default().to_string()))
    }
}

struct BlobConverter;

impl FieldConverter for BlobConverter {
    fn column_type(&self) -> Result<Option<ColumnType>> {
        Ok(Some(ColumnType::Blob))
    }

    fn to_value(&self, value: &dyn Any) -> Result<Value> {
        Ok(Value::Blob(expect::<Vec<u8>>(value)?.clone()))
    }

    fn from_row(&self, row: &dyn Row, index: usize) -> Result<Box<dyn Any>> {
        Ok(Box::new(row.blob(index).map(<[u8]>::to_vec).unwrap_or_default()))
    }
}

/// Stores UTC timestamps as integer milliseconds since the Unix epoch.
struct TimestampConverter;

impl FieldConverter for TimestampConverter {
    fn column_type(&self) -> Result<Option<ColumnType>> {
        Ok(Some(ColumnType::Integer))
    }

    fn to_value(&self, value: &dyn Any) -> Result<Value> {
        Ok(Value::Integer(expect::<DateTime<Utc>>(value)?.timestamp_millis()))
    }

    fn from_row(&self, row: &dyn Row, index: usize) -> Result<Box<dyn Any>> {
        let millis = row.integer(index);
        let stamp = DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
            Error::ValueDecode {
                value: millis.to_string(),
                type_name: "chrono::DateTime<Utc>",
            }
        })?;
        Ok(Box::new(stamp))
    }
}

/// Serves the built-in scalar field types.
///
/// Covers the signed and unsigned integer widths up to 64 bits, both float
/// widths, `bool`, `String`, `Vec<u8>` blobs, and `chrono::DateTime<Utc>`
/// (stored as epoch milliseconds). Installed automatically as the last
/// field converter factory of every registry.
pub struct ScalarConverterFactory {
    converters: HashMap<TypeKey, Arc<dyn FieldConverter>>,
}

impl ScalarConverterFactory {
    pub fn new() -> Self {
        let mut converters: HashMap<TypeKey, Arc<dyn FieldConverter>> = HashMap::new();
        converters.insert(TypeKey::of::<i64>(), Arc::new(I64Converter));
        converters.insert(TypeKey::of::<i32>(), Arc::new(I32Converter));
        converters.insert(TypeKey::of::<i16>(), Arc::new(I16Converter));
        converters.insert(TypeKey::of::<i8>(), Arc::new(I8Converter));
        converters.insert(TypeKey::of::<u32>(), Arc::new(U32Converter));
        converters.insert(TypeKey::of::<u16>(), Arc::new(U16Converter));
        converters.insert(TypeKey::of::<u8>(), Arc::new(U8Converter));
        converters.insert(TypeKey::of::<f64>(), Arc::new(F64Converter));
        converters.insert(TypeKey::of::<f32>(), Arc::new(F32Converter));
        converters.insert(TypeKey::of::<bool>(), Arc::new(BoolConverter));
        converters.insert(TypeKey::of::<String>(), Arc::new(StringConverter));
        converters.insert(TypeKey::of::<Vec<u8>>(), Arc::new(BlobConverter));
        converters.insert(TypeKey::of::<DateTime<Utc>>(), Arc::new(TimestampConverter));
        Self { converters }
    }
}

impl Default for ScalarConverterFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldConverterFactory for ScalarConverterFactory {
    fn create(
        &self,
        _registry: &Registry,
        ty: TypeKey,
    ) -> Result<Option<Arc<dyn FieldConverter>>> {
        Ok(self.converters.get(&ty).cloned())
    }
}

/// An enum with a canonical text form, storable as a TEXT column.
pub trait TextEnum: Any + Sized {
    /// The stored text for this variant.
    fn as_text(&self) -> &'static str;

    /// Parses a stored text back into a variant.
    fn from_text(text: &str) -> Option<Self>;
}

/// Field converter for a [`TextEnum`] type.
///
/// Register one per enum type through
/// [`RegistryBuilder::field_converter`](crate::RegistryBuilder::field_converter):
///
/// ```
/// use rowmap_core::{EnumFieldConverter, RegistryBuilder, TextEnum};
///
/// #[derive(Debug, PartialEq)]
/// enum Format {
///     Paperback,
///     Hardcover,
/// }
///
/// impl TextEnum for Format {
///     fn as_text(&self) -> &'static str {
///         match self {
///             Format::Paperback => "PAPERBACK",
///             Format::Hardcover => "HARDCOVER",
///         }
///     }
///
///     fn from_text(text: &str) -> Option<Self> {
///         match text {
///             "PAPERBACK" => Some(Format::Paperback),
///             "HARDCOVER" => Some(Format::Hardcover),
///             _ => None,
///         }
///     }
/// }
///
/// let registry = RegistryBuilder::new()
///     .field_converter::<Format>(EnumFieldConverter::<Format>::new())
///     .build();
/// ```
pub struct EnumFieldConverter<E: TextEnum> {
    _marker: PhantomData<fn() -> E>,
}

impl<E: TextEnum> EnumFieldConverter<E> {
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }
}

impl<E: TextEnum> Default for EnumFieldConverter<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: TextEnum> FieldConverter for EnumFieldConverter<E> {
    fn column_type(&self) -> Result<Option<ColumnType>> {
        Ok(Some(ColumnType::Text))
    }

    fn to_value(&self, value: &dyn Any) -> Result<Value> {
        Ok(Value::Text(expect::<E>(value)?.as_text().to_string()))
    }

    fn from_row(&self, row: &dyn Row, index: usize) -> Result<Box<dyn Any>> {
        let text = row.text(index).unwrap_or_default();
        let variant = E::from_text(text).ok_or_else(|| Error::ValueDecode {
            value: text.to_string(),
            type_name: std::any::type_name::<E>(),
        })?;
        Ok(Box::new(variant))
    }
}

/// Field converter for a field holding another registered record type.
///
/// Only the referenced record's identifier crosses the column boundary: the
/// cell is an INTEGER id, and reading back yields a default instance with
/// only the identifier set. Crucially, the column type is reported without
/// consulting the referenced record's converter, which is what lets
/// mutually referencing record types resolve.
pub(crate) struct RecordRefConverter<T: Record> {
    converter: Arc<dyn RecordConverter<T>>,
}

impl<T: Record> RecordRefConverter<T> {
    pub(crate) fn new(converter: Arc<dyn RecordConverter<T>>) -> Self {
        Self { converter }
    }
}

impl<T: Record> FieldConverter for RecordRefConverter<T> {
    fn column_type(&self) -> Result<Option<ColumnType>> {
        Ok(Some(ColumnType::Integer))
    }

    fn to_value(&self, value: &dyn Any) -> Result<Value> {
        let record = expect::<T>(value)?;
        Ok(Value::from(self.converter.id_of(record)?))
    }

    fn from_row(&self, row: &dyn Row, index: usize) -> Result<Box<dyn Any>> {
        let mut record = T::default();
        self.converter.set_id(&mut record, row.integer(index))?;
        Ok(Box::new(record))
    }
}

/// [`RecordRefConverter`] for fields holding `Box<T>`, which is how a
/// record type refers to itself or participates in a reference cycle.
pub(crate) struct RecordBoxRefConverter<T: Record> {
    converter: Arc<dyn RecordConverter<T>>,
}

impl<T: Record> RecordBoxRefConverter<T> {
    pub(crate) fn new(converter: Arc<dyn RecordConverter<T>>) -> Self {
        Self { converter }
    }
}

impl<T: Record> FieldConverter for RecordBoxRefConverter<T> {
    fn column_type(&self) -> Result<Option<ColumnType>> {
        Ok(Some(ColumnType::Integer))
    }

    fn to_value(&self, value: &dyn Any) -> Result<Value> {
        let record = expect::<Box<T>>(value)?;
        Ok(Value::from(self.converter.id_of(record)?))
    }

    fn from_row(&self, row: &dyn Row, index: usize) -> Result<Box<dyn Any>> {
        let mut record = T::default();
        self.converter.set_id(&mut record, row.integer(index))?;
        Ok(Box::new(Box::new(record)))
    }
}

/// Serves field converters for registered record types.
///
/// Installed automatically ahead of [`ScalarConverterFactory`]; defers to
/// the registry, which knows how to build a typed [`RecordRefConverter`]
/// for each registered type.
pub(crate) struct RecordFieldConverterFactory;

impl FieldConverterFactory for RecordFieldConverterFactory {
    fn create(
        &self,
        registry: &Registry,
        ty: TypeKey,
    ) -> Result<Option<Arc<dyn FieldConverter>>> {
        registry.record_ref_field_converter(ty)
    }
}
