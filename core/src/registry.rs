//! Converter registry: registration, factory chains, and cycle-safe
//! resolution.
//!
//! The registry caches one record converter per registered type and one
//! field converter per field type, both resolved lazily through factory
//! chains (most recently registered factory first, built-in factories
//! last). Resolution is reentrant: building a record converter resolves
//! its field converters, which may in turn resolve record converters.
//! Types that refer to each other (or to themselves through `Box`) are
//! handled by parking a forwarding placeholder in an in-flight table while
//! the real converter is under construction; the placeholder is wired to
//! the finished converter afterwards and fails with
//! [`Error::PendingConverter`] only if used before that.
//!
//! Resolution failures are never cached. Registering a matching factory
//! and retrying the same operation is always valid.
//!
//! The registry uses interior mutability and is meant to be owned by one
//! thread; share it behind your own synchronization if needed.

use std::any::Any;
use std::cell::{OnceCell, RefCell};
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::column::Column;
use crate::convert::{
    ErasedRecordConverter, FieldConverter, FieldConverterFactory, RecordConverter,
    RecordConverterFactory, TypeKey,
};
use crate::error::{Error, Result};
use crate::fields::{
    RecordBoxRefConverter, RecordFieldConverterFactory, RecordRefConverter,
    ScalarConverterFactory,
};
use crate::index::IndexSpec;
use crate::record::{MappedRecordConverter, Record};
use crate::row::Row;
use crate::schema::TableSchema;
use crate::value::RowValues;

/// Placeholder record converter handed out while the real one is under
/// construction. Every call forwards to the settled delegate.
struct ForwardingRecordConverter<T> {
    delegate: OnceCell<Arc<dyn RecordConverter<T>>>,
}

impl<T> ForwardingRecordConverter<T> {
    fn new() -> Self {
        Self { delegate: OnceCell::new() }
    }

    fn settle(&self, delegate: Arc<dyn RecordConverter<T>>) {
        // A placeholder is settled at most once per resolution pass.
        let _ = self.delegate.set(delegate);
    }

    fn delegate(&self) -> Result<&Arc<dyn RecordConverter<T>>> {
        self.delegate.get().ok_or(Error::PendingConverter)
    }
}

impl<T> RecordConverter<T> for ForwardingRecordConverter<T> {
    fn table(&self) -> Result<&str> {
        self.delegate()?.table()
    }

    fn columns(&self) -> Result<&[Column]> {
        self.delegate()?.columns()
    }

    fn index_specs(&self) -> Result<&[IndexSpec]> {
        self.delegate()?.index_specs()
    }

    fn to_row(&self, record: &T, values: &mut RowValues) -> Result<()> {
        self.delegate()?.to_row(record, values)
    }

    fn from_row(&self, row: &dyn Row) -> Result<T> {
        self.delegate()?.from_row(row)
    }

    fn id_of(&self, record: &T) -> Result<Option<i64>> {
        self.delegate()?.id_of(record)
    }

    fn set_id(&self, record: &mut T, id: i64) -> Result<()> {
        self.delegate()?.set_id(record, id)
    }
}

/// Field-side counterpart of [`ForwardingRecordConverter`].
pub(crate) struct ForwardingFieldConverter {
    delegate: OnceCell<Arc<dyn FieldConverter>>,
}

impl ForwardingFieldConverter {
    fn new() -> Self {
        Self { delegate: OnceCell::new() }
    }

    fn settle(&self, delegate: Arc<dyn FieldConverter>) {
        let _ = self.delegate.set(delegate);
    }

    fn delegate(&self) -> Result<&Arc<dyn FieldConverter>> {
        self.delegate.get().ok_or(Error::PendingConverter)
    }
}

impl FieldConverter for ForwardingFieldConverter {
    fn column_type(&self) -> Result<Option<crate::ColumnType>> {
        self.delegate()?.column_type()
    }

    fn to_value(&self, value: &dyn Any) -> Result<crate::Value> {
        self.delegate()?.to_value(value)
    }

    fn from_row(&self, row: &dyn Row, index: usize) -> Result<Box<dyn Any>> {
        self.delegate()?.from_row(row, index)
    }
}

/// Per-type hooks captured at registration time.
///
/// Generic converter construction happens behind these monomorphized
/// function pointers, which is what lets the type-erased factory chain
/// build typed converters for any registered type.
struct RecordBinding {
    ty: TypeKey,
    box_ty: TypeKey,
    make_mapped: fn(&Registry) -> Result<ErasedRecordConverter>,
    make_ref_field: fn(&Registry) -> Result<Arc<dyn FieldConverter>>,
    make_box_ref_field: fn(&Registry) -> Result<Arc<dyn FieldConverter>>,
    make_table_schema: fn(&Registry) -> Result<TableSchema>,
}

fn make_mapped<T: Record>(registry: &Registry) -> Result<ErasedRecordConverter> {
    let converter = MappedRecordConverter::<T>::build(registry)?;
    Ok(ErasedRecordConverter::new::<T>(Arc::new(converter)))
}

fn make_ref_field<T: Record>(registry: &Registry) -> Result<Arc<dyn FieldConverter>> {
    let converter = registry.record_converter::<T>()?;
    Ok(Arc::new(RecordRefConverter::new(converter)))
}

fn make_box_ref_field<T: Record>(registry: &Registry) -> Result<Arc<dyn FieldConverter>> {
    let converter = registry.record_converter::<T>()?;
    Ok(Arc::new(RecordBoxRefConverter::new(converter)))
}

fn make_table_schema<T: Record>(registry: &Registry) -> Result<TableSchema> {
    let converter = registry.record_converter::<T>()?;
    TableSchema::for_converter(converter.as_ref())
}

/// The always-last record converter factory: builds a
/// [`MappedRecordConverter`] from the type's registered schema.
struct MappedRecordFactory;

impl RecordConverterFactory for MappedRecordFactory {
    fn create(&self, registry: &Registry, ty: TypeKey) -> Result<Option<ErasedRecordConverter>> {
        registry.mapped_record_converter(ty)
    }
}

/// Builds a [`Registry`].
///
/// # Examples
///
/// ```no_run
/// use rowmap_core::{Record, RegistryBuilder};
/// # #[derive(Default)] struct Book;
/// # impl Record for Book {
/// #     fn schema() -> rowmap_core::RecordSchema<Self> {
/// #         rowmap_core::RecordSchema::new("Book")
/// #     }
/// # }
///
/// let registry = RegistryBuilder::new()
///     .use_column_renames()
///     .register::<Book>()
///     .build();
/// ```
pub struct RegistryBuilder {
    registry: Registry,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self { registry: Registry::with_defaults() }
    }

    /// Honors per-field column rename directives. Off by default, in which
    /// case renames are ignored and raw field names are used.
    pub fn use_column_renames(mut self) -> Self {
        self.registry.use_column_renames = true;
        self
    }

    /// Registers a record type.
    pub fn register<T: Record>(self) -> Self {
        self.registry.register::<T>();
        self
    }

    /// Registers a record converter factory, consulted before all
    /// previously registered ones.
    pub fn record_factory(self, factory: Arc<dyn RecordConverterFactory>) -> Self {
        self.registry.register_record_factory(factory);
        self
    }

    /// Registers a field converter factory, consulted before all
    /// previously registered ones.
    pub fn field_factory(self, factory: Arc<dyn FieldConverterFactory>) -> Self {
        self.registry.register_field_factory(factory);
        self
    }

    /// Installs a converter for one specific field type, bypassing the
    /// factory chain for it. This is how enum field converters are added.
    pub fn field_converter<F: Any>(self, converter: impl FieldConverter + 'static) -> Self {
        self.registry
            .field_cache
            .borrow_mut()
            .insert(TypeKey::of::<F>(), Arc::new(converter));
        self
    }

    pub fn build(self) -> Registry {
        self.registry
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The converter registry.
///
/// Holds registered record types, the factory chains, and the converter
/// caches. Obtain one through [`RegistryBuilder`]; further registrations
/// remain possible afterwards through `&self` methods.
pub struct Registry {
    use_column_renames: bool,
    bindings: RefCell<Vec<RecordBinding>>,
    record_factories: RefCell<Vec<Arc<dyn RecordConverterFactory>>>,
    field_factories: RefCell<Vec<Arc<dyn FieldConverterFactory>>>,
    record_cache: RefCell<HashMap<TypeKey, ErasedRecordConverter>>,
    field_cache: RefCell<HashMap<TypeKey, Arc<dyn FieldConverter>>>,
    record_pending: RefCell<HashMap<TypeKey, Box<dyn Any>>>,
    field_pending: RefCell<HashMap<TypeKey, Arc<ForwardingFieldConverter>>>,
}

impl Registry {
    fn with_defaults() -> Self {
        Self {
            use_column_renames: false,
            bindings: RefCell::new(Vec::new()),
            record_factories: RefCell::new(vec![Arc::new(MappedRecordFactory)]),
            field_factories: RefCell::new(vec![
                Arc::new(ScalarConverterFactory::new()),
                Arc::new(RecordFieldConverterFactory),
            ]),
            record_cache: RefCell::new(HashMap::new()),
            field_cache: RefCell::new(HashMap::new()),
            record_pending: RefCell::new(HashMap::new()),
            field_pending: RefCell::new(HashMap::new()),
        }
    }

    /// Whether per-field rename directives are honored.
    pub fn use_column_renames(&self) -> bool {
        self.use_column_renames
    }

    /// Registers a record type. Registering a type twice is a no-op.
    pub fn register<T: Record>(&self) {
        let ty = TypeKey::of::<T>();
        let mut bindings = self.bindings.borrow_mut();
        if bindings.iter().any(|binding| binding.ty == ty) {
            return;
        }
        debug!(record = ty.name(), "registering record type");
        bindings.push(RecordBinding {
            ty,
            box_ty: TypeKey::of::<Box<T>>(),
            make_mapped: make_mapped::<T>,
            make_ref_field: make_ref_field::<T>,
            make_box_ref_field: make_box_ref_field::<T>,
            make_table_schema: make_table_schema::<T>,
        });
    }

    /// Whether `T` has been registered.
    pub fn is_registered<T: Record>(&self) -> bool {
        let ty = TypeKey::of::<T>();
        self.bindings.borrow().iter().any(|binding| binding.ty == ty)
    }

    /// Registers a record converter factory, consulted before all
    /// previously registered ones.
    pub fn register_record_factory(&self, factory: Arc<dyn RecordConverterFactory>) {
        self.record_factories.borrow_mut().insert(0, factory);
    }

    /// Registers a field converter factory, consulted before all
    /// previously registered ones.
    pub fn register_field_factory(&self, factory: Arc<dyn FieldConverterFactory>) {
        self.field_factories.borrow_mut().insert(0, factory);
    }

    /// The converter for registered record type `T`.
    pub fn record_converter<T: Record>(&self) -> Result<Arc<dyn RecordConverter<T>>> {
        let ty = TypeKey::of::<T>();
        if !self.is_registered::<T>() {
            return Err(Error::UnregisteredType { type_name: ty.name() });
        }
        self.resolve_record::<T>()?
            .downcast::<T>()
            .ok_or(Error::UnsupportedRecordType { type_name: ty.name() })
    }

    fn resolve_record<T: Record>(&self) -> Result<ErasedRecordConverter> {
        let ty = TypeKey::of::<T>();
        if let Some(cached) = self.record_cache.borrow().get(&ty) {
            return Ok(cached.clone());
        }
        if let Some(pending) = self.record_pending.borrow().get(&ty) {
            // Under construction further up the stack: hand out the
            // placeholder so the cycle terminates.
            let placeholder = pending
                .downcast_ref::<Arc<ForwardingRecordConverter<T>>>()
                .ok_or(Error::PendingConverter)?;
            return Ok(ErasedRecordConverter::new::<T>(placeholder.clone()));
        }

        debug!(record = ty.name(), "resolving record converter");
        let placeholder = Arc::new(ForwardingRecordConverter::<T>::new());
        self.record_pending
            .borrow_mut()
            .insert(ty, Box::new(placeholder.clone()));

        // Clone the chain out so factories may register more factories or
        // recurse into the registry while we iterate.
        let factories: Vec<_> = self.record_factories.borrow().clone();
        let mut outcome = Ok(None);
        for factory in &factories {
            match factory.create(self, ty) {
                Ok(Some(converter)) => {
                    outcome = Ok(Some(converter));
                    break;
                }
                Ok(None) => {}
                Err(error) => {
                    outcome = Err(error);
                    break;
                }
            }
        }
        // The in-flight entry is removed on every path, including failure,
        // so a later retry starts clean.
        self.record_pending.borrow_mut().remove(&ty);

        let erased = outcome?.ok_or(Error::UnsupportedRecordType { type_name: ty.name() })?;
        let typed = erased
            .downcast::<T>()
            .ok_or(Error::UnsupportedRecordType { type_name: ty.name() })?;
        placeholder.settle(typed);
        self.record_cache.borrow_mut().insert(ty, erased.clone());
        Ok(erased)
    }

    /// The field converter for field type `ty`.
    pub fn field_converter_for(&self, ty: TypeKey) -> Result<Arc<dyn FieldConverter>> {
        if let Some(cached) = self.field_cache.borrow().get(&ty) {
            return Ok(cached.clone());
        }
        if let Some(pending) = self.field_pending.borrow().get(&ty) {
            return Ok(pending.clone());
        }

        debug!(field_type = ty.name(), "resolving field converter");
        let placeholder = Arc::new(ForwardingFieldConverter::new());
        self.field_pending.borrow_mut().insert(ty, placeholder.clone());

        let factories: Vec<_> = self.field_factories.borrow().clone();
        let mut outcome = Ok(None);
        for factory in &factories {
            match factory.create(self, ty) {
                Ok(Some(converter)) => {
                    outcome = Ok(Some(converter));
                    break;
                }
                Ok(None) => {}
                Err(error) => {
                    outcome = Err(error);
                    break;
                }
            }
        }
        self.field_pending.borrow_mut().remove(&ty);

        match outcome? {
            Some(converter) => {
                placeholder.settle(converter.clone());
                self.field_cache.borrow_mut().insert(ty, converter.clone());
                Ok(converter)
            }
            None => Err(Error::UnsupportedFieldType { type_name: ty.name() }),
        }
    }

    /// The typed field converter for field type `F`, resolved through the
    /// same chain as record fields.
    pub fn field_converter<F: Any>(&self) -> Result<Arc<dyn FieldConverter>> {
        self.field_converter_for(TypeKey::of::<F>())
    }

    /// Resolves a record converter consulting only the factories registered
    /// before `skip_past`. Lets a wrapping factory obtain the converter it
    /// decorates.
    pub fn record_converter_after(
        &self,
        skip_past: &Arc<dyn RecordConverterFactory>,
        ty: TypeKey,
    ) -> Result<ErasedRecordConverter> {
        let factories: Vec<_> = self.record_factories.borrow().clone();
        let mut skipping = true;
        for factory in &factories {
            if skipping {
                if Arc::ptr_eq(factory, skip_past) {
                    skipping = false;
                }
                continue;
            }
            if let Some(converter) = factory.create(self, ty)? {
                return Ok(converter);
            }
        }
        Err(Error::UnsupportedRecordType { type_name: ty.name() })
    }

    /// Field-side counterpart of [`record_converter_after`](Self::record_converter_after).
    pub fn field_converter_after(
        &self,
        skip_past: &Arc<dyn FieldConverterFactory>,
        ty: TypeKey,
    ) -> Result<Arc<dyn FieldConverter>> {
        let factories: Vec<_> = self.field_factories.borrow().clone();
        let mut skipping = true;
        for factory in &factories {
            if skipping {
                if Arc::ptr_eq(factory, skip_past) {
                    skipping = false;
                }
                continue;
            }
            if let Some(converter) = factory.create(self, ty)? {
                return Ok(converter);
            }
        }
        Err(Error::UnsupportedFieldType { type_name: ty.name() })
    }

    /// The desired table schema for every registered record type, in
    /// registration order.
    pub fn table_schemas(&self) -> Result<Vec<TableSchema>> {
        let makers: Vec<_> = self
            .bindings
            .borrow()
            .iter()
            .map(|binding| binding.make_table_schema)
            .collect();
        makers.into_iter().map(|make| make(self)).collect()
    }

    /// The desired table schema for `T`.
    pub fn table_schema<T: Record>(&self) -> Result<TableSchema> {
        let converter = self.record_converter::<T>()?;
        TableSchema::for_converter(converter.as_ref())
    }

    /// Builds a mapped converter for `ty` if it is a registered type.
    /// Serves [`MappedRecordFactory`].
    fn mapped_record_converter(&self, ty: TypeKey) -> Result<Option<ErasedRecordConverter>> {
        let maker = self
            .bindings
            .borrow()
            .iter()
            .find(|binding| binding.ty == ty)
            .map(|binding| binding.make_mapped);
        match maker {
            Some(make) => make(self).map(Some),
            None => Ok(None),
        }
    }

    /// Builds a record-reference field converter when `ty` is a registered
    /// record type or a `Box` of one. Serves
    /// [`RecordFieldConverterFactory`].
    pub(crate) fn record_ref_field_converter(
        &self,
        ty: TypeKey,
    ) -> Result<Option<Arc<dyn FieldConverter>>> {
        let maker = self.bindings.borrow().iter().find_map(|binding| {
            if binding.ty == ty {
                Some(binding.make_ref_field)
            } else if binding.box_ty == ty {
                Some(binding.make_box_ref_field)
            } else {
                None
            }
        });
        match maker {
            Some(make) => make(self).map(Some),
            None => Ok(None),
        }
    }
}
