//! Type registries.
//!
//! A [`TypeRegistry`] holds both extension tables: field-registered
//! [`Record`] types and user-registered [`Packed`] types. It is assembled
//! once by a [`RegistryBuilder`] and is immutable afterwards, so it can be
//! shared freely between threads.
//!
//! Encode looks entries up by [`TypeId`]; decode looks them up by the
//! registered name found in the buffer. Names are unique within each
//! table, and a Rust type may be registered only once overall.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;

use crate::config::CodecConfig;
use crate::decode::Decoder;
use crate::encode::Encoder;
use crate::error::{DecodeError, EncodeError, RegistrationError, RegistryKind};
use crate::packed::Packed;
use crate::record::{FieldReader, FieldWriter, FinalizeContext, Record};
use crate::resource::Resources;
use crate::value::{AnyObject, Value};

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// Type-erased codec operations for a single record type.
pub(crate) struct RecordEntry {
    pub name: String,
    pub type_name: &'static str,
    pub fields: &'static [&'static str],
    pub excluded: Vec<&'static str>,
    /// Feed the object's fields to the writer.
    pub encode: fn(&dyn Any, &mut FieldWriter<'_>) -> Result<(), EncodeError>,
    /// Structural build followed by finalize.
    pub decode: fn(&mut FieldReader<'_>, &FinalizeContext<'_>) -> Result<AnyObject, DecodeError>,
}

/// Type-erased codec operations for a single packed type.
pub(crate) struct PackedEntry {
    pub name: String,
    pub type_name: &'static str,
    pub dump: fn(&dyn Any, &mut Encoder<'_>) -> Result<(), EncodeError>,
    pub load: fn(&mut Decoder<'_, '_>) -> Result<AnyObject, DecodeError>,
}

/// Name and type index of one table.
struct Table<E> {
    entries: Vec<E>,
    by_name: HashMap<String, usize>,
    by_type: HashMap<TypeId, usize>,
}

impl<E> Default for Table<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            by_name: HashMap::new(),
            by_type: HashMap::new(),
        }
    }
}

impl<E> Table<E> {
    fn insert(&mut self, name: String, type_id: TypeId, entry: E) {
        let index = self.entries.len();
        self.entries.push(entry);
        self.by_name.insert(name, index);
        self.by_type.insert(type_id, index);
    }

    fn by_name(&self, name: &str) -> Option<&E> {
        self.by_name.get(name).map(|&i| &self.entries[i])
    }

    fn by_type(&self, type_id: TypeId) -> Option<&E> {
        self.by_type.get(&type_id).map(|&i| &self.entries[i])
    }
}

// ---------------------------------------------------------------------------
// RegistryBuilder
// ---------------------------------------------------------------------------

/// Collects registrations, resources and configuration for a
/// [`TypeRegistry`].
///
/// # Example
///
/// ```
/// use tilepack_codec::{Fields, Record, FinalizeContext, DecodeError, RegistryBuilder, Value};
///
/// #[derive(Fields, Clone, Debug, PartialEq, Default)]
/// struct Door {
///     locked: bool,
///     key: String,
/// }
///
/// impl Record for Door {
///     fn finalize(&mut self, _ctx: &FinalizeContext<'_>) -> Result<(), DecodeError> {
///         Ok(())
///     }
/// }
///
/// let mut builder = RegistryBuilder::new();
/// builder.register_record::<Door>("Door", &[]).unwrap();
/// let registry = builder.build();
///
/// let door = Door { locked: true, key: "brass".into() };
/// let bytes = registry.serialize(&Value::record(door.clone())).unwrap();
/// let (value, end) = registry.deserialize(&bytes, 0).unwrap();
/// assert_eq!(end, bytes.len());
/// assert_eq!(value.downcast_ref::<Door>(), Some(&door));
/// ```
#[derive(Default)]
pub struct RegistryBuilder {
    records: Table<RecordEntry>,
    packed: Table<PackedEntry>,
    resources: Resources,
    config: CodecConfig,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a field-registered type under `name`, leaving the `excluded`
    /// fields off the wire.
    ///
    /// # Errors
    ///
    /// Fails if the name is empty or taken, if `T` is already registered,
    /// if an excluded name is not a declared field, or if a transient field
    /// is not excluded.
    pub fn register_record<T: Record>(
        &mut self,
        name: impl Into<String>,
        excluded: &[&'static str],
    ) -> Result<&mut Self, RegistrationError> {
        let name = name.into();
        self.check_new::<T>(RegistryKind::Record, &name)?;

        if let Some(field) = excluded.iter().find(|f| !T::FIELDS.contains(f)) {
            return Err(RegistrationError::UnknownExcludedField {
                name,
                field: (*field).to_owned(),
            });
        }
        if let Some(field) = T::TRANSIENT.iter().find(|f| !excluded.contains(f)) {
            return Err(RegistrationError::TransientFieldNotExcluded {
                name,
                field: (*field).to_owned(),
            });
        }

        log::debug!(
            "Registered record \"{name}\" ({}), {} of {} fields on the wire",
            type_name::<T>(),
            T::FIELDS.len().saturating_sub(excluded.len()),
            T::FIELDS.len()
        );
        let entry = RecordEntry {
            name: name.clone(),
            type_name: type_name::<T>(),
            fields: T::FIELDS,
            excluded: excluded.to_vec(),
            encode: |object, writer| match object.downcast_ref::<T>() {
                Some(object) => object.write_fields(writer),
                None => Err(EncodeError::UnsupportedValueType {
                    type_name: type_name::<T>(),
                }),
            },
            decode: |reader, ctx| {
                let mut object = T::read_fields(reader)?;
                object.finalize(ctx)?;
                Ok(AnyObject::new(object))
            },
        };
        self.records.insert(name, TypeId::of::<T>(), entry);
        Ok(self)
    }

    /// Register a user-registered type under `name`.
    ///
    /// # Errors
    ///
    /// Fails if the name is empty or taken, or if `T` is already registered.
    pub fn register_packed<T: Packed>(
        &mut self,
        name: impl Into<String>,
    ) -> Result<&mut Self, RegistrationError> {
        let name = name.into();
        self.check_new::<T>(RegistryKind::Packed, &name)?;

        log::debug!("Registered packed type \"{name}\" ({})", type_name::<T>());
        let entry = PackedEntry {
            name: name.clone(),
            type_name: type_name::<T>(),
            dump: |object, encoder| match object.downcast_ref::<T>() {
                Some(object) => object.dump(encoder),
                None => Err(EncodeError::UnsupportedValueType {
                    type_name: type_name::<T>(),
                }),
            },
            load: |decoder| T::load(decoder).map(AnyObject::new),
        };
        self.packed.insert(name, TypeId::of::<T>(), entry);
        Ok(self)
    }

    /// Make a resource available to `load` and `finalize` hooks.
    pub fn insert_resource<R: Send + Sync + 'static>(&mut self, resource: R) -> &mut Self {
        self.resources.insert(resource);
        self
    }

    pub fn with_config(&mut self, config: CodecConfig) -> &mut Self {
        self.config = config;
        self
    }

    pub fn build(self) -> TypeRegistry {
        TypeRegistry {
            records: self.records,
            packed: self.packed,
            resources: self.resources,
            config: self.config,
        }
    }

    fn check_new<T: 'static>(&self, kind: RegistryKind, name: &str) -> Result<(), RegistrationError> {
        if name.is_empty() {
            return Err(RegistrationError::EmptyName {
                type_name: type_name::<T>(),
            });
        }
        let type_id = TypeId::of::<T>();
        if self.records.by_type.contains_key(&type_id) || self.packed.by_type.contains_key(&type_id)
        {
            return Err(RegistrationError::DuplicateType {
                type_name: type_name::<T>(),
            });
        }
        let taken = match kind {
            RegistryKind::Record => self.records.by_name.contains_key(name),
            RegistryKind::Packed => self.packed.by_name.contains_key(name),
        };
        if taken {
            return Err(RegistrationError::DuplicateName {
                registry: kind,
                name: name.to_owned(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TypeRegistry
// ---------------------------------------------------------------------------

/// Immutable set of registered types, plus the resources and configuration
/// the codec runs with.
pub struct TypeRegistry {
    records: Table<RecordEntry>,
    packed: Table<PackedEntry>,
    resources: Resources,
    config: CodecConfig,
}

impl Default for TypeRegistry {
    /// An empty registry. Plain data encodes and decodes; registered
    /// objects fail with `UnsupportedValueType` / `UnknownTypeName`.
    fn default() -> Self {
        RegistryBuilder::new().build()
    }
}

impl TypeRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Encode one value into a fresh buffer.
    pub fn serialize(&self, value: &Value) -> Result<Vec<u8>, EncodeError> {
        let mut encoder = Encoder::new(self);
        encoder.write(value)?;
        Ok(encoder.into_bytes())
    }

    /// Decode one value starting at `offset`, returning it together with
    /// the offset just past it.
    pub fn deserialize(&self, data: &[u8], offset: usize) -> Result<(Value, usize), DecodeError> {
        let mut decoder = Decoder::new(self, data, offset);
        let value = decoder.read()?;
        Ok((value, decoder.position()))
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn resource<R: 'static>(&self) -> Option<&R> {
        self.resources.get::<R>()
    }

    /// Whether `T` is registered in either table.
    pub fn is_registered<T: 'static>(&self) -> bool {
        let type_id = TypeId::of::<T>();
        self.records.by_type.contains_key(&type_id) || self.packed.by_type.contains_key(&type_id)
    }

    /// Registered name of `T`, if any.
    pub fn name_of<T: 'static>(&self) -> Option<&str> {
        let type_id = TypeId::of::<T>();
        self.records
            .by_type(type_id)
            .map(|e| e.name.as_str())
            .or_else(|| self.packed.by_type(type_id).map(|e| e.name.as_str()))
    }

    /// Registered record names with their Rust type names.
    pub fn record_names(&self) -> impl Iterator<Item = (&str, &'static str)> {
        self.records
            .entries
            .iter()
            .map(|e| (e.name.as_str(), e.type_name))
    }

    /// Registered packed names with their Rust type names.
    pub fn packed_names(&self) -> impl Iterator<Item = (&str, &'static str)> {
        self.packed
            .entries
            .iter()
            .map(|e| (e.name.as_str(), e.type_name))
    }

    pub(crate) fn record_by_type(&self, type_id: TypeId) -> Option<&RecordEntry> {
        self.records.by_type(type_id)
    }

    pub(crate) fn record_by_name(&self, name: &str) -> Option<&RecordEntry> {
        self.records.by_name(name)
    }

    pub(crate) fn packed_by_type(&self, type_id: TypeId) -> Option<&PackedEntry> {
        self.packed.by_type(type_id)
    }

    pub(crate) fn packed_by_name(&self, name: &str) -> Option<&PackedEntry> {
        self.packed.by_name(name)
    }
}

impl std::fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("records", &self.records.by_name.keys().collect::<Vec<_>>())
            .field("packed", &self.packed.by_name.keys().collect::<Vec<_>>())
            .field("resources", &self.resources)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FieldReader, FieldWriter, Fields};

    #[derive(Clone, Debug, PartialEq, Default)]
    struct Node {
        label: String,
        parent: Option<u32>,
    }

    impl Fields for Node {
        const FIELDS: &'static [&'static str] = &["label", "parent"];
        const TRANSIENT: &'static [&'static str] = &["parent"];

        fn write_fields(&self, writer: &mut FieldWriter<'_>) -> Result<(), EncodeError> {
            writer.write("label", &self.label)
        }

        fn read_fields(reader: &mut FieldReader<'_>) -> Result<Self, DecodeError> {
            Ok(Self {
                label: reader.read("label")?,
                parent: None,
            })
        }
    }

    impl Record for Node {
        fn finalize(&mut self, _ctx: &FinalizeContext<'_>) -> Result<(), DecodeError> {
            Ok(())
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    struct Blob(Vec<u8>);

    impl Packed for Blob {
        fn dump(&self, encoder: &mut Encoder<'_>) -> Result<(), EncodeError> {
            encoder.write_raw(&self.0);
            Ok(())
        }

        fn load(decoder: &mut Decoder<'_, '_>) -> Result<Self, DecodeError> {
            let len = decoder.remaining();
            Ok(Blob(decoder.read_raw(len)?.to_vec()))
        }
    }

    #[test]
    fn registry_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TypeRegistry>();
    }

    #[test]
    fn transient_must_be_excluded() {
        let mut builder = RegistryBuilder::new();
        assert_eq!(
            builder.register_record::<Node>("Node", &[]).err(),
            Some(RegistrationError::TransientFieldNotExcluded {
                name: "Node".into(),
                field: "parent".into(),
            })
        );
        assert!(builder.register_record::<Node>("Node", &["parent"]).is_ok());
    }

    #[test]
    fn excluded_must_be_declared() {
        let mut builder = RegistryBuilder::new();
        assert!(matches!(
            builder.register_record::<Node>("Node", &["parent", "color"]),
            Err(RegistrationError::UnknownExcludedField { .. })
        ));
    }

    #[test]
    fn duplicates_rejected() {
        let mut builder = RegistryBuilder::new();
        builder.register_record::<Node>("Node", &["parent"]).unwrap();
        assert!(matches!(
            builder.register_record::<Node>("Other", &["parent"]),
            Err(RegistrationError::DuplicateType { .. })
        ));
        assert!(matches!(
            builder.register_packed::<Blob>("Node"),
            Ok(_)
        ));
    }

    #[test]
    fn duplicate_name_in_same_table() {
        #[derive(Clone, Debug, PartialEq)]
        struct Other;

        impl Packed for Other {
            fn dump(&self, _encoder: &mut Encoder<'_>) -> Result<(), EncodeError> {
                Ok(())
            }

            fn load(_decoder: &mut Decoder<'_, '_>) -> Result<Self, DecodeError> {
                Ok(Other)
            }
        }

        let mut builder = RegistryBuilder::new();
        builder.register_packed::<Blob>("Blob").unwrap();
        assert_eq!(
            builder.register_packed::<Other>("Blob").err(),
            Some(RegistrationError::DuplicateName {
                registry: RegistryKind::Packed,
                name: "Blob".into(),
            })
        );
        assert_eq!(
            builder.register_packed::<Other>("").err(),
            Some(RegistrationError::EmptyName {
                type_name: type_name::<Other>(),
            })
        );
    }

    #[test]
    fn lookups() {
        let mut builder = RegistryBuilder::new();
        builder
            .register_record::<Node>("Node", &["parent"])
            .unwrap()
            .register_packed::<Blob>("Blob")
            .unwrap();
        let registry = builder.build();

        assert!(registry.is_registered::<Node>());
        assert!(!registry.is_registered::<String>());
        assert_eq!(registry.name_of::<Blob>(), Some("Blob"));
        assert_eq!(registry.record_names().count(), 1);
        assert_eq!(registry.packed_names().count(), 1);
    }

    #[test]
    fn packed_layout() {
        let mut builder = RegistryBuilder::new();
        builder.register_packed::<Blob>("B").unwrap();
        let registry = builder.build();

        let bytes = registry.serialize(&Value::packed(Blob(vec![9, 8]))).unwrap();
        assert_eq!(bytes, b"UsI\x01BI\x02\x09\x08");
    }

    #[test]
    fn record_layout() {
        let mut builder = RegistryBuilder::new();
        builder.register_record::<Node>("N", &["parent"]).unwrap();
        let registry = builder.build();

        let node = Node {
            label: "a".into(),
            parent: Some(3),
        };
        let bytes = registry.serialize(&Value::record(node)).unwrap();
        assert_eq!(bytes, b"OsI\x01NDI\x01sI\x05labelsI\x01a");

        let (value, _) = registry.deserialize(&bytes, 0).unwrap();
        assert_eq!(
            value.downcast_ref::<Node>(),
            Some(&Node {
                label: "a".into(),
                parent: None,
            })
        );
    }
}
