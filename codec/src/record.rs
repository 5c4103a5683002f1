//! Field-registered types.
//!
//! A record declares its field schema through [`Fields`] (usually derived
//! with `#[derive(Fields)]`) and a post-decode hook through [`Record`].
//! The codec writes the non-excluded fields as a text-keyed mapping and
//! rebuilds the object in two phases: a structural build from the mapping,
//! then [`Record::finalize`] to recompute excluded and derived state.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;

use crate::bridge;
use crate::error::{DecodeError, EncodeError, ValueMismatch};
use crate::resource::Resources;
use crate::value::{Value, ValueMap, ValueSet};

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Explicit field schema of a record type.
///
/// `FIELDS` lists every declared field in declaration order. `TRANSIENT`
/// lists the fields that have no wire form (back-edges, resolved handles);
/// registration requires them to be excluded.
pub trait Fields: Sized {
    const FIELDS: &'static [&'static str];
    const TRANSIENT: &'static [&'static str] = &[];

    /// Write every field through `writer`. Excluded fields are skipped by
    /// the writer, so implementations may write them unconditionally.
    fn write_fields(&self, writer: &mut FieldWriter<'_>) -> Result<(), EncodeError>;

    /// Build a structurally bare instance from decoded fields. No
    /// constructor logic runs here; that belongs in [`Record::finalize`].
    fn read_fields(reader: &mut FieldReader<'_>) -> Result<Self, DecodeError>;
}

/// A type that can be registered with
/// [`RegistryBuilder::register_record`](crate::RegistryBuilder::register_record).
pub trait Record: Fields + Clone + PartialEq + Debug + Send + Sync + 'static {
    /// Recompute state the mapping did not carry. Runs once per decoded
    /// object, right after [`Fields::read_fields`].
    fn finalize(&mut self, ctx: &FinalizeContext<'_>) -> Result<(), DecodeError>;
}

/// What a finalize hook can see besides the object itself.
pub struct FinalizeContext<'a> {
    name: &'a str,
    resources: &'a Resources,
}

impl<'a> FinalizeContext<'a> {
    pub fn new(name: &'a str, resources: &'a Resources) -> Self {
        Self { name, resources }
    }

    /// Registered name of the record being finalized.
    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn resource<R: 'static>(&self) -> Option<&'a R> {
        self.resources.get::<R>()
    }

    /// Build a [`DecodeError::Finalize`] for this record.
    pub fn error(&self, message: impl std::fmt::Display) -> DecodeError {
        DecodeError::Finalize {
            type_name: self.name.to_owned(),
            message: message.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// FieldWriter
// ---------------------------------------------------------------------------

/// Collects the field values of one record during encode.
pub struct FieldWriter<'a> {
    record: &'a str,
    declared: &'static [&'static str],
    excluded: &'a [&'static str],
    entries: Vec<(&'static str, Value)>,
}

impl<'a> FieldWriter<'a> {
    pub fn new(
        record: &'a str,
        declared: &'static [&'static str],
        excluded: &'a [&'static str],
    ) -> Self {
        Self {
            record,
            declared,
            excluded,
            entries: Vec::with_capacity(declared.len()),
        }
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded.iter().any(|e| *e == name)
    }

    /// Write a field through its [`FieldValue`] conversion.
    pub fn write<T: FieldValue + ?Sized>(
        &mut self,
        name: &'static str,
        value: &T,
    ) -> Result<(), EncodeError> {
        if self.accept(name)? {
            let value = value.to_value()?;
            self.entries.push((name, value));
        }
        Ok(())
    }

    /// Write a field whose value is already a [`Value`].
    pub fn write_value(&mut self, name: &'static str, value: Value) -> Result<(), EncodeError> {
        if self.accept(name)? {
            self.entries.push((name, value));
        }
        Ok(())
    }

    /// Write a field through its serde implementation.
    pub fn write_serde<T: serde::Serialize + ?Sized>(
        &mut self,
        name: &'static str,
        value: &T,
    ) -> Result<(), EncodeError> {
        if self.accept(name)? {
            let value = bridge::to_value(value).map_err(|e| {
                EncodeError::custom(format!("field '{name}' of '{}': {e}", self.record))
            })?;
            self.entries.push((name, value));
        }
        Ok(())
    }

    /// Check a field name. Returns `false` for excluded fields, which are
    /// never converted.
    fn accept(&self, name: &'static str) -> Result<bool, EncodeError> {
        if !self.declared.contains(&name) {
            return Err(EncodeError::UndeclaredField {
                record: self.record.to_owned(),
                field: name.to_owned(),
            });
        }
        if self.is_excluded(name) {
            return Ok(false);
        }
        if self.entries.iter().any(|(n, _)| *n == name) {
            return Err(EncodeError::DuplicateField {
                record: self.record.to_owned(),
                field: name.to_owned(),
            });
        }
        Ok(true)
    }

    /// Check that every non-excluded field was written and return the
    /// entries in declaration order.
    pub fn finish(mut self) -> Result<Vec<(&'static str, Value)>, EncodeError> {
        for field in self.declared {
            if self.is_excluded(field) {
                continue;
            }
            if !self.entries.iter().any(|(n, _)| n == field) {
                return Err(EncodeError::MissingField {
                    record: self.record.to_owned(),
                    field: (*field).to_owned(),
                });
            }
        }
        let declared = self.declared;
        self.entries
            .sort_by_key(|(n, _)| declared.iter().position(|d| d == n));
        Ok(self.entries)
    }
}

// ---------------------------------------------------------------------------
// FieldReader
// ---------------------------------------------------------------------------

/// Hands decoded field values to [`Fields::read_fields`].
///
/// Field names have already been checked against the declared list.
pub struct FieldReader<'a> {
    record: &'a str,
    fields: Vec<(String, Value)>,
    excluded: &'a [&'static str],
}

impl<'a> FieldReader<'a> {
    pub fn new(record: &'a str, fields: Vec<(String, Value)>, excluded: &'a [&'static str]) -> Self {
        Self {
            record,
            fields,
            excluded,
        }
    }

    /// Registered name of the record being read.
    pub fn record(&self) -> &'a str {
        self.record
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded.iter().any(|e| *e == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }

    fn take(&mut self, name: &str) -> Option<Value> {
        let index = self.fields.iter().position(|(n, _)| n == name)?;
        Some(self.fields.swap_remove(index).1)
    }

    fn missing(&self, name: &str) -> DecodeError {
        DecodeError::MissingField {
            record: self.record.to_owned(),
            field: name.to_owned(),
        }
    }

    /// Read a field through its [`FieldValue`] conversion. An absent
    /// excluded field takes its default.
    pub fn read<T: FieldValue + Default>(&mut self, name: &str) -> Result<T, DecodeError> {
        match self.take(name) {
            Some(value) => T::from_value(value).map_err(|m| DecodeError::FieldType {
                record: self.record.to_owned(),
                field: name.to_owned(),
                expected: m.expected,
                found: m.found,
            }),
            None if self.is_excluded(name) => Ok(T::default()),
            None => Err(self.missing(name)),
        }
    }

    /// Read a field as a raw [`Value`]. An absent excluded field is null.
    pub fn read_value(&mut self, name: &str) -> Result<Value, DecodeError> {
        self.read::<Value>(name)
    }

    /// Read a field through its serde implementation.
    pub fn read_serde<T: serde::de::DeserializeOwned + Default>(
        &mut self,
        name: &str,
    ) -> Result<T, DecodeError> {
        match self.take(name) {
            Some(value) => {
                let found = value.kind();
                bridge::from_value(value).map_err(|e| DecodeError::FieldType {
                    record: self.record.to_owned(),
                    field: name.to_owned(),
                    expected: std::any::type_name::<T>(),
                    found: format!("{found} ({e})"),
                })
            }
            None if self.is_excluded(name) => Ok(T::default()),
            None => Err(self.missing(name)),
        }
    }
}

// ---------------------------------------------------------------------------
// FieldValue
// ---------------------------------------------------------------------------

/// Conversion between a field's Rust type and its [`Value`] form.
pub trait FieldValue {
    fn to_value(&self) -> Result<Value, EncodeError>;
    fn from_value(value: Value) -> Result<Self, ValueMismatch>
    where
        Self: Sized;
}

fn mismatch(expected: &'static str, found: &Value) -> ValueMismatch {
    ValueMismatch::new(expected, found.kind())
}

impl FieldValue for Value {
    fn to_value(&self) -> Result<Value, EncodeError> {
        Ok(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ValueMismatch> {
        Ok(value)
    }
}

impl FieldValue for bool {
    fn to_value(&self) -> Result<Value, EncodeError> {
        Ok(Value::Bool(*self))
    }

    fn from_value(value: Value) -> Result<Self, ValueMismatch> {
        value.as_bool().ok_or_else(|| mismatch("bool", &value))
    }
}

macro_rules! impl_int_field_value {
    ($($ty:ty),*) => {$(
        impl FieldValue for $ty {
            fn to_value(&self) -> Result<Value, EncodeError> {
                i64::try_from(*self)
                    .map(Value::Int)
                    .map_err(|_| EncodeError::IntegerOutOfRange { value: *self as i128 })
            }

            fn from_value(value: Value) -> Result<Self, ValueMismatch> {
                match value {
                    Value::Int(v) => <$ty>::try_from(v).map_err(|_| {
                        ValueMismatch::new(stringify!($ty), format!("integer {v}"))
                    }),
                    other => Err(mismatch(stringify!($ty), &other)),
                }
            }
        }
    )*};
}

impl_int_field_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl FieldValue for f32 {
    fn to_value(&self) -> Result<Value, EncodeError> {
        Ok(Value::Float(*self))
    }

    fn from_value(value: Value) -> Result<Self, ValueMismatch> {
        value.as_float().ok_or_else(|| mismatch("float", &value))
    }
}

impl FieldValue for String {
    fn to_value(&self) -> Result<Value, EncodeError> {
        Ok(Value::Text(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self, ValueMismatch> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl FieldValue for ValueMap {
    fn to_value(&self) -> Result<Value, EncodeError> {
        Ok(Value::Map(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self, ValueMismatch> {
        match value {
            Value::Map(map) => Ok(map),
            other => Err(mismatch("map", &other)),
        }
    }
}

impl FieldValue for ValueSet {
    fn to_value(&self) -> Result<Value, EncodeError> {
        Ok(Value::Set(self.clone()))
    }

    fn from_value(value: Value) -> Result<Self, ValueMismatch> {
        match value {
            Value::Set(set) => Ok(set),
            other => Err(mismatch("set", &other)),
        }
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn to_value(&self) -> Result<Value, EncodeError> {
        match self {
            Some(v) => v.to_value(),
            None => Ok(Value::Null),
        }
    }

    fn from_value(value: Value) -> Result<Self, ValueMismatch> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn to_value(&self) -> Result<Value, EncodeError> {
        self.iter()
            .map(FieldValue::to_value)
            .collect::<Result<_, _>>()
            .map(Value::List)
    }

    fn from_value(value: Value) -> Result<Self, ValueMismatch> {
        match value {
            Value::List(items) | Value::Tuple(items) => {
                items.into_iter().map(T::from_value).collect()
            }
            other => Err(mismatch("list", &other)),
        }
    }
}

fn set_to_value<'a, T: FieldValue + 'a>(
    items: impl Iterator<Item = &'a T>,
) -> Result<Value, EncodeError> {
    let mut set = ValueSet::new();
    for item in items {
        set.insert(item.to_value()?);
    }
    Ok(Value::Set(set))
}

fn set_from_value<T: FieldValue, C: FromIterator<T>>(value: Value) -> Result<C, ValueMismatch> {
    match value {
        Value::Set(set) => set.into_iter().map(T::from_value).collect(),
        other => Err(mismatch("set", &other)),
    }
}

impl<T: FieldValue + Eq + Hash> FieldValue for HashSet<T> {
    fn to_value(&self) -> Result<Value, EncodeError> {
        set_to_value(self.iter())
    }

    fn from_value(value: Value) -> Result<Self, ValueMismatch> {
        set_from_value(value)
    }
}

impl<T: FieldValue + Ord> FieldValue for BTreeSet<T> {
    fn to_value(&self) -> Result<Value, EncodeError> {
        set_to_value(self.iter())
    }

    fn from_value(value: Value) -> Result<Self, ValueMismatch> {
        set_from_value(value)
    }
}

fn map_to_value<'a, K: FieldValue + 'a, V: FieldValue + 'a>(
    entries: impl Iterator<Item = (&'a K, &'a V)>,
) -> Result<Value, EncodeError> {
    let mut map = ValueMap::new();
    for (k, v) in entries {
        map.insert(k.to_value()?, v.to_value()?);
    }
    Ok(Value::Map(map))
}

fn map_from_value<K: FieldValue, V: FieldValue, C: FromIterator<(K, V)>>(
    value: Value,
) -> Result<C, ValueMismatch> {
    match value {
        Value::Map(map) => map
            .into_iter()
            .map(|(k, v)| -> Result<(K, V), ValueMismatch> {
                Ok((K::from_value(k)?, V::from_value(v)?))
            })
            .collect(),
        other => Err(mismatch("map", &other)),
    }
}

impl<K: FieldValue + Eq + Hash, V: FieldValue> FieldValue for HashMap<K, V> {
    fn to_value(&self) -> Result<Value, EncodeError> {
        map_to_value(self.iter())
    }

    fn from_value(value: Value) -> Result<Self, ValueMismatch> {
        map_from_value(value)
    }
}

impl<K: FieldValue + Ord, V: FieldValue> FieldValue for BTreeMap<K, V> {
    fn to_value(&self) -> Result<Value, EncodeError> {
        map_to_value(self.iter())
    }

    fn from_value(value: Value) -> Result<Self, ValueMismatch> {
        map_from_value(value)
    }
}

macro_rules! impl_tuple_field_value {
    ($len:literal => $($name:ident),+) => {
        impl<$($name: FieldValue),+> FieldValue for ($($name,)+) {
            #[allow(non_snake_case)]
            fn to_value(&self) -> Result<Value, EncodeError> {
                let ($($name,)+) = self;
                Ok(Value::Tuple(vec![$($name.to_value()?),+]))
            }

            #[allow(non_snake_case)]
            fn from_value(value: Value) -> Result<Self, ValueMismatch> {
                match value {
                    Value::Tuple(items) | Value::List(items) if items.len() == $len => {
                        let mut items = items.into_iter();
                        $(
                            let $name = match items.next() {
                                Some(item) => $name::from_value(item)?,
                                None => return Err(ValueMismatch::new("tuple", "short tuple")),
                            };
                        )+
                        Ok(($($name,)+))
                    }
                    other => Err(ValueMismatch::new(
                        concat!("tuple of ", $len),
                        other.kind(),
                    )),
                }
            }
        }
    };
}

impl_tuple_field_value!(2 => A, B);
impl_tuple_field_value!(3 => A, B, C);
impl_tuple_field_value!(4 => A, B, C, D);

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const DECLARED: &[&str] = &["name", "hp", "owner"];

    #[test]
    fn writer_skips_excluded_and_orders_by_declaration() {
        let mut writer = FieldWriter::new("Unit", DECLARED, &["owner"]);
        writer.write("hp", &10u32).unwrap();
        writer.write("owner", &"ignored".to_owned()).unwrap();
        writer.write("name", &"knight".to_owned()).unwrap();
        let entries = writer.finish().unwrap();
        let names: Vec<_> = entries.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, ["name", "hp"]);
    }

    #[test]
    fn writer_rejects_undeclared_and_duplicate() {
        let mut writer = FieldWriter::new("Unit", DECLARED, &[]);
        assert!(matches!(
            writer.write("speed", &1u8),
            Err(EncodeError::UndeclaredField { .. })
        ));
        writer.write("hp", &1u8).unwrap();
        assert!(matches!(
            writer.write("hp", &2u8),
            Err(EncodeError::DuplicateField { .. })
        ));
    }

    #[test]
    fn writer_reports_missing() {
        let mut writer = FieldWriter::new("Unit", DECLARED, &["owner"]);
        writer.write("name", &"x".to_owned()).unwrap();
        assert!(matches!(
            writer.finish(),
            Err(EncodeError::MissingField { field, .. }) if field == "hp"
        ));
    }

    #[test]
    fn reader_defaults_only_excluded() {
        let fields = vec![("name".to_owned(), Value::from("knight"))];
        let mut reader = FieldReader::new("Unit", fields, &["owner"]);
        assert_eq!(reader.read::<String>("name").unwrap(), "knight");
        assert_eq!(reader.read::<String>("owner").unwrap(), "");
        assert!(matches!(
            reader.read::<u32>("hp"),
            Err(DecodeError::MissingField { .. })
        ));
    }

    #[test]
    fn reader_reports_field_type() {
        let fields = vec![("hp".to_owned(), Value::from("lots"))];
        let mut reader = FieldReader::new("Unit", fields, &[]);
        assert!(matches!(
            reader.read::<u32>("hp"),
            Err(DecodeError::FieldType { expected: "u32", .. })
        ));
    }

    #[rstest]
    #[case(Value::Int(300), false)]
    #[case(Value::Int(-1), false)]
    #[case(Value::Int(255), true)]
    fn integer_range(#[case] value: Value, #[case] fits: bool) {
        assert_eq!(u8::from_value(value).is_ok(), fits);
    }

    #[test]
    fn collections() {
        let map: BTreeMap<String, Vec<u8>> =
            [("a".to_owned(), vec![1, 2])].into_iter().collect();
        let value = map.to_value().unwrap();
        assert_eq!(BTreeMap::<String, Vec<u8>>::from_value(value).unwrap(), map);

        let set: HashSet<i32> = [-1, 2].into_iter().collect();
        let value = set.to_value().unwrap();
        assert_eq!(value.as_set().map(ValueSet::len), Some(2));
        assert_eq!(HashSet::<i32>::from_value(value).unwrap(), set);

        let pair = (1u8, "x".to_owned());
        let value = pair.to_value().unwrap();
        assert!(matches!(value, Value::Tuple(_)));
        assert_eq!(<(u8, String)>::from_value(value).unwrap(), pair);

        assert_eq!(Option::<u8>::from_value(Value::Null).unwrap(), None);
    }

    #[test]
    fn u64_above_i64_rejected() {
        assert!(matches!(
            u64::MAX.to_value(),
            Err(EncodeError::IntegerOutOfRange { .. })
        ));
    }
}
