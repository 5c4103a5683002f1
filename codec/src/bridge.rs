//! Conversion between arbitrary serde types and [`Value`].
//!
//! Use [`to_value`] and [`from_value`] for plain data that has a serde
//! implementation but no registry entry of its own. Structs become maps
//! keyed by field name, sequences become lists and tuples become tuples.
//! `f64` is narrowed to the wire's single-precision float.

use std::fmt;

use serde::de::{self, DeserializeSeed, MapAccess, SeqAccess, Visitor};
use serde::Serialize;

use crate::error::{DecodeError, EncodeError};
use crate::value::{Value, ValueMap};

/// Whether `narrow` reads back as `wide`. `NaN` narrows to `NaN`.
fn narrows_exactly(wide: f64, narrow: f32) -> bool {
    f64::from(narrow) == wide || (wide.is_nan() && narrow.is_nan())
}

// ---------------------------------------------------------------------------
// to_value: T -> Value  (via custom serde::Serializer)
// ---------------------------------------------------------------------------

/// Convert any `T: Serialize` into a [`Value`].
pub fn to_value<T: ?Sized + Serialize>(value: &T) -> Result<Value, EncodeError> {
    value
        .serialize(ValueSerializer)
        .map_err(|e| EncodeError::Custom(e.0))
}

/// Convert a [`Value`] back into any `T: DeserializeOwned`.
pub fn from_value<T: de::DeserializeOwned>(value: Value) -> Result<T, DecodeError> {
    T::deserialize(ValueDeserializer(value)).map_err(|e| DecodeError::Custom(e.0))
}

// ---------------------------------------------------------------------------
// ValueSerializer
// ---------------------------------------------------------------------------

struct ValueSerializer;

#[derive(Debug)]
struct BridgeError(String);

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for BridgeError {}

impl serde::ser::Error for BridgeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        BridgeError(msg.to_string())
    }
}

impl de::Error for BridgeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        BridgeError(msg.to_string())
    }
}

fn single_entry(key: &'static str, value: Value) -> Value {
    let mut map = ValueMap::with_capacity(1);
    map.insert(key, value);
    Value::Map(map)
}

impl serde::Serializer for ValueSerializer {
    type Ok = Value;
    type Error = BridgeError;
    type SerializeSeq = SerializeItems;
    type SerializeTuple = SerializeItems;
    type SerializeTupleStruct = SerializeItems;
    type SerializeTupleVariant = SerializeItems;
    type SerializeMap = SerializeEntries;
    type SerializeStruct = SerializeEntries;
    type SerializeStructVariant = SerializeEntries;

    fn serialize_bool(self, v: bool) -> Result<Value, BridgeError> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value, BridgeError> {
        Ok(Value::Int(v.into()))
    }
    fn serialize_i16(self, v: i16) -> Result<Value, BridgeError> {
        Ok(Value::Int(v.into()))
    }
    fn serialize_i32(self, v: i32) -> Result<Value, BridgeError> {
        Ok(Value::Int(v.into()))
    }
    fn serialize_i64(self, v: i64) -> Result<Value, BridgeError> {
        Ok(Value::Int(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Value, BridgeError> {
        Ok(Value::Int(v.into()))
    }
    fn serialize_u16(self, v: u16) -> Result<Value, BridgeError> {
        Ok(Value::Int(v.into()))
    }
    fn serialize_u32(self, v: u32) -> Result<Value, BridgeError> {
        Ok(Value::Int(v.into()))
    }
    fn serialize_u64(self, v: u64) -> Result<Value, BridgeError> {
        i64::try_from(v)
            .map(Value::Int)
            .map_err(|_| BridgeError(format!("integer {v} is out of the encodable range")))
    }

    fn serialize_f32(self, v: f32) -> Result<Value, BridgeError> {
        Ok(Value::Float(v))
    }
    fn serialize_f64(self, v: f64) -> Result<Value, BridgeError> {
        let narrow = v as f32;
        if !narrows_exactly(v, narrow) {
            log::debug!("Narrowed f64 {v} to f32 {narrow}");
        }
        Ok(Value::Float(narrow))
    }

    fn serialize_char(self, v: char) -> Result<Value, BridgeError> {
        Ok(Value::Text(v.to_string()))
    }
    fn serialize_str(self, v: &str) -> Result<Value, BridgeError> {
        Ok(Value::Text(v.to_owned()))
    }
    fn serialize_bytes(self, v: &[u8]) -> Result<Value, BridgeError> {
        Ok(Value::Bytes(v.to_vec()))
    }

    fn serialize_none(self) -> Result<Value, BridgeError> {
        Ok(Value::Null)
    }
    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Value, BridgeError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value, BridgeError> {
        Ok(Value::Null)
    }
    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, BridgeError> {
        Ok(Value::Null)
    }
    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value, BridgeError> {
        Ok(Value::Text(variant.to_owned()))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value, BridgeError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, BridgeError> {
        Ok(single_entry(variant, value.serialize(ValueSerializer)?))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SerializeItems, BridgeError> {
        Ok(SerializeItems::new(ItemsKind::List, len.unwrap_or(0)))
    }

    fn serialize_tuple(self, len: usize) -> Result<SerializeItems, BridgeError> {
        Ok(SerializeItems::new(ItemsKind::Tuple, len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SerializeItems, BridgeError> {
        Ok(SerializeItems::new(ItemsKind::Tuple, len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeItems, BridgeError> {
        Ok(SerializeItems::new(ItemsKind::Variant(variant), len))
    }

    fn serialize_map(self, len: Option<usize>) -> Result<SerializeEntries, BridgeError> {
        Ok(SerializeEntries::new(None, len.unwrap_or(0)))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SerializeEntries, BridgeError> {
        Ok(SerializeEntries::new(None, len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SerializeEntries, BridgeError> {
        Ok(SerializeEntries::new(Some(variant), len))
    }
}

enum ItemsKind {
    List,
    Tuple,
    Variant(&'static str),
}

struct SerializeItems {
    kind: ItemsKind,
    items: Vec<Value>,
}

impl SerializeItems {
    fn new(kind: ItemsKind, capacity: usize) -> Self {
        Self {
            kind,
            items: Vec::with_capacity(capacity),
        }
    }

    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), BridgeError> {
        self.items.push(value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn finish(self) -> Value {
        match self.kind {
            ItemsKind::List => Value::List(self.items),
            ItemsKind::Tuple => Value::Tuple(self.items),
            ItemsKind::Variant(variant) => single_entry(variant, Value::Tuple(self.items)),
        }
    }
}

impl serde::ser::SerializeSeq for SerializeItems {
    type Ok = Value;
    type Error = BridgeError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), BridgeError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, BridgeError> {
        Ok(self.finish())
    }
}

impl serde::ser::SerializeTuple for SerializeItems {
    type Ok = Value;
    type Error = BridgeError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), BridgeError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, BridgeError> {
        Ok(self.finish())
    }
}

impl serde::ser::SerializeTupleStruct for SerializeItems {
    type Ok = Value;
    type Error = BridgeError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), BridgeError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, BridgeError> {
        Ok(self.finish())
    }
}

impl serde::ser::SerializeTupleVariant for SerializeItems {
    type Ok = Value;
    type Error = BridgeError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), BridgeError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, BridgeError> {
        Ok(self.finish())
    }
}

struct SerializeEntries {
    variant: Option<&'static str>,
    entries: ValueMap,
    current_key: Option<Value>,
}

impl SerializeEntries {
    fn new(variant: Option<&'static str>, capacity: usize) -> Self {
        Self {
            variant,
            entries: ValueMap::with_capacity(capacity),
            current_key: None,
        }
    }

    fn finish(self) -> Value {
        match self.variant {
            Some(variant) => single_entry(variant, Value::Map(self.entries)),
            None => Value::Map(self.entries),
        }
    }
}

impl serde::ser::SerializeMap for SerializeEntries {
    type Ok = Value;
    type Error = BridgeError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), BridgeError> {
        let key = key.serialize(ValueSerializer)?;
        if !key.is_hashable() {
            return Err(BridgeError(format!("{} cannot be used as a key", key.kind())));
        }
        self.current_key = Some(key);
        Ok(())
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), BridgeError> {
        let key = self
            .current_key
            .take()
            .ok_or_else(|| BridgeError("serialize_value called before serialize_key".into()))?;
        self.entries.insert(key, value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Value, BridgeError> {
        Ok(self.finish())
    }
}

impl serde::ser::SerializeStruct for SerializeEntries {
    type Ok = Value;
    type Error = BridgeError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), BridgeError> {
        self.entries.insert(key, value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Value, BridgeError> {
        Ok(self.finish())
    }
}

impl serde::ser::SerializeStructVariant for SerializeEntries {
    type Ok = Value;
    type Error = BridgeError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), BridgeError> {
        self.entries.insert(key, value.serialize(ValueSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Value, BridgeError> {
        Ok(self.finish())
    }
}

// ---------------------------------------------------------------------------
// ValueDeserializer: Value -> T
// ---------------------------------------------------------------------------

struct ValueDeserializer(Value);

impl ValueDeserializer {
    fn mismatch(&self, expected: &str) -> BridgeError {
        BridgeError(format!("expected {expected}, found {}", self.0.kind()))
    }
}

impl<'de> serde::Deserializer<'de> for ValueDeserializer {
    type Error = BridgeError;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BridgeError> {
        match self.0 {
            Value::Null => visitor.visit_unit(),
            Value::Bool(v) => visitor.visit_bool(v),
            Value::Int(v) => visitor.visit_i64(v),
            Value::Float(v) => visitor.visit_f32(v),
            Value::Text(v) => visitor.visit_string(v),
            Value::Bytes(v) => visitor.visit_byte_buf(v),
            Value::List(v) | Value::Tuple(v) => visitor.visit_seq(ValueSeqAccess {
                iter: v.into_iter(),
            }),
            Value::Set(v) => visitor.visit_seq(ValueSeqAccess {
                iter: v.into_vec().into_iter(),
            }),
            Value::Map(v) => visitor.visit_map(ValueMapAccess {
                iter: v.into_iter(),
                pending_value: None,
            }),
            Value::Record(obj) | Value::Packed(obj) => Err(BridgeError(format!(
                "registered object {} has no serde form",
                obj.type_name()
            ))),
        }
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BridgeError> {
        match self.0 {
            Value::Float(v) => visitor.visit_f32(v),
            Value::Int(v) => visitor.visit_f32(v as f32),
            _ => Err(self.mismatch("float")),
        }
    }
    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BridgeError> {
        match self.0 {
            Value::Float(v) => visitor.visit_f64(v.into()),
            Value::Int(v) => visitor.visit_f64(v as f64),
            _ => Err(self.mismatch("float")),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BridgeError> {
        match self.0 {
            Value::Null => visitor.visit_none(),
            other => visitor.visit_some(ValueDeserializer(other)),
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BridgeError> {
        visitor.visit_unit()
    }
    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, BridgeError> {
        visitor.visit_unit()
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, BridgeError> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BridgeError> {
        match self.0 {
            Value::List(_) | Value::Tuple(_) | Value::Set(_) => self.deserialize_any(visitor),
            _ => Err(self.mismatch("sequence")),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, BridgeError> {
        self.deserialize_seq(visitor)
    }
    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, BridgeError> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BridgeError> {
        match self.0 {
            Value::Map(_) => self.deserialize_any(visitor),
            _ => Err(self.mismatch("map")),
        }
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, BridgeError> {
        self.deserialize_map(visitor)
    }

    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, BridgeError> {
        match self.0 {
            Value::Text(s) => visitor.visit_enum(ValueEnumAccess::Unit(s)),
            Value::Map(entries) => {
                let mut entries = entries.into_iter();
                match (entries.next(), entries.next()) {
                    (Some((Value::Text(variant), value)), None) => {
                        visitor.visit_enum(ValueEnumAccess::Newtype(variant, value))
                    }
                    _ => Err(BridgeError(
                        "enum map must have exactly one text-keyed entry".into(),
                    )),
                }
            }
            _ => Err(self.mismatch("text or map for enum")),
        }
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, BridgeError> {
        visitor.visit_unit()
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 char str string
        bytes byte_buf identifier
    }
}

// --- SeqAccess ---

struct ValueSeqAccess {
    iter: std::vec::IntoIter<Value>,
}

impl<'de> SeqAccess<'de> for ValueSeqAccess {
    type Error = BridgeError;

    fn next_element_seed<T: DeserializeSeed<'de>>(
        &mut self,
        seed: T,
    ) -> Result<Option<T::Value>, BridgeError> {
        match self.iter.next() {
            Some(v) => seed.deserialize(ValueDeserializer(v)).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

// --- MapAccess ---

struct ValueMapAccess {
    iter: crate::value::IntoIter<(Value, Value)>,
    pending_value: Option<Value>,
}

impl<'de> MapAccess<'de> for ValueMapAccess {
    type Error = BridgeError;

    fn next_key_seed<K: DeserializeSeed<'de>>(
        &mut self,
        seed: K,
    ) -> Result<Option<K::Value>, BridgeError> {
        match self.iter.next() {
            Some((k, v)) => {
                self.pending_value = Some(v);
                seed.deserialize(ValueDeserializer(k)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(
        &mut self,
        seed: V,
    ) -> Result<V::Value, BridgeError> {
        let value = self
            .pending_value
            .take()
            .ok_or_else(|| BridgeError("next_value_seed called before next_key_seed".into()))?;
        seed.deserialize(ValueDeserializer(value))
    }
}

// --- EnumAccess ---

enum ValueEnumAccess {
    Unit(String),
    Newtype(String, Value),
}

impl<'de> de::EnumAccess<'de> for ValueEnumAccess {
    type Error = BridgeError;
    type Variant = ValueVariantAccess;

    fn variant_seed<V: DeserializeSeed<'de>>(
        self,
        seed: V,
    ) -> Result<(V::Value, Self::Variant), BridgeError> {
        match self {
            ValueEnumAccess::Unit(s) => {
                let val = seed.deserialize(ValueDeserializer(Value::Text(s)))?;
                Ok((val, ValueVariantAccess::Unit))
            }
            ValueEnumAccess::Newtype(s, value) => {
                let val = seed.deserialize(ValueDeserializer(Value::Text(s)))?;
                Ok((val, ValueVariantAccess::Newtype(value)))
            }
        }
    }
}

enum ValueVariantAccess {
    Unit,
    Newtype(Value),
}

impl<'de> de::VariantAccess<'de> for ValueVariantAccess {
    type Error = BridgeError;

    fn unit_variant(self) -> Result<(), BridgeError> {
        Ok(())
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(
        self,
        seed: T,
    ) -> Result<T::Value, BridgeError> {
        match self {
            ValueVariantAccess::Newtype(v) => seed.deserialize(ValueDeserializer(v)),
            ValueVariantAccess::Unit => Err(BridgeError("expected newtype variant".into())),
        }
    }

    fn tuple_variant<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, BridgeError> {
        match self {
            ValueVariantAccess::Newtype(v) => {
                serde::Deserializer::deserialize_seq(ValueDeserializer(v), visitor)
            }
            ValueVariantAccess::Unit => Err(BridgeError("expected tuple variant".into())),
        }
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, BridgeError> {
        match self {
            ValueVariantAccess::Newtype(v) => {
                serde::Deserializer::deserialize_map(ValueDeserializer(v), visitor)
            }
            ValueVariantAccess::Unit => Err(BridgeError("expected struct variant".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[test]
    fn roundtrip_primitives() {
        assert!(from_value::<bool>(to_value(&true).unwrap()).unwrap());
        assert_eq!(from_value::<i32>(to_value(&-42i32).unwrap()).unwrap(), -42);
        assert_eq!(from_value::<u64>(to_value(&99u64).unwrap()).unwrap(), 99);
        assert_eq!(from_value::<f32>(to_value(&1.5f32).unwrap()).unwrap(), 1.5);
        assert_eq!(
            from_value::<String>(to_value("hello").unwrap()).unwrap(),
            "hello"
        );
    }

    #[test]
    fn f64_narrows_to_wire_float() {
        assert_eq!(to_value(&0.5f64).unwrap(), Value::Float(0.5));
        assert_eq!(to_value(&0.1f64).unwrap(), Value::Float(0.1f32));
        assert!(matches!(to_value(&f64::NAN).unwrap(), Value::Float(f) if f.is_nan()));

        assert!(narrows_exactly(0.5, 0.5));
        assert!(narrows_exactly(f64::NAN, f32::NAN));
        assert!(!narrows_exactly(0.1, 0.1f64 as f32));
        assert!(!narrows_exactly(1e300, 1e300f64 as f32));
    }

    #[test]
    fn u64_above_i64_rejected() {
        assert!(to_value(&u64::MAX).is_err());
    }

    #[test]
    fn tuples_become_tuples() {
        let value = to_value(&(1u8, "a")).unwrap();
        assert_eq!(value, Value::Tuple(vec![Value::Int(1), "a".into()]));
        let restored: (u8, String) = from_value(value).unwrap();
        assert_eq!(restored, (1, "a".to_owned()));
    }

    #[test]
    fn integer_keys_survive() {
        let mut map = BTreeMap::new();
        map.insert(3u32, "three".to_owned());
        let value = to_value(&map).unwrap();
        assert_eq!(
            value.as_map().and_then(|m| m.get(&Value::Int(3))),
            Some(&Value::Text("three".into()))
        );
        let restored: BTreeMap<u32, String> = from_value(value).unwrap();
        assert_eq!(restored, map);
    }

    #[test]
    fn roundtrip_struct_and_enum() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        enum Shape {
            Dot,
            Rect { w: u8, h: u8 },
        }
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Spawn {
            name: String,
            at: (i32, i32),
            shape: Shape,
            tags: Vec<String>,
        }
        let spawn = Spawn {
            name: "door".into(),
            at: (-3, 4),
            shape: Shape::Rect { w: 2, h: 1 },
            tags: vec!["locked".into()],
        };
        let restored: Spawn = from_value(to_value(&spawn).unwrap()).unwrap();
        assert_eq!(restored, spawn);
        assert_eq!(
            from_value::<Shape>(to_value(&Shape::Dot).unwrap()).unwrap(),
            Shape::Dot
        );
    }

    #[test]
    fn kind_mismatch_reports() {
        let err = from_value::<Vec<u8>>(Value::Int(1)).unwrap_err();
        assert!(err.to_string().contains("integer"));
    }
}
