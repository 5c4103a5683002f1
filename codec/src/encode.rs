//! Encoding half of the codec.
//!
//! [`Encoder`] appends the tagged encoding of [`Value`]s to a growable
//! buffer. Packed types receive an `Encoder` in [`Packed::dump`] and may
//! mix tagged writes with raw payload writes to lay out their own bytes.
//!
//! [`Packed::dump`]: crate::Packed::dump

use crate::error::EncodeError;
use crate::record::FieldWriter;
use crate::registry::TypeRegistry;
use crate::tag::Tag;
use crate::value::{AnyObject, Value, ValueMap, ValueSet};
use crate::varint::write_varint;

/// Append-only writer for the tagged wire format.
pub struct Encoder<'r> {
    registry: &'r TypeRegistry,
    buf: Vec<u8>,
    depth: usize,
}

impl<'r> Encoder<'r> {
    /// Create an encoder that resolves registered objects through `registry`.
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            buf: Vec::new(),
            depth: 0,
        }
    }

    /// A fresh encoder for a nested payload. Nesting depth carries over.
    fn child(&self) -> Encoder<'r> {
        Encoder {
            registry: self.registry,
            buf: Vec::new(),
            depth: self.depth,
        }
    }

    pub fn registry(&self) -> &'r TypeRegistry {
        self.registry
    }

    /// Bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -----------------------------------------------------------------------
    // Tagged values
    // -----------------------------------------------------------------------

    /// Write the full tagged encoding of `value`.
    pub fn write(&mut self, value: &Value) -> Result<(), EncodeError> {
        let tag = value.tag();
        self.write_tag(tag);
        self.write_payload(value)?;
        Ok(())
    }

    /// Write `value` without its tag byte, returning the tag the reader
    /// must supply to [`Decoder::read_untagged`](crate::Decoder::read_untagged).
    pub fn write_untagged(&mut self, value: &Value) -> Result<Tag, EncodeError> {
        self.write_payload(value)?;
        Ok(value.tag())
    }

    /// Tagged integer, choosing the tag by sign.
    pub fn write_int(&mut self, value: i64) -> Result<(), EncodeError> {
        if value >= 0 {
            self.write_tag(Tag::UInt);
        } else {
            self.write_tag(Tag::NegInt);
        }
        self.write_int_payload(value)
    }

    /// Tagged length or count prefix.
    pub fn write_len(&mut self, len: usize) {
        self.write_tag(Tag::UInt);
        self.write_varint(len as u64);
    }

    pub fn write_float(&mut self, value: f32) {
        self.write_tag(Tag::Float);
        self.write_raw(&value.to_le_bytes());
    }

    pub fn write_text(&mut self, text: &str) {
        self.write_tag(Tag::Text);
        self.write_len(text.len());
        self.write_raw(text.as_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_tag(Tag::Bytes);
        self.write_len(bytes.len());
        self.write_raw(bytes);
    }

    // -----------------------------------------------------------------------
    // Raw building blocks
    // -----------------------------------------------------------------------

    pub fn write_tag(&mut self, tag: Tag) {
        self.buf.push(tag.byte());
    }

    /// Bare varint, no tag.
    pub fn write_varint(&mut self, value: u64) {
        write_varint(value, &mut self.buf);
    }

    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    // -----------------------------------------------------------------------
    // Payloads
    // -----------------------------------------------------------------------

    fn write_int_payload(&mut self, value: i64) -> Result<(), EncodeError> {
        if value >= 0 {
            self.write_varint(value as u64);
            return Ok(());
        }
        let narrow = i32::try_from(value).map_err(|_| EncodeError::IntegerOutOfRange {
            value: value.into(),
        })?;
        self.write_raw(&narrow.to_le_bytes());
        Ok(())
    }

    fn write_payload(&mut self, value: &Value) -> Result<(), EncodeError> {
        match value {
            Value::Null | Value::Bool(_) => Ok(()),
            Value::Int(v) => self.write_int_payload(*v),
            Value::Float(v) => {
                self.write_raw(&v.to_le_bytes());
                Ok(())
            }
            Value::Text(s) => {
                self.write_len(s.len());
                self.write_raw(s.as_bytes());
                Ok(())
            }
            Value::Bytes(b) => {
                self.write_len(b.len());
                self.write_raw(b);
                Ok(())
            }
            Value::List(items) | Value::Tuple(items) => {
                self.nested(|enc| enc.write_items(items.iter(), items.len()))
            }
            Value::Set(set) => self.nested(|enc| enc.write_set(set)),
            Value::Map(map) => self.nested(|enc| enc.write_map(map)),
            Value::Record(obj) => self.nested(|enc| enc.write_record(obj)),
            Value::Packed(obj) => self.nested(|enc| enc.write_packed(obj)),
        }
    }

    fn nested(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<(), EncodeError>,
    ) -> Result<(), EncodeError> {
        let limit = self.registry.config().max_depth;
        if self.depth >= limit {
            return Err(EncodeError::DepthLimitExceeded { limit });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn write_items<'v>(
        &mut self,
        items: impl Iterator<Item = &'v Value>,
        count: usize,
    ) -> Result<(), EncodeError> {
        self.write_len(count);
        for item in items {
            self.write(item)?;
        }
        Ok(())
    }

    fn write_set(&mut self, set: &ValueSet) -> Result<(), EncodeError> {
        if let Some(bad) = set.iter().find(|v| !v.is_hashable()) {
            return Err(EncodeError::InvalidKeyType { kind: bad.kind() });
        }
        self.write_items(set.iter(), set.len())
    }

    fn write_map(&mut self, map: &ValueMap) -> Result<(), EncodeError> {
        self.write_len(map.len());
        for (key, value) in map.iter() {
            if !key.is_hashable() {
                return Err(EncodeError::InvalidKeyType { kind: key.kind() });
            }
            self.write(key)?;
            self.write(value)?;
        }
        Ok(())
    }

    /// `O`, name, then the field mapping in declaration order.
    fn write_record(&mut self, obj: &AnyObject) -> Result<(), EncodeError> {
        let registry = self.registry;
        let entry = registry.record_by_type(obj.type_id()).ok_or(
            EncodeError::UnsupportedValueType {
                type_name: obj.type_name(),
            },
        )?;

        let mut writer = FieldWriter::new(&entry.name, entry.fields, &entry.excluded);
        (entry.encode)(obj.as_any(), &mut writer)?;
        let fields = writer.finish()?;

        self.write_text(&entry.name);
        self.write_tag(Tag::Map);
        self.write_len(fields.len());
        for (name, value) in &fields {
            self.write_text(name);
            self.write(value)?;
        }
        Ok(())
    }

    /// `U`, name, payload length, then the payload from `dump`.
    fn write_packed(&mut self, obj: &AnyObject) -> Result<(), EncodeError> {
        let registry = self.registry;
        let entry = registry.packed_by_type(obj.type_id()).ok_or(
            EncodeError::UnsupportedValueType {
                type_name: obj.type_name(),
            },
        )?;

        let mut child = self.child();
        (entry.dump)(obj.as_any(), &mut child)?;

        self.write_text(&entry.name);
        self.write_len(child.buf.len());
        self.write_raw(&child.buf);
        Ok(())
    }
}
