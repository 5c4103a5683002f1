//! Decoding half of the codec.
//!
//! [`Decoder`] is a cursor over a borrowed byte slice. Every read checks
//! bounds first, so a malformed buffer produces a [`DecodeError`] and never
//! a read past the end. Packed types receive a `Decoder` over exactly their
//! own payload in [`Packed::load`](crate::Packed::load).

use crate::error::{DecodeError, RegistryKind};
use crate::record::{FieldReader, FinalizeContext};
use crate::registry::TypeRegistry;
use crate::tag::Tag;
use crate::value::{Value, ValueMap, ValueSet};
use crate::varint::read_varint;

/// Cursor-based reader for the tagged wire format.
pub struct Decoder<'r, 'b> {
    registry: &'r TypeRegistry,
    data: &'b [u8],
    pos: usize,
    depth: usize,
    /// Absolute offset of `data[0]` within the top-level buffer.
    base: usize,
}

impl<'r, 'b> Decoder<'r, 'b> {
    /// Create a decoder positioned at `offset` within `data`.
    pub fn new(registry: &'r TypeRegistry, data: &'b [u8], offset: usize) -> Self {
        Self {
            registry,
            data,
            pos: offset,
            depth: 0,
            base: 0,
        }
    }

    pub fn registry(&self) -> &'r TypeRegistry {
        self.registry
    }

    /// A registry resource, for `load` implementations that resolve state
    /// kept outside the buffer.
    pub fn resource<R: 'static>(&self) -> Option<&'r R> {
        self.registry.resource::<R>()
    }

    /// Cursor position within this decoder's slice.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Cursor position within the top-level buffer, used in error reports.
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// Bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    // -----------------------------------------------------------------------
    // Tagged values
    // -----------------------------------------------------------------------

    /// Read one full tagged value.
    pub fn read(&mut self) -> Result<Value, DecodeError> {
        let tag = self.read_tag()?;
        self.read_untagged(tag)
    }

    /// Read a value whose tag byte was supplied out of band.
    pub fn read_untagged(&mut self, tag: Tag) -> Result<Value, DecodeError> {
        match tag {
            Tag::UInt => self.read_uint_payload().map(Value::Int),
            Tag::NegInt => self.read_neg_payload().map(Value::Int),
            Tag::Float => {
                let bytes = self.read_array::<4>()?;
                Ok(Value::Float(f32::from_le_bytes(bytes)))
            }
            Tag::Text => self.read_text_payload().map(Value::Text),
            Tag::Bytes => {
                let len = self.read_len()?;
                Ok(Value::Bytes(self.read_raw(len)?.to_vec()))
            }
            Tag::True => Ok(Value::Bool(true)),
            Tag::False => Ok(Value::Bool(false)),
            Tag::Null => Ok(Value::Null),
            Tag::List => self.nested(|dec| dec.read_items().map(Value::List)),
            Tag::Tuple => self.nested(|dec| dec.read_items().map(Value::Tuple)),
            Tag::Set => self.nested(|dec| dec.read_set().map(Value::Set)),
            Tag::Map => self.nested(|dec| dec.read_map().map(Value::Map)),
            Tag::Record => self.nested(Self::read_record),
            Tag::Packed => self.nested(Self::read_packed),
        }
    }

    /// Read a tagged integer of either sign.
    pub fn read_int(&mut self) -> Result<i64, DecodeError> {
        let offset = self.offset();
        match self.read_tag()? {
            Tag::UInt => self.read_uint_payload(),
            Tag::NegInt => self.read_neg_payload(),
            found => Err(DecodeError::UnexpectedTag {
                offset,
                expected: "integer",
                found,
            }),
        }
    }

    /// Read tagged text.
    pub fn read_text(&mut self) -> Result<String, DecodeError> {
        let offset = self.offset();
        match self.read_tag()? {
            Tag::Text => self.read_text_payload(),
            found => Err(DecodeError::UnexpectedTag {
                offset,
                expected: "text",
                found,
            }),
        }
    }

    /// Read a tagged length or count prefix.
    ///
    /// The prefix must be a non-negative integer no larger than the bytes
    /// left in the buffer.
    pub fn read_len(&mut self) -> Result<usize, DecodeError> {
        self.read_count(1)
    }

    // -----------------------------------------------------------------------
    // Raw building blocks
    // -----------------------------------------------------------------------

    pub fn read_tag(&mut self) -> Result<Tag, DecodeError> {
        let offset = self.offset();
        let [byte] = self.read_array::<1>()?;
        Tag::from_byte(byte).ok_or(DecodeError::UnknownTag { offset, tag: byte })
    }

    /// Bare varint, no tag.
    pub fn read_varint(&mut self) -> Result<u64, DecodeError> {
        let mut pos = self.pos;
        let result = read_varint(self.data, &mut pos).map_err(|e| self.rebase(e));
        self.pos = pos;
        result
    }

    /// Take the next `len` bytes verbatim.
    pub fn read_raw(&mut self, len: usize) -> Result<&'b [u8], DecodeError> {
        let available = self.remaining();
        let bytes = self
            .pos
            .checked_add(len)
            .and_then(|end| self.data.get(self.pos..end))
            .ok_or(DecodeError::TruncatedBuffer {
                offset: self.offset(),
                needed: len,
                available,
            })?;
        self.pos += len;
        Ok(bytes)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_raw(N)?);
        Ok(out)
    }

    /// Read a count prefix for `count` items of at least `min_item_len`
    /// bytes each, rejecting counts the rest of the buffer cannot hold.
    pub fn read_count(&mut self, min_item_len: usize) -> Result<usize, DecodeError> {
        let offset = self.offset();
        let malformed = |reason: &str| DecodeError::MalformedLength {
            offset,
            reason: reason.to_owned(),
        };

        match self.read_tag()? {
            Tag::UInt => {}
            Tag::NegInt => return Err(malformed("length is negative")),
            found => {
                return Err(malformed(&format!(
                    "length must be an integer, found {}",
                    found.name()
                )));
            }
        }

        let raw = self.read_varint()?;
        let count = usize::try_from(raw).map_err(|_| malformed("length does not fit in memory"))?;
        let needed = count
            .checked_mul(min_item_len)
            .ok_or_else(|| malformed("length overflows"))?;
        let available = self.remaining();
        if needed > available {
            return Err(malformed(&format!(
                "length {count} exceeds the {available} remaining bytes"
            )));
        }
        Ok(count)
    }

    fn read_uint_payload(&mut self) -> Result<i64, DecodeError> {
        let start = self.offset();
        let raw = self.read_varint()?;
        i64::try_from(raw).map_err(|_| DecodeError::VarintOverflow { offset: start })
    }

    fn read_neg_payload(&mut self) -> Result<i64, DecodeError> {
        let bytes = self.read_array::<4>()?;
        Ok(i32::from_le_bytes(bytes).into())
    }

    fn read_text_payload(&mut self) -> Result<String, DecodeError> {
        let len = self.read_len()?;
        let start = self.offset();
        let bytes = self.read_raw(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8 { offset: start })
    }

    /// Adjust an error produced on this decoder's slice to absolute offsets.
    fn rebase(&self, err: DecodeError) -> DecodeError {
        match err {
            DecodeError::TruncatedBuffer {
                offset,
                needed,
                available,
            } => DecodeError::TruncatedBuffer {
                offset: self.base + offset,
                needed,
                available,
            },
            DecodeError::VarintOverflow { offset } => DecodeError::VarintOverflow {
                offset: self.base + offset,
            },
            other => other,
        }
    }

    // -----------------------------------------------------------------------
    // Containers and objects
    // -----------------------------------------------------------------------

    fn nested(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<Value, DecodeError>,
    ) -> Result<Value, DecodeError> {
        let limit = self.registry.config().max_depth;
        if self.depth >= limit {
            return Err(DecodeError::DepthLimitExceeded {
                offset: self.offset(),
                limit,
            });
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn read_items(&mut self) -> Result<Vec<Value>, DecodeError> {
        let count = self.read_count(1)?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(self.read()?);
        }
        Ok(items)
    }

    /// Read a key or set element and check that it is hashable.
    fn read_key(&mut self) -> Result<Value, DecodeError> {
        let offset = self.offset();
        let key = self.read()?;
        if !key.is_hashable() {
            return Err(DecodeError::InvalidKeyType {
                offset,
                kind: key.kind(),
            });
        }
        Ok(key)
    }

    fn read_set(&mut self) -> Result<ValueSet, DecodeError> {
        let count = self.read_count(1)?;
        let mut set = ValueSet::with_capacity(count);
        for _ in 0..count {
            let element = self.read_key()?;
            if !set.insert(element) {
                log::warn!(
                    "Dropped duplicate set element at offset {}",
                    self.offset()
                );
            }
        }
        Ok(set)
    }

    fn read_map(&mut self) -> Result<ValueMap, DecodeError> {
        let count = self.read_count(2)?;
        let mut map = ValueMap::with_capacity(count);
        for _ in 0..count {
            let key = self.read_key()?;
            let value = self.read()?;
            if map.insert(key, value).is_some() {
                log::warn!(
                    "Replaced duplicate map key before offset {}",
                    self.offset()
                );
            }
        }
        Ok(map)
    }

    /// Name, field mapping, structural build, then finalize.
    fn read_record(&mut self) -> Result<Value, DecodeError> {
        let name = self.read_text()?;
        let registry = self.registry;
        let entry = registry
            .record_by_name(&name)
            .ok_or_else(|| DecodeError::UnknownTypeName {
                registry: RegistryKind::Record,
                name: name.clone(),
            })?;

        let offset = self.offset();
        let tag = self.read_tag()?;
        if tag != Tag::Map {
            return Err(DecodeError::UnexpectedTag {
                offset,
                expected: "field mapping",
                found: tag,
            });
        }

        let count = self.read_count(2)?;
        let mut fields: Vec<(String, Value)> = Vec::with_capacity(count);
        for _ in 0..count {
            let field = match self.read()? {
                Value::Text(field) => field,
                other => {
                    return Err(DecodeError::NonTextFieldName {
                        record: name,
                        found: other.kind(),
                    });
                }
            };
            if !entry.fields.iter().any(|f| *f == field) {
                return Err(DecodeError::UnknownField {
                    record: name,
                    field,
                });
            }
            let value = self.read()?;
            if let Some(slot) = fields.iter_mut().find(|(f, _)| *f == field) {
                log::warn!("Record '{name}' repeats field '{field}', keeping the last value");
                slot.1 = value;
            } else {
                fields.push((field, value));
            }
        }

        let mut reader = FieldReader::new(&entry.name, fields, &entry.excluded);
        let ctx = FinalizeContext::new(&entry.name, registry.resources());
        let object = (entry.decode)(&mut reader, &ctx)?;
        Ok(Value::Record(object))
    }

    /// Name, payload length, then `load` over exactly that payload.
    fn read_packed(&mut self) -> Result<Value, DecodeError> {
        let name = self.read_text()?;
        let registry = self.registry;
        let entry = registry
            .packed_by_name(&name)
            .ok_or_else(|| DecodeError::UnknownTypeName {
                registry: RegistryKind::Packed,
                name: name.clone(),
            })?;

        let len = self.read_len()?;
        let base = self.offset();
        let payload = self.read_raw(len)?;

        let mut child = Decoder {
            registry,
            data: payload,
            pos: 0,
            depth: self.depth,
            base,
        };
        let object = (entry.load)(&mut child)?;

        let trailing = child.remaining();
        if trailing > 0 {
            if registry.config().reject_trailing_packed_bytes {
                return Err(DecodeError::TrailingBytes {
                    name,
                    remaining: trailing,
                });
            }
            log::debug!("Packed object '{name}' left {trailing} trailing bytes at offset {base}");
        }
        Ok(Value::Packed(object))
    }
}
