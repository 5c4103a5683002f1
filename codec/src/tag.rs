//! Leading tag bytes of the wire format.
//!
//! Every encoded value starts with exactly one tag byte, and decoding
//! dispatches on that byte alone. The byte values are the ASCII letters
//! used by existing level files, so they must never change.

use std::fmt;

/// One-byte discriminant that precedes every encoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    /// Non-negative integer, unsigned LEB128 payload.
    UInt = b'I',
    /// Negative integer, 4-byte little-endian two's complement payload.
    NegInt = b'i',
    /// IEEE-754 single precision, 4-byte little-endian payload.
    Float = b'f',
    /// UTF-8 text, length-prefixed.
    Text = b's',
    /// Raw bytes, length-prefixed.
    Bytes = b'b',
    True = b't',
    False = b'F',
    Null = b'N',
    /// Ordered mutable sequence.
    List = b'L',
    /// Ordered immutable sequence.
    Tuple = b'T',
    /// Unordered unique-element collection.
    Set = b'S',
    /// Key-unique mapping.
    Map = b'D',
    /// Field-registered object: name + field mapping.
    Record = b'O',
    /// User-registered object: name + length + opaque bytes.
    Packed = b'U',
}

impl Tag {
    /// All tags, in wire-table order.
    pub const ALL: [Tag; 14] = [
        Tag::UInt,
        Tag::NegInt,
        Tag::Float,
        Tag::Text,
        Tag::Bytes,
        Tag::True,
        Tag::False,
        Tag::Null,
        Tag::List,
        Tag::Tuple,
        Tag::Set,
        Tag::Map,
        Tag::Record,
        Tag::Packed,
    ];

    /// Map a raw byte back to its tag, or `None` for an unknown byte.
    pub fn from_byte(byte: u8) -> Option<Tag> {
        Some(match byte {
            b'I' => Tag::UInt,
            b'i' => Tag::NegInt,
            b'f' => Tag::Float,
            b's' => Tag::Text,
            b'b' => Tag::Bytes,
            b't' => Tag::True,
            b'F' => Tag::False,
            b'N' => Tag::Null,
            b'L' => Tag::List,
            b'T' => Tag::Tuple,
            b'S' => Tag::Set,
            b'D' => Tag::Map,
            b'O' => Tag::Record,
            b'U' => Tag::Packed,
            _ => return None,
        })
    }

    /// The raw tag byte.
    pub fn byte(self) -> u8 {
        self as u8
    }

    /// Human-readable name, used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Tag::UInt => "non-negative integer",
            Tag::NegInt => "negative integer",
            Tag::Float => "float",
            Tag::Text => "text",
            Tag::Bytes => "bytes",
            Tag::True => "true",
            Tag::False => "false",
            Tag::Null => "null",
            Tag::List => "list",
            Tag::Tuple => "tuple",
            Tag::Set => "set",
            Tag::Map => "map",
            Tag::Record => "record",
            Tag::Packed => "packed object",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ('{}')", self.name(), self.byte() as char)
    }
}
