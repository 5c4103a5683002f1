//! Error types for encoding, decoding and type registration.

use thiserror::Error;

use crate::tag::Tag;

/// Which of the two type registries a name was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryKind {
    /// Field-registered types (`O` tag).
    Record,
    /// User-registered types (`U` tag).
    Packed,
}

impl std::fmt::Display for RegistryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryKind::Record => f.write_str("record"),
            RegistryKind::Packed => f.write_str("packed"),
        }
    }
}

/// Errors that can occur while encoding a [`Value`](crate::Value).
#[derive(Error, Debug)]
pub enum EncodeError {
    /// The value holds an object whose type is in neither registry.
    #[error("can't serialize type {type_name}: not registered")]
    UnsupportedValueType { type_name: &'static str },
    /// A negative integer does not fit the fixed 4-byte signed encoding,
    /// or an unsigned value does not fit a signed 64-bit integer.
    #[error("integer {value} is out of the encodable range")]
    IntegerOutOfRange { value: i128 },
    /// A record did not write one of its non-excluded declared fields.
    #[error("record '{record}' did not write declared field '{field}'")]
    MissingField { record: String, field: String },
    /// A record wrote a field that is not in its declared field list.
    #[error("record '{record}' wrote undeclared field '{field}'")]
    UndeclaredField { record: String, field: String },
    /// A record wrote the same field twice.
    #[error("record '{record}' wrote field '{field}' more than once")]
    DuplicateField { record: String, field: String },
    /// A field without a wire form was asked to be encoded.
    #[error("field '{field}' of record '{record}' has no wire form")]
    TransientField { record: String, field: String },
    /// A mapping key or set element is a mutable container.
    #[error("{kind} cannot be used as a key")]
    InvalidKeyType { kind: &'static str },
    /// The value nests deeper than the configured limit.
    #[error("nesting depth exceeds the limit of {limit}")]
    DepthLimitExceeded { limit: usize },
    /// Type-specific failure reported by a `dump` implementation.
    #[error("{0}")]
    Custom(String),
}

impl EncodeError {
    /// Build a [`EncodeError::Custom`] from any displayable message.
    pub fn custom(message: impl std::fmt::Display) -> Self {
        Self::Custom(message.to_string())
    }
}

/// Errors that can occur while decoding a buffer.
///
/// Every variant is terminal for the `deserialize` call that produced it.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// A record or packed object references a name that is not registered.
    #[error("unknown {registry} type name \"{name}\"")]
    UnknownTypeName { registry: RegistryKind, name: String },
    /// A length or count prefix is negative, not an integer, or larger than
    /// the rest of the buffer.
    #[error("at offset {offset}: malformed length ({reason})")]
    MalformedLength { offset: usize, reason: String },
    /// A text payload is not valid UTF-8.
    #[error("at offset {offset}: text is not valid UTF-8")]
    InvalidUtf8 { offset: usize },
    /// Decoding would read past the end of the buffer.
    #[error("at offset {offset}: buffer truncated (needed {needed} bytes, {available} available)")]
    TruncatedBuffer {
        offset: usize,
        needed: usize,
        available: usize,
    },
    /// A mapping key or set element decoded to a kind that cannot be a key.
    #[error("at offset {offset}: {kind} cannot be used as a key")]
    InvalidKeyType { offset: usize, kind: &'static str },
    /// The leading byte matches no tag.
    #[error("at offset {offset}: unknown tag byte 0x{tag:02X}")]
    UnknownTag { offset: usize, tag: u8 },
    /// A varint does not fit in 64 bits, or an unsigned integer does not fit
    /// a signed 64-bit value.
    #[error("at offset {offset}: integer overflows 64 bits")]
    VarintOverflow { offset: usize },
    /// A specific tag was required at this position.
    #[error("at offset {offset}: expected {expected}, found {found}")]
    UnexpectedTag {
        offset: usize,
        expected: &'static str,
        found: Tag,
    },
    /// A record field mapping has a non-text key.
    #[error("record '{record}': field name must be text, found {found}")]
    NonTextFieldName { record: String, found: &'static str },
    /// A record field mapping names a field the type does not declare.
    #[error("record '{record}' has no declared field '{field}'")]
    UnknownField { record: String, field: String },
    /// A non-excluded declared field is absent from the field mapping.
    #[error("record '{record}' is missing field '{field}'")]
    MissingField { record: String, field: String },
    /// A field value has the wrong kind for the field's type.
    #[error("record '{record}' field '{field}': expected {expected}, found {found}")]
    FieldType {
        record: String,
        field: String,
        expected: &'static str,
        found: String,
    },
    /// The buffer nests deeper than the configured limit.
    #[error("at offset {offset}: nesting depth exceeds the limit of {limit}")]
    DepthLimitExceeded { offset: usize, limit: usize },
    /// A packed object's `load` left bytes unconsumed and the registry is
    /// configured to reject that.
    #[error("packed object '{name}' left {remaining} trailing bytes")]
    TrailingBytes { name: String, remaining: usize },
    /// A finalize hook failed.
    #[error("failed to finalize '{type_name}': {message}")]
    Finalize { type_name: String, message: String },
    /// Type-specific failure reported by a `load` implementation.
    #[error("{0}")]
    Custom(String),
}

impl DecodeError {
    /// Build a [`DecodeError::Custom`] from any displayable message.
    pub fn custom(message: impl std::fmt::Display) -> Self {
        Self::Custom(message.to_string())
    }
}

/// Errors that can occur while building or installing a type registry.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistrationError {
    /// Another type already uses this name in the same registry.
    #[error("{registry} type name \"{name}\" is already registered")]
    DuplicateName { registry: RegistryKind, name: String },
    /// The same Rust type was registered twice.
    #[error("type {type_name} is already registered")]
    DuplicateType { type_name: &'static str },
    /// Registered names must be non-empty.
    #[error("registered type names must not be empty ({type_name})")]
    EmptyName { type_name: &'static str },
    /// An excluded field is not in the type's declared field list.
    #[error("record \"{name}\" excludes undeclared field '{field}'")]
    UnknownExcludedField { name: String, field: String },
    /// A field without a wire form must be excluded.
    #[error("record \"{name}\" must exclude transient field '{field}'")]
    TransientFieldNotExcluded { name: String, field: String },
    /// The process-wide registry was already installed.
    #[error("a process-wide type registry is already installed")]
    AlreadyInstalled,
}

/// Mismatch between a [`Value`](crate::Value) and the Rust type it was
/// converted into. Field readers attach the record and field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueMismatch {
    pub expected: &'static str,
    pub found: String,
}

impl ValueMismatch {
    pub fn new(expected: &'static str, found: impl Into<String>) -> Self {
        Self {
            expected,
            found: found.into(),
        }
    }
}

impl std::fmt::Display for ValueMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "expected {}, found {}", self.expected, self.found)
    }
}

impl std::error::Error for ValueMismatch {}
