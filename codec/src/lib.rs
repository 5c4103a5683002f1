//! # Tilepack Codec
//!
//! Tagged binary serialization engine for application object graphs.
//!
//! ## Core Types
//!
//! - [`Value`]: In-memory form of everything the wire format carries
//! - [`Tag`]: One-byte discriminant that starts every encoded value
//! - [`Encoder`] / [`Decoder`]: Buffer writer and bounds-checked cursor
//! - [`TypeRegistry`] / [`RegistryBuilder`]: Immutable tables of registered types
//!
//! ## Extension Points
//!
//! - [`Record`] + [`Fields`]: Field-registered types; the codec writes a
//!   text-keyed mapping of the declared fields. `#[derive(Fields)]`
//!   generates the schema.
//! - [`Packed`]: User-registered types that own their whole payload.
//!
//! Back-edges (child to parent pointers) have no wire form. Leave them out
//! of the child's fields and rebuild them in the parent's [`Packed::load`].
//!
//! ## Entry Points
//!
//! - [`TypeRegistry::serialize`] / [`TypeRegistry::deserialize`]
//! - [`global::install`] plus [`global::serialize`] / [`global::deserialize`]
//!   for a process-wide registry

// Lets `#[derive(Fields)]` refer to `::tilepack_codec` inside this crate.
extern crate self as tilepack_codec;

mod bridge;
mod config;
mod decode;
mod encode;
mod error;
pub mod global;
mod packed;
mod record;
mod registry;
mod resource;
pub mod tag;
mod value;
pub mod varint;

pub use bridge::{from_value, to_value};
pub use codec_macro::Fields;
pub use config::{CodecConfig, DEFAULT_MAX_DEPTH};
pub use decode::Decoder;
pub use encode::Encoder;
pub use error::{DecodeError, EncodeError, RegistrationError, RegistryKind, ValueMismatch};
pub use packed::Packed;
pub use record::{FieldReader, FieldValue, FieldWriter, Fields, FinalizeContext, Record};
pub use registry::{RegistryBuilder, TypeRegistry};
pub use resource::Resources;
pub use tag::Tag;
pub use value::{AnyObject, Value, ValueMap, ValueSet};
