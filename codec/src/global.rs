//! Optional process-wide registry.
//!
//! Hosts that do not want to thread a [`TypeRegistry`] through every call
//! can install one at startup and use the free [`serialize`] and
//! [`deserialize`] functions. Installation happens at most once; reads
//! after that take no locks. Before installation the free functions run
//! against an empty registry.

use std::sync::OnceLock;

use crate::error::{DecodeError, EncodeError, RegistrationError};
use crate::registry::TypeRegistry;
use crate::value::Value;

static INSTALLED: OnceLock<TypeRegistry> = OnceLock::new();
static EMPTY: OnceLock<TypeRegistry> = OnceLock::new();

/// Install `registry` as the process-wide registry.
///
/// # Errors
///
/// Returns [`RegistrationError::AlreadyInstalled`] if a registry was
/// installed before; the new one is dropped.
pub fn install(registry: TypeRegistry) -> Result<&'static TypeRegistry, RegistrationError> {
    INSTALLED
        .set(registry)
        .map_err(|_| RegistrationError::AlreadyInstalled)?;
    let installed = INSTALLED.get().ok_or(RegistrationError::AlreadyInstalled)?;
    log::info!(
        "Installed type registry: {} record types, {} packed types",
        installed.record_names().count(),
        installed.packed_names().count()
    );
    Ok(installed)
}

/// The installed registry, if any.
pub fn installed() -> Option<&'static TypeRegistry> {
    INSTALLED.get()
}

/// The installed registry, or an empty one before installation.
pub fn registry() -> &'static TypeRegistry {
    INSTALLED
        .get()
        .unwrap_or_else(|| EMPTY.get_or_init(TypeRegistry::default))
}

/// [`TypeRegistry::serialize`] on the process-wide registry.
pub fn serialize(value: &Value) -> Result<Vec<u8>, EncodeError> {
    registry().serialize(value)
}

/// [`TypeRegistry::deserialize`] on the process-wide registry.
pub fn deserialize(data: &[u8], offset: usize) -> Result<(Value, usize), DecodeError> {
    registry().deserialize(data, offset)
}
