use serde::Deserialize;

/// Default nesting limit for encode and decode.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Tunables for a [`TypeRegistry`](crate::TypeRegistry).
///
/// Deserializable so tools can read it from a TOML file; missing keys
/// fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Maximum container nesting accepted by the encoder and decoder.
    pub max_depth: usize,
    /// Fail with [`DecodeError::TrailingBytes`](crate::DecodeError::TrailingBytes)
    /// when a packed object's `load` does not consume its whole payload.
    /// When off, the leftover bytes are skipped and logged.
    pub reject_trailing_packed_bytes: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            reject_trailing_packed_bytes: false,
        }
    }
}
