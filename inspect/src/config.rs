use std::path::{Path, PathBuf};

use serde::Deserialize;
use tilepack_codec::CodecConfig;

/// Settings loaded from `--config`.
///
/// ```toml
/// tileset_dir = "assets/tilesets"
///
/// [codec]
/// max_depth = 64
/// reject_trailing_packed_bytes = true
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InspectConfig {
    #[serde(default)]
    pub codec: CodecConfig,
    pub tileset_dir: Option<PathBuf>,
}

/// Load settings from a TOML file.
///
/// Returns `Err` with a human-readable message if the file cannot be read
/// or parsed.
pub fn load_config(path: &Path) -> Result<InspectConfig, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
    toml::from_str(&content).map_err(|e| format!("failed to parse {}: {e}", path.display()))
}
