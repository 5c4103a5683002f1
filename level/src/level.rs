//! Level files.
//!
//! A level file holds exactly one encoded [`Map`] and nothing else. Files
//! are named `level0`, `level1`, ... in the working directory.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tilepack_codec::{DecodeError, EncodeError, TypeRegistry, Value};

use crate::map::Map;
use crate::tileset::TilesetCache;

/// Errors that can occur while reading or writing a level file.
#[derive(Error, Debug)]
pub enum LevelError {
    #[error("level file {} not found", path.display())]
    NotFound { path: PathBuf },
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The file does not decode. This is what the editor reports as an
    /// invalid map file.
    #[error("invalid map file: {0}")]
    InvalidMap(#[from] DecodeError),
    /// The file decodes, but not to a map.
    #[error("level file holds {found}, not a map")]
    NotAMap { found: &'static str },
    #[error("failed to encode map: {0}")]
    Encode(#[from] EncodeError),
}

impl LevelError {
    fn io(path: &Path, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            LevelError::NotFound {
                path: path.to_owned(),
            }
        } else {
            LevelError::Io {
                path: path.to_owned(),
                source: err,
            }
        }
    }
}

/// File name of level `n`.
pub fn level_file_name(n: u32) -> String {
    format!("level{n}")
}

/// Path of level `n` inside `dir`.
pub fn level_path(dir: &Path, n: u32) -> PathBuf {
    dir.join(level_file_name(n))
}

/// Encode `map` into level file bytes.
pub fn encode_map(map: &Map, registry: &TypeRegistry) -> Result<Vec<u8>, LevelError> {
    Ok(registry.serialize(&Value::packed(map.clone()))?)
}

/// Decode level file bytes into a map.
pub fn decode_map(data: &[u8], registry: &TypeRegistry) -> Result<Map, LevelError> {
    let (value, end) = registry.deserialize(data, 0)?;
    if end != data.len() {
        log::warn!("Ignoring {} bytes after the map", data.len() - end);
    }
    value
        .into_object::<Map>()
        .map_err(|other| LevelError::NotAMap {
            found: other.kind(),
        })
}

pub fn save_level(path: &Path, map: &Map, registry: &TypeRegistry) -> Result<(), LevelError> {
    let bytes = encode_map(map, registry)?;
    std::fs::write(path, &bytes).map_err(|e| LevelError::io(path, e))?;
    log::info!(
        "Saved level {} ({} bytes, {} layers, {} entities)",
        path.display(),
        bytes.len(),
        map.layers().len(),
        map.entities().len()
    );
    Ok(())
}

pub fn load_level(path: &Path, registry: &TypeRegistry) -> Result<Map, LevelError> {
    let bytes = std::fs::read(path).map_err(|e| LevelError::io(path, e))?;
    let map = decode_map(&bytes, registry)?;
    log::info!(
        "Loaded level {} ({} layers, {} entities)",
        path.display(),
        map.layers().len(),
        map.entities().len()
    );
    Ok(map)
}

/// Load a level, or start from the default map if the file does not
/// exist. Any other failure is returned.
///
/// The default map resolves its tileset through the registry's
/// [`TilesetCache`] resource when there is one.
pub fn load_level_or_default(path: &Path, registry: &TypeRegistry) -> Result<Map, LevelError> {
    match load_level(path, registry) {
        Err(LevelError::NotFound { .. }) => {
            log::info!("No level at {}, starting from the default map", path.display());
            Ok(match registry.resource::<TilesetCache>() {
                Some(cache) => Map::new_default(cache),
                None => Map::new_default(&TilesetCache::default()),
            })
        }
        result => result,
    }
}
