//! `tilepack`: inspect, create and verify level files.

mod args;
mod config;
mod tree;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use thiserror::Error;
use tilepack_codec::{DecodeError, EncodeError, RegistrationError, RegistryBuilder, TypeRegistry};
use tilepack_level::level::level_file_name;
use tilepack_level::{LevelError, Map, TILE_SIZE, TilesetCache, register_level_types, save_level};

use crate::args::{Args, Command};
use crate::config::{InspectConfig, load_config};

#[derive(Error, Debug)]
enum InspectError {
    #[error("{0}")]
    Config(String),
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} already exists, pass --force to replace it", .0.display())]
    Exists(PathBuf),
    #[error(transparent)]
    Registration(#[from] RegistrationError),
    #[error("{}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Level(#[from] LevelError),
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `false` when the command ran but its check did not pass.
fn run(args: Args) -> Result<bool, InspectError> {
    let config = match &args.config {
        Some(path) => load_config(path).map_err(InspectError::Config)?,
        None => InspectConfig::default(),
    };
    let tileset_dir = args
        .tileset_dir
        .or(config.tileset_dir)
        .unwrap_or_else(|| PathBuf::from("."));
    let registry = build_registry(config.codec, tileset_dir)?;

    match args.command {
        Command::Show { file, depth } => show(&registry, &file, depth),
        Command::New {
            file,
            width,
            height,
            tileset,
            force,
        } => create(&registry, &file, width, height, &tileset, force),
        Command::Check { file } => check(&registry, &file),
    }
}

fn build_registry(
    codec: tilepack_codec::CodecConfig,
    tileset_dir: PathBuf,
) -> Result<TypeRegistry, InspectError> {
    let mut builder = RegistryBuilder::new();
    register_level_types(&mut builder)?;
    builder
        .insert_resource(TilesetCache::new(tileset_dir))
        .with_config(codec);
    Ok(builder.build())
}

fn read_file(path: &Path) -> Result<Vec<u8>, InspectError> {
    std::fs::read(path).map_err(|source| InspectError::Read {
        path: path.to_owned(),
        source,
    })
}

fn show(registry: &TypeRegistry, path: &Path, depth: Option<usize>) -> Result<bool, InspectError> {
    let bytes = read_file(path)?;
    let (value, end) = registry
        .deserialize(&bytes, 0)
        .map_err(|source| InspectError::Decode {
            path: path.to_owned(),
            source,
        })?;
    print!("{}", tree::render(&value, depth));
    if end != bytes.len() {
        log::warn!("{} bytes after the first value were not shown", bytes.len() - end);
    }
    Ok(true)
}

fn create(
    registry: &TypeRegistry,
    path: &Path,
    width: usize,
    height: usize,
    tileset: &str,
    force: bool,
) -> Result<bool, InspectError> {
    if path.exists() && !force {
        return Err(InspectError::Exists(path.to_owned()));
    }
    let cache = registry
        .resource::<TilesetCache>()
        .ok_or_else(|| InspectError::Config("tileset cache is not configured".into()))?;
    let map = Map::with_size(cache, width, height, tileset);
    save_level(path, &map, registry)?;

    let is_level_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| {
            name.strip_prefix("level")
                .and_then(|n| n.parse::<u32>().ok())
                .is_some_and(|n| level_file_name(n) == name)
        });
    if !is_level_name {
        log::info!("The editor only opens files named level0, level1, ...");
    }
    log::info!(
        "{width}x{height} tiles ({}x{} px) on tileset \"{tileset}\"",
        width * TILE_SIZE.0 as usize,
        height * TILE_SIZE.1 as usize
    );
    Ok(true)
}

fn check(registry: &TypeRegistry, path: &Path) -> Result<bool, InspectError> {
    let bytes = read_file(path)?;
    let (value, end) = registry
        .deserialize(&bytes, 0)
        .map_err(|source| InspectError::Decode {
            path: path.to_owned(),
            source,
        })?;
    let reencoded = registry.serialize(&value)?;

    let original = &bytes[..end];
    if reencoded == original && end == bytes.len() {
        log::info!("{}: {} bytes, re-encodes identically", path.display(), end);
        return Ok(true);
    }

    if end != bytes.len() {
        log::warn!("{}: {} trailing bytes after the value", path.display(), bytes.len() - end);
    }
    if reencoded != original {
        let first_diff = original
            .iter()
            .zip(&reencoded)
            .position(|(a, b)| a != b)
            .unwrap_or(original.len().min(reencoded.len()));
        log::warn!(
            "{}: re-encoding differs at offset {first_diff} ({} bytes read, {} written)",
            path.display(),
            original.len(),
            reencoded.len()
        );
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("tilepack-inspect-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    fn registry() -> TypeRegistry {
        build_registry(Default::default(), PathBuf::from(".")).unwrap()
    }

    #[test]
    fn new_then_check() {
        let registry = registry();
        let path = temp_file("level0");
        let _ = std::fs::remove_file(&path);

        assert!(create(&registry, &path, 4, 2, "cave", false).unwrap());
        assert!(matches!(
            create(&registry, &path, 4, 2, "cave", false),
            Err(InspectError::Exists(_))
        ));
        assert!(check(&registry, &path).unwrap());
        assert!(show(&registry, &path, Some(1)).unwrap());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn check_flags_trailing_bytes() {
        let registry = registry();
        let path = temp_file("trailing");
        let mut bytes = registry.serialize(&tilepack_codec::Value::Int(1)).unwrap();
        bytes.push(b'N');
        std::fs::write(&path, &bytes).unwrap();

        assert!(!check(&registry, &path).unwrap());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn corrupt_file_is_a_decode_error() {
        let registry = registry();
        let path = temp_file("corrupt");
        std::fs::write(&path, b"sI\x80").unwrap();

        assert!(matches!(
            check(&registry, &path),
            Err(InspectError::Decode {
                source: DecodeError::TruncatedBuffer { .. },
                ..
            })
        ));
        let _ = std::fs::remove_file(&path);
    }
}
