//! # Tilepack Level
//!
//! Tile-map domain types and the level files the editor reads and writes.
//!
//! ## Core Types
//!
//! - [`Map`]: Shared handle to the layers and entities of one level
//! - [`TileLayer`]: Rectangular grid of tile indices on a [`Tileset`]
//! - [`Entity`]: Scripted object with a back-edge to its map
//! - [`TilesetCache`] / [`Behaviors`]: Decode resources for tilesets and
//!   entity scripts
//!
//! Call [`register_level_types`] on a [`RegistryBuilder`] before encoding
//! or decoding any of these.

mod entity;
pub mod level;
mod layer;
mod map;
mod tileset;

pub use entity::{Behavior, Behaviors, ENTITY_EXCLUDED, ENTITY_TYPE, Entity};
pub use layer::{TILE_LAYER_TYPE, TileLayer};
pub use level::{LevelError, load_level, load_level_or_default, save_level};
pub use map::{DEFAULT_LAYER_COUNT, DEFAULT_MAP_SIZE, MAP_TYPE, Map, MapData};
pub use tileset::{DEFAULT_TILESET, TILE_SIZE, Tileset, TilesetCache};

use tilepack_codec::{RegistrationError, RegistryBuilder};

/// Register [`TileLayer`], [`Entity`] and [`Map`] under the names existing
/// level files use.
pub fn register_level_types(
    builder: &mut RegistryBuilder,
) -> Result<&mut RegistryBuilder, RegistrationError> {
    builder
        .register_packed::<TileLayer>(TILE_LAYER_TYPE)?
        .register_record::<Entity>(ENTITY_TYPE, ENTITY_EXCLUDED)?
        .register_packed::<Map>(MAP_TYPE)
}
