use std::ops::Deref;
use std::sync::Arc;

use tilepack_codec::{DecodeError, Decoder, EncodeError, Encoder, Packed, Value};

use crate::entity::Entity;
use crate::layer::TileLayer;
use crate::tileset::{DEFAULT_TILESET, TilesetCache};

/// Registered name of [`Map`].
pub const MAP_TYPE: &str = "Map";

/// Number of layers in a default map: ground, decoration, overhead.
pub const DEFAULT_LAYER_COUNT: usize = 3;

/// Width and height of each layer in a default map.
pub const DEFAULT_MAP_SIZE: usize = 16;

/// Contents of a [`Map`]. Entities point back here through a `Weak`.
#[derive(Debug, PartialEq)]
pub struct MapData {
    layers: Vec<TileLayer>,
    entities: Vec<Entity>,
}

impl MapData {
    pub fn layers(&self) -> &[TileLayer] {
        &self.layers
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// First entity called `name`.
    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name() == name)
    }
}

/// Shared handle to a tile map and the entities placed on it.
///
/// Constructing a map wires every entity's back-edge to it, so
/// [`Entity::map`] on any of its entities returns a handle to this same
/// allocation. Packed layout: the layers as a list, then the entities as
/// a set.
#[derive(Debug, Clone)]
pub struct Map(Arc<MapData>);

impl Map {
    /// Build a map and attach `entities` to it.
    pub fn new(layers: Vec<TileLayer>, mut entities: Vec<Entity>) -> Self {
        Self(Arc::new_cyclic(|weak| {
            for entity in &mut entities {
                entity.set_map(weak.clone());
            }
            MapData { layers, entities }
        }))
    }

    /// The editor's starting map: three empty 16x16 layers on the default
    /// tileset and no entities.
    pub fn new_default(cache: &TilesetCache) -> Self {
        Self::with_size(cache, DEFAULT_MAP_SIZE, DEFAULT_MAP_SIZE, DEFAULT_TILESET)
    }

    /// Empty layers of the given size on `tileset`, and no entities.
    pub fn with_size(cache: &TilesetCache, width: usize, height: usize, tileset: &str) -> Self {
        let tileset = cache.get_or_create(tileset);
        let layers = (0..DEFAULT_LAYER_COUNT)
            .map(|_| TileLayer::new(width, height, tileset.clone()))
            .collect();
        Self::new(layers, Vec::new())
    }

    pub(crate) fn from_data(data: Arc<MapData>) -> Self {
        Self(data)
    }

    /// Whether both handles refer to the same map.
    pub fn ptr_eq(&self, other: &Map) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Run every entity's update hook.
    pub fn update(&self) {
        for entity in &self.0.entities {
            entity.update();
        }
    }

    /// Take the layers and entities back for editing. Fails, returning the
    /// map unchanged, while other handles to it are alive.
    ///
    /// The returned entities are detached; pass them to [`Map::new`] again
    /// to rebuild.
    pub fn into_parts(self) -> Result<(Vec<TileLayer>, Vec<Entity>), Map> {
        let data = Arc::try_unwrap(self.0).map_err(Map)?;
        let mut entities = data.entities;
        for entity in &mut entities {
            entity.set_map(std::sync::Weak::new());
        }
        Ok((data.layers, entities))
    }
}

impl Deref for Map {
    type Target = MapData;

    fn deref(&self) -> &MapData {
        &self.0
    }
}

/// Structural comparison of the map contents.
impl PartialEq for Map {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.0 == *other.0
    }
}

impl Packed for Map {
    fn dump(&self, encoder: &mut Encoder<'_>) -> Result<(), EncodeError> {
        let layers = self.layers.iter().cloned().map(Value::packed).collect();
        encoder.write(&Value::List(layers))?;
        let entities = self.entities.iter().cloned().map(Value::record).collect();
        encoder.write(&Value::Set(entities))
    }

    fn load(decoder: &mut Decoder<'_, '_>) -> Result<Self, DecodeError> {
        let layers = decode_all::<TileLayer>(decoder, "layers", "TileLayer")?;
        let entities = decode_all::<Entity>(decoder, "entities", "Entity")?;
        Ok(Map::new(layers, entities))
    }
}

/// Read one container value and unwrap each element as a `T`.
fn decode_all<T: 'static>(
    decoder: &mut Decoder<'_, '_>,
    what: &str,
    expected: &str,
) -> Result<Vec<T>, DecodeError> {
    let items = decoder.read()?.into_elements().map_err(|other| {
        DecodeError::custom(format!("map {what} must be a collection, found {}", other.kind()))
    })?;
    items
        .into_iter()
        .map(|item| {
            item.into_object::<T>().map_err(|other| {
                DecodeError::custom(format!(
                    "map {what} must hold {expected} objects, found {}",
                    other.kind()
                ))
            })
        })
        .collect()
}
