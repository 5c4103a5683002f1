use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

/// Tileset used by freshly created maps.
pub const DEFAULT_TILESET: &str = "blue";

/// Size of one tile in pixels.
pub const TILE_SIZE: (u32, u32) = (32, 32);

/// A named tile sheet. Only the name is persisted; the image path is
/// derived from the tileset directory on load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tileset {
    name: String,
    image_path: PathBuf,
}

impl Tileset {
    pub fn new(name: impl Into<String>, image_path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            image_path: image_path.into(),
        }
    }

    /// Tileset `name` backed by `<dir>/<name>.png`.
    pub fn in_dir(dir: &Path, name: impl Into<String>) -> Self {
        let name = name.into();
        let image_path = dir.join(format!("{name}.png"));
        Self { name, image_path }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }
}

/// Deduplicates tilesets by name.
///
/// Layers that name the same tileset share one `Arc<Tileset>`. Insert the
/// cache into the type registry as a resource so that decoded layers
/// resolve through it.
#[derive(Debug)]
pub struct TilesetCache {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Arc<Tileset>>>,
}

impl Default for TilesetCache {
    fn default() -> Self {
        Self::new(".")
    }
}

impl TilesetCache {
    /// Create an empty cache resolving images under `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Get the tileset called `name`, creating it on first use.
    pub fn get_or_create(&self, name: &str) -> Arc<Tileset> {
        // Fast path: read lock
        if let Some(tileset) = self.cache.read().get(name) {
            return Arc::clone(tileset);
        }

        // Slow path: write lock
        let mut cache = self.cache.write();
        cache
            .entry(name.to_owned())
            .or_insert_with(|| {
                log::debug!("Tileset \"{name}\" cached from {}", self.dir.display());
                Arc::new(Tileset::in_dir(&self.dir, name))
            })
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Tileset>> {
        self.cache.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_same_arc() {
        let cache = TilesetCache::new("assets");
        let a = cache.get_or_create("blue");
        let b = cache.get_or_create("blue");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
        assert_eq!(a.image_path(), Path::new("assets/blue.png"));
    }

    #[test]
    fn different_names_are_distinct() {
        let cache = TilesetCache::default();
        let a = cache.get_or_create("blue");
        let b = cache.get_or_create("cave");
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(cache.get("cave").is_some());
        assert!(cache.get("forest").is_none());
    }
}
