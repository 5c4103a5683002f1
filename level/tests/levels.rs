use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tilepack_codec::{RegistryBuilder, TypeRegistry, Value, ValueMap};
use tilepack_level::level::{decode_map, encode_map, level_file_name, level_path};
use tilepack_level::{
    Behavior, Behaviors, Entity, LevelError, Map, TileLayer, TilesetCache, load_level,
    load_level_or_default, register_level_types, save_level,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Records every message it receives as `(receiver, sender, name)`.
#[derive(Clone, Default)]
struct Inbox(Arc<Mutex<Vec<(String, String, String)>>>);

impl Behavior for Inbox {
    fn on_message(&self, entity: &Entity, sender: &Entity, name: &str, _arg: &Value) {
        self.0.lock().unwrap().push((
            entity.name().to_owned(),
            sender.name().to_owned(),
            name.to_owned(),
        ));
    }
}

struct Ticker(Arc<AtomicUsize>);

impl Behavior for Ticker {
    fn update(&self, _entity: &Entity) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn registry_with(behaviors: Behaviors) -> TypeRegistry {
    let mut builder = RegistryBuilder::new();
    register_level_types(&mut builder).unwrap();
    builder
        .insert_resource(TilesetCache::new("tiles"))
        .insert_resource(behaviors);
    builder.build()
}

fn registry() -> TypeRegistry {
    let mut behaviors = Behaviors::new();
    behaviors.insert("inbox", Inbox::default());
    behaviors.insert("idle", Inbox::default());
    registry_with(behaviors)
}

fn sample_map(registry: &TypeRegistry) -> Map {
    let cache = registry.resource::<TilesetCache>().unwrap();
    let mut ground = TileLayer::new(4, 3, cache.get_or_create("blue"));
    ground.fill((0, 0), (3, 0), 5);
    ground.set(2, 2, 129);
    let overlay = TileLayer::new(4, 3, cache.get_or_create("cave"));

    let mut attributes = ValueMap::new();
    attributes.insert("x", 3);
    attributes.insert("y", -1);
    let hero = Entity::new("hero", "inbox", attributes);
    let door = Entity::new("door", "idle", ValueMap::new());
    Map::new(vec![ground, overlay], vec![hero, door])
}

/// Fresh per-test directory under the system temp dir.
fn temp_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("tilepack-level-{}-{test}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

// ---------------------------------------------------------------------------
// Cyclic reconstruction
// ---------------------------------------------------------------------------

#[test]
fn decoded_back_edges_point_at_decoded_map() {
    let registry = registry();
    let original = sample_map(&registry);

    let bytes = encode_map(&original, &registry).unwrap();
    let decoded = decode_map(&bytes, &registry).unwrap();

    assert_eq!(decoded, original);
    assert!(!decoded.ptr_eq(&original));
    assert_eq!(decoded.entities().len(), 2);
    for entity in decoded.entities() {
        let owner = entity.map().expect("back-edge is set");
        assert!(owner.ptr_eq(&decoded));
    }
}

#[test]
fn decoded_layers_share_cached_tilesets() {
    let registry = registry();
    let bytes = encode_map(&sample_map(&registry), &registry).unwrap();
    let decoded = decode_map(&bytes, &registry).unwrap();

    let cache = registry.resource::<TilesetCache>().unwrap();
    assert!(Arc::ptr_eq(decoded.layers()[0].tileset(), &cache.get_or_create("blue")));
    assert!(Arc::ptr_eq(decoded.layers()[1].tileset(), &cache.get_or_create("cave")));
    assert_eq!(decoded.layers()[0].get(2, 2), Some(129));
}

#[test]
fn reencoding_is_byte_identical() {
    let registry = registry();
    let first = encode_map(&sample_map(&registry), &registry).unwrap();
    let second = encode_map(&decode_map(&first, &registry).unwrap(), &registry).unwrap();
    assert_eq!(first, second);
}

#[test]
fn messages_travel_through_the_map() {
    let inbox = Inbox::default();
    let mut behaviors = Behaviors::new();
    behaviors.insert("inbox", inbox.clone());
    behaviors.insert("idle", Inbox::default());
    let registry = registry_with(behaviors);

    let bytes = encode_map(&sample_map(&registry), &registry).unwrap();
    let map = decode_map(&bytes, &registry).unwrap();

    let door = map.entity("door").unwrap();
    assert_eq!(door.send_message("hero", "open", &Value::Bool(true)), 1);
    assert_eq!(door.send_message("nobody", "open", &Value::Null), 0);
    assert_eq!(
        *inbox.0.lock().unwrap(),
        [("hero".to_owned(), "door".to_owned(), "open".to_owned())]
    );
}

#[test]
fn map_update_runs_every_script() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let mut behaviors = Behaviors::new();
    behaviors.insert("inbox", Ticker(ticks.clone()));
    behaviors.insert("idle", Ticker(ticks.clone()));
    let registry = registry_with(behaviors);

    let bytes = encode_map(&sample_map(&registry), &registry).unwrap();
    let map = decode_map(&bytes, &registry).unwrap();
    map.update();
    map.update();
    assert_eq!(ticks.load(Ordering::SeqCst), 4);
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

#[test]
fn level_names() {
    assert_eq!(level_file_name(0), "level0");
    assert_eq!(level_file_name(12), "level12");
    assert!(level_path(std::path::Path::new("maps"), 3).ends_with("level3"));
}

#[test]
fn save_then_load() {
    let dir = temp_dir("save_then_load");
    let registry = registry();
    let map = sample_map(&registry);
    let path = level_path(&dir, 1);

    save_level(&path, &map, &registry).unwrap();
    let loaded = load_level(&path, &registry).unwrap();
    assert_eq!(loaded, map);
    assert!(loaded.entity("hero").unwrap().map().unwrap().ptr_eq(&loaded));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_file_falls_back_to_default() {
    let dir = temp_dir("missing_file");
    let registry = registry();
    let path = level_path(&dir, 7);

    assert!(matches!(
        load_level(&path, &registry),
        Err(LevelError::NotFound { .. })
    ));
    let map = load_level_or_default(&path, &registry).unwrap();
    assert_eq!(map.layers().len(), 3);
    assert_eq!(map.layers()[0].width(), 16);
    assert!(map.entities().is_empty());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn invalid_file_is_reported() {
    let dir = temp_dir("invalid_file");
    let registry = registry();

    let garbage = level_path(&dir, 0);
    std::fs::write(&garbage, b"UsI\x03Map").unwrap();
    assert!(matches!(
        load_level_or_default(&garbage, &registry),
        Err(LevelError::InvalidMap(_))
    ));

    let not_a_map = level_path(&dir, 1);
    std::fs::write(&not_a_map, registry.serialize(&Value::from("map")).unwrap()).unwrap();
    assert!(matches!(
        load_level(&not_a_map, &registry),
        Err(LevelError::NotAMap { found: "text" })
    ));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn default_map_roundtrips() {
    let registry = registry();
    let map = Map::new_default(registry.resource::<TilesetCache>().unwrap());
    let bytes = encode_map(&map, &registry).unwrap();
    assert_eq!(decode_map(&bytes, &registry).unwrap(), map);
}
