use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use tilepack_codec::{DecodeError, Fields, FinalizeContext, Record, Value, ValueMap};

use crate::map::{Map, MapData};

/// Registered name of [`Entity`].
pub const ENTITY_TYPE: &str = "Entity";

/// Entity fields that never reach the wire.
pub const ENTITY_EXCLUDED: &[&str] = &["script", "map"];

/// Per-entity game logic.
///
/// Behaviors are looked up by name in a [`Behaviors`] catalog when an
/// entity is decoded. Both hooks default to doing nothing.
pub trait Behavior: Send + Sync {
    fn update(&self, _entity: &Entity) {}

    fn on_message(&self, _entity: &Entity, _sender: &Entity, _name: &str, _arg: &Value) {}
}

/// Named behaviors available to decoded entities.
///
/// Insert into the type registry as a resource; without it, decoded
/// entities keep their script name but have no behavior attached.
#[derive(Default)]
pub struct Behaviors {
    by_name: HashMap<String, Arc<dyn Behavior>>,
}

impl Behaviors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, behavior: impl Behavior + 'static) -> &mut Self {
        self.by_name.insert(name.into(), Arc::new(behavior));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Behavior>> {
        self.by_name.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }
}

impl fmt::Debug for Behaviors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.by_name.keys()).finish()
    }
}

/// A scripted object placed on a map.
///
/// `script` and `map` are rebuilt on decode: `script` from `script_name`
/// in [`Record::finalize`], `map` by the owning [`Map`] once it exists.
#[derive(Fields, Clone, Default)]
pub struct Entity {
    name: String,
    #[field(transient)]
    script: Option<Arc<dyn Behavior>>,
    script_name: String,
    attributes: ValueMap,
    #[field(transient)]
    map: Weak<MapData>,
}

impl Entity {
    /// A detached entity. An empty `script_name` means no behavior.
    pub fn new(name: impl Into<String>, script_name: impl Into<String>, attributes: ValueMap) -> Self {
        Self {
            name: name.into(),
            script: None,
            script_name: script_name.into(),
            attributes,
            map: Weak::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    pub fn script(&self) -> Option<&Arc<dyn Behavior>> {
        self.script.as_ref()
    }

    /// Resolve `script_name` against `behaviors`.
    ///
    /// Returns `false` and leaves the entity unscripted if the name is not
    /// in the catalog.
    pub fn attach_script(&mut self, behaviors: &Behaviors) -> bool {
        self.script = behaviors.get(&self.script_name);
        self.script.is_some()
    }

    pub fn attributes(&self) -> &ValueMap {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut ValueMap {
        &mut self.attributes
    }

    /// The map this entity belongs to, if it is still alive.
    pub fn map(&self) -> Option<Map> {
        self.map.upgrade().map(Map::from_data)
    }

    pub(crate) fn set_map(&mut self, map: Weak<MapData>) {
        self.map = map;
    }

    pub fn update(&self) {
        if let Some(script) = &self.script {
            script.update(self);
        }
    }

    pub fn on_message(&self, sender: &Entity, name: &str, arg: &Value) {
        if let Some(script) = &self.script {
            script.on_message(self, sender, name, arg);
        }
    }

    /// Deliver a message to every entity on the same map named `target`.
    /// Returns how many entities received it.
    pub fn send_message(&self, target: &str, name: &str, arg: &Value) -> usize {
        let Some(map) = self.map() else {
            log::debug!("Entity '{}' is not on a map, message '{name}' dropped", self.name);
            return 0;
        };
        let mut delivered = 0;
        for entity in map.entities().iter().filter(|e| e.name == target) {
            entity.on_message(self, name, arg);
            delivered += 1;
        }
        delivered
    }
}

impl Record for Entity {
    fn finalize(&mut self, ctx: &FinalizeContext<'_>) -> Result<(), DecodeError> {
        let Some(behaviors) = ctx.resource::<Behaviors>() else {
            return Ok(());
        };
        if self.script_name.is_empty() {
            return Ok(());
        }
        if !self.attach_script(behaviors) {
            return Err(ctx.error(format!(
                "entity '{}' uses unknown behavior '{}'",
                self.name, self.script_name
            )));
        }
        Ok(())
    }
}

/// Compares persisted state only. Scripts and map membership are ignored.
impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.script_name == other.script_name
            && self.attributes == other.attributes
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("name", &self.name)
            .field("script_name", &self.script_name)
            .field("scripted", &self.script.is_some())
            .field("attributes", &self.attributes)
            .field("on_map", &(self.map.strong_count() > 0))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tilepack_codec::{RegistryBuilder, TypeRegistry};

    struct Counter(Arc<AtomicUsize>);

    impl Behavior for Counter {
        fn update(&self, _entity: &Entity) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn goblin() -> Entity {
        let mut attributes = ValueMap::new();
        attributes.insert("hp", 12);
        attributes.insert("loot", Value::List(vec!["gold".into()]));
        Entity::new("goblin", "wander", attributes)
    }

    fn registry(behaviors: Option<Behaviors>) -> TypeRegistry {
        let mut builder = RegistryBuilder::new();
        builder
            .register_record::<Entity>(ENTITY_TYPE, ENTITY_EXCLUDED)
            .unwrap();
        if let Some(behaviors) = behaviors {
            builder.insert_resource(behaviors);
        }
        builder.build()
    }

    #[test]
    fn transient_fields_must_be_excluded() {
        let mut builder = RegistryBuilder::new();
        assert!(builder.register_record::<Entity>(ENTITY_TYPE, &["map"]).is_err());
    }

    #[test]
    fn wire_carries_three_fields() {
        let registry = registry(None);
        let bytes = registry.serialize(&Value::record(goblin())).unwrap();
        assert!(bytes.starts_with(b"OsI\x06EntityDI\x03sI\x04name"));
    }

    #[test]
    fn finalize_resolves_script() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut behaviors = Behaviors::new();
        behaviors.insert("wander", Counter(count.clone()));
        let registry = registry(Some(behaviors));

        let bytes = registry.serialize(&Value::record(goblin())).unwrap();
        let (value, _) = registry.deserialize(&bytes, 0).unwrap();
        let entity = value.into_object::<Entity>().unwrap();

        assert_eq!(entity, goblin());
        assert!(entity.script().is_some());
        entity.update();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_script_fails_finalize() {
        let registry = registry(Some(Behaviors::new()));
        let bytes = registry.serialize(&Value::record(goblin())).unwrap();
        assert!(matches!(
            registry.deserialize(&bytes, 0),
            Err(DecodeError::Finalize { .. })
        ));
    }

    #[test]
    fn without_catalog_script_stays_unset() {
        let registry = registry(None);
        let bytes = registry.serialize(&Value::record(goblin())).unwrap();
        let entity = registry
            .deserialize(&bytes, 0)
            .unwrap()
            .0
            .into_object::<Entity>()
            .unwrap();
        assert!(entity.script().is_none());
        assert!(entity.map().is_none());
        assert_eq!(entity.send_message("goblin", "hello", &Value::Null), 0);
    }
}
