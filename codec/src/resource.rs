use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;

/// A single type-erased resource.
struct ResourceEntry {
    value: Box<dyn Any + Send + Sync>,
    type_name: &'static str,
}

/// Typed singletons available to `load` and `finalize` hooks.
///
/// Resources are inserted while the registry is being built and are
/// read-only afterwards. Types that need to mutate shared state (a cache,
/// for instance) carry their own interior lock.
#[derive(Default)]
pub struct Resources {
    entries: HashMap<TypeId, ResourceEntry>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a resource of type T.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) {
        let replaced = self.entries.insert(
            TypeId::of::<T>(),
            ResourceEntry {
                value: Box::new(value),
                type_name: type_name::<T>(),
            },
        );
        if replaced.is_some() {
            log::debug!("Replaced resource `{}`", type_name::<T>());
        }
    }

    /// Returns the resource of type T, if present.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.value.downcast_ref::<T>())
    }

    /// Returns whether a resource of type T exists.
    pub fn contains<T: 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Type names of all stored resources, for diagnostics.
    pub fn type_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.entries.values().map(|entry| entry.type_name)
    }
}

impl std::fmt::Debug for Resources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.type_names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Palette(Vec<u32>);

    #[test]
    fn insert_and_get() {
        let mut resources = Resources::new();
        assert!(resources.get::<Palette>().is_none());

        resources.insert(Palette(vec![1, 2]));
        assert!(resources.contains::<Palette>());
        assert_eq!(resources.get::<Palette>().map(|p| p.0.len()), Some(2));
    }

    #[test]
    fn insert_replaces() {
        let mut resources = Resources::new();
        resources.insert(Palette(vec![1]));
        resources.insert(Palette(vec![1, 2, 3]));
        assert_eq!(resources.len(), 1);
        assert_eq!(resources.get::<Palette>().map(|p| p.0.len()), Some(3));
    }
}
