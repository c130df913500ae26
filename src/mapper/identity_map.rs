//! Identity map - one live instance per primary key

use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::Mutex;
use crate::domain::{shared, Entity, Shared};

/// Keyed store of the live instances a mapper has handed out.
///
/// The map never holds two distinct instances for one key: loading a row
/// whose key is already present yields the cached instance, and storing a
/// different handle for a present key copies its fields into the cached one.
/// Entity locks are never taken while the map's own mutex is held.
pub struct IdentityMap<T: Entity> {
    entries: Mutex<HashMap<i64, Shared<T>>>,
}

impl<T: Entity> Default for IdentityMap<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Entity> IdentityMap<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: i64) -> Option<Shared<T>> {
        self.entries.lock().get(&id).cloned()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.entries.lock().contains_key(&id)
    }

    /// Cache a freshly loaded entity unless its key is already present.
    ///
    /// Returns whichever instance ends up cached.
    pub fn load(&self, id: i64, entity: T) -> Shared<T> {
        let mut entries = self.entries.lock();
        entries.entry(id).or_insert_with(|| shared(entity)).clone()
    }

    /// Like [`IdentityMap::load`] for an entity that is already shared
    pub fn load_shared(&self, id: i64, entity: Shared<T>) -> Shared<T> {
        let mut entries = self.entries.lock();
        entries.entry(id).or_insert(entity).clone()
    }

    /// Store `entity` as the instance for `id` after a successful write.
    ///
    /// If another instance is cached for that key, it receives the field
    /// values of `entity` and stays the canonical instance.
    pub fn put(&self, id: i64, entity: &Shared<T>) -> Shared<T> {
        let cached = {
            let mut entries = self.entries.lock();
            entries.entry(id).or_insert_with(|| entity.clone()).clone()
        };
        if !Arc::ptr_eq(&cached, entity) {
            let source = entity.read().clone();
            cached.write().assign(&source);
        }
        cached
    }

    pub fn remove(&self, id: i64) -> Option<Shared<T>> {
        self.entries.lock().remove(&id)
    }

    /// Remove every cached instance matching `doomed`, returning their keys.
    ///
    /// The predicate runs on a snapshot, outside the map's mutex. An entry
    /// replaced in the meantime is left alone.
    pub fn evict_where<F>(&self, doomed: F) -> Vec<i64>
    where
        F: Fn(&T) -> bool,
    {
        let snapshot: Vec<(i64, Shared<T>)> = self
            .entries
            .lock()
            .iter()
            .map(|(id, entity)| (*id, entity.clone()))
            .collect();
        let matching: Vec<(i64, Shared<T>)> = snapshot
            .into_iter()
            .filter(|(_, entity)| doomed(&*entity.read()))
            .collect();

        let mut entries = self.entries.lock();
        let mut evicted = Vec::with_capacity(matching.len());
        for (id, entity) in &matching {
            if entries.get(id).is_some_and(|cached| Arc::ptr_eq(cached, entity)) {
                entries.remove(id);
                evicted.push(*id);
            }
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::City;

    fn city(id: i64, name: &str) -> City {
        let mut c = City::new("2000", name);
        c.id = Some(id);
        c
    }

    #[test]
    fn test_load_keeps_first_instance() {
        let map = IdentityMap::new();
        let first = map.load(1, city(1, "Neuchâtel"));
        let second = map.load(1, city(1, "Stale copy"));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.read().name, "Neuchâtel");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_put_updates_cached_instance_in_place() {
        let map = IdentityMap::new();
        let cached = map.load(1, city(1, "Neuchatel"));
        let detached = shared(city(1, "Neuchâtel"));

        let canonical = map.put(1, &detached);

        assert!(Arc::ptr_eq(&canonical, &cached));
        assert_eq!(cached.read().name, "Neuchâtel");
    }

    #[test]
    fn test_put_same_instance() {
        let map = IdentityMap::new();
        let handle = shared(city(3, "Bern"));
        let canonical = map.put(3, &handle);
        assert!(Arc::ptr_eq(&canonical, &handle));
        assert!(map.contains(3));
    }

    #[test]
    fn test_remove() {
        let map = IdentityMap::new();
        map.load(7, city(7, "Sion"));
        assert!(map.remove(7).is_some());
        assert!(map.remove(7).is_none());
        assert!(map.is_empty());
    }

    #[test]
    fn test_evict_where() {
        let map = IdentityMap::new();
        map.load(1, city(1, "Sion"));
        map.load(2, city(2, "Sierre"));
        map.load(3, city(3, "Bern"));

        let mut evicted = map.evict_where(|c| c.name.starts_with('S'));
        evicted.sort();

        assert_eq!(evicted, vec![1, 2]);
        assert_eq!(map.len(), 1);
        assert!(map.contains(3));
        assert!(map.evict_where(|_| false).is_empty());
    }
}
