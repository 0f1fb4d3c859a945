//! Read-through cache of resolved collection handles.
//!
//! Every component consults this instead of re-reading the meta table.
//! Concurrent first access may populate the same entry twice; the
//! second resolve wins and is harmless.

use crate::core::error::StoreError;
use crate::core::schema::Collection;
use rustc_hash::FxHashMap;
use std::sync::{Arc, RwLock};

#[derive(Default)]
pub struct CollectionRegistry {
    cache: RwLock<FxHashMap<String, Arc<Collection>>>,
}

impl CollectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached handle for `name`, loading it through `load`
    /// on a miss. `load` returning `Ok(None)` (collection absent) is
    /// not cached, so a later ensure pass is picked up.
    pub fn get_or_load<F>(&self, name: &str, load: F) -> Result<Option<Arc<Collection>>, StoreError>
    where
        F: FnOnce() -> Result<Option<Collection>, StoreError>,
    {
        if let Some(hit) = self
            .cache
            .read()
            .map_err(|_| StoreError::Validation("registry lock poisoned".to_string()))?
            .get(name)
        {
            return Ok(Some(hit.clone()));
        }
        let Some(loaded) = load()? else {
            return Ok(None);
        };
        let handle = Arc::new(loaded);
        self.cache
            .write()
            .map_err(|_| StoreError::Validation("registry lock poisoned".to_string()))?
            .insert(name.to_string(), handle.clone());
        Ok(Some(handle))
    }

    /// Drop a cached handle after a schema mutation.
    pub fn invalidate(&self, name: &str) {
        if let Ok(mut cache) = self.cache.write() {
            cache.remove(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{CollectionKind, RuleSet};

    fn collection(name: &str) -> Collection {
        Collection {
            id: format!("id_{name}"),
            name: name.to_string(),
            kind: CollectionKind::Base,
            fields: Vec::new(),
            indexes: Vec::new(),
            rules: RuleSet::default(),
            options: serde_json::json!({}),
        }
    }

    #[test]
    fn loads_once_and_serves_from_cache() {
        let registry = CollectionRegistry::new();
        let mut loads = 0;
        let first = registry
            .get_or_load("orgs", || {
                loads += 1;
                Ok(Some(collection("orgs")))
            })
            .unwrap()
            .unwrap();
        let second = registry
            .get_or_load("orgs", || {
                loads += 1;
                Ok(Some(collection("orgs")))
            })
            .unwrap()
            .unwrap();
        assert_eq!(loads, 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn absent_collections_are_not_cached() {
        let registry = CollectionRegistry::new();
        let miss = registry.get_or_load("later", || Ok(None)).unwrap();
        assert!(miss.is_none());

        // The collection appears on a later pass and must be resolvable.
        let hit = registry
            .get_or_load("later", || Ok(Some(collection("later"))))
            .unwrap();
        assert!(hit.is_some());
    }

    #[test]
    fn invalidate_forces_a_reload() {
        let registry = CollectionRegistry::new();
        registry
            .get_or_load("orgs", || Ok(Some(collection("orgs"))))
            .unwrap();
        registry.invalidate("orgs");
        let mut reloaded = false;
        registry
            .get_or_load("orgs", || {
                reloaded = true;
                Ok(Some(collection("orgs")))
            })
            .unwrap();
        assert!(reloaded);
    }
}
