//! Key-prefixing discipline over [`Cache`]: each namespace is a scoped view
//! whose operations prefix every key with `"<name>::"` before delegating.

use std::time::Duration;

use dashmap::DashMap;

use crate::cache::Cache;
use crate::config::CacheConfig;
use crate::path;

/// Wraps a [`Cache`] with a `namespace(name) -> NamespaceView` surface.
/// Views are memoized per name so repeated calls with the same name return
/// an equivalent, cheaply-cloned handle rather than re-deriving the prefix.
pub struct NamespacedCache<V> {
    cache: Cache<V>,
    views: DashMap<String, NamespaceView<V>>,
}

impl<V: Clone + Send + Sync + 'static> NamespacedCache<V> {
    pub fn new(config: CacheConfig<V>) -> Self {
        Self::from_cache(Cache::new(config))
    }

    pub fn from_cache(cache: Cache<V>) -> Self {
        Self {
            cache,
            views: DashMap::new(),
        }
    }

    pub fn namespace(&self, name: &str) -> NamespaceView<V> {
        if let Some(view) = self.views.get(name) {
            return view.clone();
        }
        let view = NamespaceView {
            cache: self.cache.clone(),
            prefix: path::namespace_prefix(name),
        };
        self.views.insert(name.to_string(), view.clone());
        view
    }

    pub fn cache(&self) -> &Cache<V> {
        &self.cache
    }
}

/// A prefix-scoped view onto a [`NamespacedCache`]'s underlying cache.
/// Cheap to clone: it's just the shared `Cache` handle plus a prefix.
#[derive(Clone)]
pub struct NamespaceView<V> {
    cache: Cache<V>,
    prefix: String,
}

impl<V: Clone + Send + Sync + 'static> NamespaceView<V> {
    fn scoped(&self, key: &str) -> String {
        path::with_prefix(&self.prefix, key)
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.cache.get(&self.scoped(key))
    }

    pub fn set(&self, key: &str, value: V, ttl: Option<Duration>) {
        self.cache.set(self.scoped(key), value, ttl);
    }

    pub fn set_permanent(&self, key: &str, value: V) {
        self.cache.set_permanent(self.scoped(key), value);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.cache.contains_key(&self.scoped(key))
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.cache.remove(&self.scoped(key))
    }

    /// Removes every key in the underlying cache prefixed by this
    /// namespace, leaving every other namespace (and the root) untouched.
    pub fn clear(&self) {
        for key in self.cache.keys_with_prefix(&self.prefix) {
            self.cache.remove(&key);
        }
    }

    /// Keys in this namespace, with the namespace prefix stripped.
    pub fn keys(&self) -> Vec<String> {
        self.cache
            .keys_with_prefix(&self.prefix)
            .into_iter()
            .filter_map(|full| path::strip_prefix(&full, &self.prefix).map(str::to_string))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Composes a nested namespace, e.g. `users::profiles::`.
    pub fn namespace(&self, name: &str) -> NamespaceView<V> {
        NamespaceView {
            cache: self.cache.clone(),
            prefix: format!("{}{}", self.prefix, path::namespace_prefix(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaces_isolate_keys_with_the_same_local_name() {
        let namespaced: NamespacedCache<i32> = NamespacedCache::new(CacheConfig::new());
        namespaced.namespace("users").set("1", 10, None);
        namespaced.namespace("sessions").set("1", 20, None);
        assert_eq!(namespaced.namespace("users").get("1"), Some(10));
        assert_eq!(namespaced.namespace("sessions").get("1"), Some(20));
    }

    #[test]
    fn clearing_a_namespace_preserves_other_namespaces() {
        let namespaced: NamespacedCache<i32> = NamespacedCache::new(CacheConfig::new());
        namespaced.namespace("users").set("1", 10, None);
        namespaced.namespace("sessions").set("1", 20, None);
        namespaced.namespace("sessions").clear();
        assert_eq!(namespaced.namespace("users").get("1"), Some(10));
        assert_eq!(namespaced.namespace("sessions").get("1"), None);
    }

    #[test]
    fn keys_strip_the_namespace_prefix() {
        let namespaced: NamespacedCache<i32> = NamespacedCache::new(CacheConfig::new());
        let users = namespaced.namespace("users");
        users.set("1", 1, None);
        users.set("2", 2, None);
        let mut keys = users.keys();
        keys.sort();
        assert_eq!(keys, vec!["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn nested_namespaces_compose_prefixes() {
        let namespaced: NamespacedCache<i32> = NamespacedCache::new(CacheConfig::new());
        let profiles = namespaced.namespace("users").namespace("profiles");
        profiles.set("1", 7, None);
        assert_eq!(namespaced.namespace("users").get("profiles::1"), Some(7));
    }

    #[test]
    fn views_are_memoized_by_name() {
        let namespaced: NamespacedCache<i32> = NamespacedCache::new(CacheConfig::new());
        namespaced.namespace("users").set("1", 1, None);
        assert_eq!(namespaced.namespace("users").get("1"), Some(1));
    }
}
