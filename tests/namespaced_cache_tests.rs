//! Clearing one namespace never touches another namespace sharing the
//! same local key.

use cachecore::{CacheConfig, NamespacedCache};

#[test]
fn clearing_sessions_namespace_preserves_users_namespace() {
    let namespaced: NamespacedCache<&str> = NamespacedCache::new(CacheConfig::new());

    namespaced.namespace("users").set("1", "A", None);
    namespaced.namespace("sessions").set("1", "B", None);

    namespaced.namespace("sessions").clear();

    assert_eq!(namespaced.namespace("users").get("1"), Some("A"));
    assert_eq!(namespaced.namespace("sessions").get("1"), None);
}
