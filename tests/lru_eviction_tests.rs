//! Under LRU with capacity 3, a get on "a" spares it from the next
//! eviction, which falls on "b" instead.

use cachecore::eviction::PolicyKind;
use cachecore::{Cache, CacheConfig, CacheEvent};

#[tokio::test]
async fn get_before_insert_spares_the_touched_key() {
    let config: CacheConfig<i32> = CacheConfig::new()
        .with_max_entries(3)
        .with_eviction_policy(PolicyKind::Lru)
        .with_event_stream(true);
    let cache = Cache::new(config);
    let mut sub = cache.subscribe().unwrap();

    cache.set("a", 1, None);
    cache.set("b", 2, None);
    cache.set("c", 3, None);
    cache.get("a");
    cache.set("d", 4, None);

    let mut keys = cache.keys();
    keys.sort();
    assert_eq!(keys, vec!["a".to_string(), "c".to_string(), "d".to_string()]);

    let mut evicted = Vec::new();
    while let Ok(event) = sub.try_recv() {
        if let CacheEvent::Evicted { key, .. } = event {
            evicted.push(key);
        }
    }
    assert_eq!(evicted, vec!["b".to_string()]);
}
