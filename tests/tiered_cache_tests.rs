//! An L1 eviction doesn't lose the value — it's still in L2, and a
//! subsequent read promotes it back into L1.

use std::sync::Arc;

use cachecore::eviction::PolicyKind;
use cachecore::{Cache, CacheConfig, MemoryStore, Store, TieredCache};

#[tokio::test]
async fn eviction_from_l1_is_recoverable_via_l2_promotion() {
    let l1: Cache<i32> = Cache::new(
        CacheConfig::new()
            .with_max_entries(1)
            .with_eviction_policy(PolicyKind::Fifo),
    );
    let l2: Arc<dyn Store<i32>> = Arc::new(MemoryStore::new());
    let tiered = TieredCache::new(l1, l2.clone())
        .with_write_through(true)
        .with_promote_on_access(true);

    tiered.set("x", 1, None).await.unwrap();
    tiered.set("y", 2, None).await.unwrap(); // L1 cap 1 evicts "x"
    assert!(tiered.l1().get("x").is_none());

    let value = tiered.get("x").await.unwrap();
    assert_eq!(value, Some(1), "recovered from L2");
    assert!(tiered.l1().get("x").is_some(), "promoted back into L1");
    assert!(l2.get("x").await.unwrap().is_some(), "L2 still retains x");
}
