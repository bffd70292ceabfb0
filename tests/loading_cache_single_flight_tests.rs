//! 10 concurrent callers racing the same miss invoke the loader exactly
//! once and all observe its result.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use cachecore::{CacheConfig, LoadingCache};

#[tokio::test]
async fn ten_concurrent_callers_share_one_loader_invocation() {
    let call_count = Arc::new(AtomicU32::new(0));
    let counter = call_count.clone();
    let loading: LoadingCache<String, _> = LoadingCache::new(CacheConfig::new(), move |key| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(format!("{key}!"))
        }
    });
    let loading = Arc::new(loading);

    let mut handles = Vec::with_capacity(10);
    for _ in 0..10 {
        let loading = loading.clone();
        handles.push(tokio::spawn(async move { loading.get("x").await.unwrap() }));
    }

    let results = futures::future::join_all(handles).await;
    for result in results {
        assert_eq!(result.unwrap(), "x!");
    }
    assert_eq!(call_count.load(Ordering::SeqCst), 1);
}
