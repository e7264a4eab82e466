//! Tag-keyed cache of rendered read views.
//!
//! Every entry is filed under an invalidation tag. [`ViewCache::invalidate`]
//! evicts all entries under a tag; the next read refetches them.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

#[derive(Clone, Default)]
pub struct ViewCache {
    inner: Arc<Mutex<CacheInner>>,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, Entry>,
    /// Bumped by every invalidation of a tag.
    generations: HashMap<String, u64>,
}

struct Entry {
    tag: String,
    value: Arc<Value>,
}

impl CacheInner {
    fn generation(&self, tag: &str) -> u64 {
        self.generations.get(tag).copied().unwrap_or(0)
    }
}

impl ViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        // Entries are plain data; a panic mid-update cannot leave them torn.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<Arc<Value>> {
        self.lock().entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn insert(&self, tag: &str, key: &str, value: Value) -> Arc<Value> {
        let value = Arc::new(value);
        self.lock().entries.insert(
            key.to_string(),
            Entry {
                tag: tag.to_string(),
                value: value.clone(),
            },
        );
        value
    }

    /// Evict every entry under `tag`. Returns how many were evicted;
    /// invalidating an empty tag is a no-op.
    pub fn invalidate(&self, tag: &str) -> usize {
        let mut inner = self.lock();
        *inner.generations.entry(tag.to_string()).or_default() += 1;

        let before = inner.entries.len();
        inner.entries.retain(|_, entry| entry.tag != tag);
        before - inner.entries.len()
    }

    /// Serve `key` from the cache or fetch it.
    ///
    /// A fetched view is only cached if no invalidation of `tag` happened
    /// while it was in flight, so a read that raced a mutation is never
    /// stored as fresh.
    pub async fn get_or_fetch<F, Fut, E>(&self, tag: &str, key: &str, fetch: F) -> Result<Arc<Value>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        let started = {
            let inner = self.lock();
            if let Some(entry) = inner.entries.get(key) {
                return Ok(entry.value.clone());
            }
            inner.generation(tag)
        };

        let value = Arc::new(fetch().await?);

        let mut inner = self.lock();
        if inner.generation(tag) == started {
            inner.entries.insert(
                key.to_string(),
                Entry {
                    tag: tag.to_string(),
                    value: value.clone(),
                },
            );
        }
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::convert::Infallible;

    #[test]
    fn invalidated_entries_are_not_served() {
        let cache = ViewCache::new();
        cache.insert("movies", "movies:list", json!([1, 2]));
        cache.insert("users", "users:1", json!({"name": "gill"}));

        assert_eq!(cache.invalidate("movies"), 1);
        assert!(cache.get("movies:list").is_none());
        assert!(cache.get("users:1").is_some());

        // Second invalidation finds nothing left.
        assert_eq!(cache.invalidate("movies"), 0);
    }

    #[test]
    fn invalidation_evicts_entries() {
        let cache = ViewCache::new();
        cache.insert("movies", "movies:list", json!([]));
        cache.insert("movies", "movies:0b6e", json!({"name": "Heat"}));
        cache.insert("users", "users:1", json!({"name": "gill"}));
        assert_eq!(cache.len(), 3);

        assert_eq!(cache.invalidate("movies"), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn failed_refetch_of_deleted_view_leaves_no_entry() {
        let cache = ViewCache::new();
        cache
            .get_or_fetch("movies", "movies:0b6e", || async { Ok::<_, Infallible>(json!({"name": "Heat"})) })
            .await
            .unwrap();

        cache.invalidate("movies");
        let result = cache
            .get_or_fetch("movies", "movies:0b6e", || async { Err::<Value, _>("not found") })
            .await;

        assert!(result.is_err());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn stale_entry_is_refetched() {
        let cache = ViewCache::new();
        let first = cache
            .get_or_fetch("movies", "movies:list", || async { Ok::<_, Infallible>(json!(1)) })
            .await
            .unwrap();
        assert_eq!(*first, json!(1));

        // Cached: the fetcher is not consulted.
        let cached = cache
            .get_or_fetch("movies", "movies:list", || async { Ok::<_, Infallible>(json!(2)) })
            .await
            .unwrap();
        assert_eq!(*cached, json!(1));

        cache.invalidate("movies");
        let refetched = cache
            .get_or_fetch("movies", "movies:list", || async { Ok::<_, Infallible>(json!(3)) })
            .await
            .unwrap();
        assert_eq!(*refetched, json!(3));
        assert_eq!(cache.get("movies:list").map(|v| (*v).clone()), Some(json!(3)));
    }

    #[tokio::test]
    async fn fetch_racing_an_invalidation_is_not_cached() {
        let cache = ViewCache::new();
        let racing = cache.clone();
        let value = cache
            .get_or_fetch("movies", "movies:list", || async move {
                racing.invalidate("movies");
                Ok::<_, Infallible>(json!("pre-mutation"))
            })
            .await
            .unwrap();

        assert_eq!(*value, json!("pre-mutation"));
        assert!(cache.get("movies:list").is_none());
    }

    #[tokio::test]
    async fn failed_fetch_caches_nothing() {
        let cache = ViewCache::new();
        let result = cache
            .get_or_fetch("movies", "movies:list", || async { Err::<Value, _>("store down") })
            .await;
        assert!(result.is_err());
        assert!(cache.is_empty());
    }
}
