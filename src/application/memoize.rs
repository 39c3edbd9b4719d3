// Per-argument memoization of fetch + transform pipelines
use crate::error::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use tokio::sync::OnceCell;

/// The serialized argument tuple of a fetch call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new<A: Serialize + ?Sized>(args: &A) -> Result<Self> {
        Ok(Self(serde_json::to_string(args)?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Caches the result of one fetch operation per distinct argument tuple.
///
/// Entries live as long as the cache. Concurrent first calls for the same key
/// run the fetch once; the others wait for its result. A failed fetch stores
/// nothing: the key is dropped once no caller waits on it, and the next call
/// retries. Every lookup, hits included, takes a short read lock on the key
/// map; the fetch itself runs outside the lock. Results are shared through
/// `Arc` and must be treated as read-only.
pub struct Memoized<V> {
    name: &'static str,
    entries: RwLock<HashMap<CacheKey, Arc<OnceCell<Arc<V>>>>>,
}

impl<V> Memoized<V> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get_or_try_fetch<E, F, Fut>(
        &self,
        key: CacheKey,
        fetch: F,
    ) -> std::result::Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        let cell = self.cell(&key);

        if let Some(value) = cell.get() {
            tracing::debug!("Cache hit for {} {}", self.name, key.as_str());
            return Ok(value.clone());
        }

        let fetched = cell
            .get_or_try_init(|| async {
                tracing::debug!("Cache miss for {} {}, fetching", self.name, key.as_str());
                fetch().await.map(Arc::new)
            })
            .await
            .map(Arc::clone);

        match fetched {
            Ok(value) => {
                tracing::debug!("Cache {} holds {} results", self.name, self.len());
                Ok(value)
            }
            Err(e) => {
                self.evict_empty(&key, &cell);
                Err(e)
            }
        }
    }

    /// Number of keys with a stored result.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cell(&self, key: &CacheKey) -> Arc<OnceCell<Arc<V>>> {
        if let Some(cell) = self
            .entries
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
        {
            return cell.clone();
        }

        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(key.clone())
            .or_default()
            .clone()
    }

    /// Drop `key` if it still maps to `cell`, the cell is empty, and only the
    /// map and this caller hold it.
    fn evict_empty(&self, key: &CacheKey, cell: &Arc<OnceCell<Arc<V>>>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let unused = entries.get(key).is_some_and(|current| {
            Arc::ptr_eq(current, cell) && !current.initialized() && Arc::strong_count(current) <= 2
        });
        if unused {
            entries.remove(key);
        }
    }
}
