use std::{num::NonZeroUsize, sync::Mutex};

use cached::{Cached, SizedCache, UnboundCache};
use tracing::info;

use super::{CacheEntry, PersistedQueryStore, StoreError};

#[derive(Debug)]
enum Entries {
  Unbounded(UnboundCache<String, CacheEntry>),
  Lru(SizedCache<String, CacheEntry>),
}

#[derive(Debug)]
pub struct InMemoryPersistedQueryStore {
  entries: Mutex<Entries>,
}

impl InMemoryPersistedQueryStore {
  pub fn unbounded() -> Self {
    info!("creating unbounded in-memory persisted queries store");

    Self {
      entries: Mutex::new(Entries::Unbounded(UnboundCache::new())),
    }
  }

  /// A store holding at most `max_size` entries, evicting the least recently used one.
  pub fn with_max_size(max_size: NonZeroUsize) -> Self {
    info!(
      "creating in-memory persisted queries store, max size: {}",
      max_size
    );

    Self {
      entries: Mutex::new(Entries::Lru(SizedCache::with_size(max_size.get()))),
    }
  }
}

impl PersistedQueryStore for InMemoryPersistedQueryStore {
  fn get(&self, hash: &str) -> Result<Option<CacheEntry>, StoreError> {
    let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;

    // Lookups refresh the recency of an LRU entry, so both variants need `&mut`.
    Ok(match &mut *entries {
      Entries::Unbounded(cache) => cache.cache_get(hash).cloned(),
      Entries::Lru(cache) => cache.cache_get(hash).cloned(),
    })
  }

  fn insert(&self, entry: CacheEntry) -> Result<(), StoreError> {
    let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;

    match &mut *entries {
      Entries::Unbounded(cache) => cache.cache_set(entry.hash.clone(), entry),
      Entries::Lru(cache) => cache.cache_set(entry.hash.clone(), entry),
    };

    Ok(())
  }

  fn len(&self) -> Result<usize, StoreError> {
    let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;

    Ok(match &*entries {
      Entries::Unbounded(cache) => cache.cache_size(),
      Entries::Lru(cache) => cache.cache_size(),
    })
  }
}
