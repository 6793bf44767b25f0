use std::fmt::Debug;

pub mod in_memory;

/// A previously registered operation, addressable by its hash.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
  pub operation_name: Option<String>,
  pub query: String,
  /// Same value as the key the entry is stored under.
  pub hash: String,
  /// The `version` sent by the client when the operation was registered. Stored as-is.
  pub protocol_version: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("persisted queries store lock is poisoned")]
  Poisoned,
}

/// Storage for registered operations, shared by all requests of an endpoint.
///
/// Every call is atomic on its own. Inserting an existing hash replaces the previous entry.
pub trait PersistedQueryStore: Send + Sync + Debug {
  fn get(&self, hash: &str) -> Result<Option<CacheEntry>, StoreError>;
  fn insert(&self, entry: CacheEntry) -> Result<(), StoreError>;
  fn len(&self) -> Result<usize, StoreError>;

  fn is_empty(&self) -> Result<bool, StoreError> {
    self.len().map(|len| len == 0)
  }
}
