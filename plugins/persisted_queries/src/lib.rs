mod config;
mod descriptor;
mod plugin;
mod resolver;
mod store;

pub use config::PersistedQueriesPluginConfig as Config;
pub use config::PersistedQueriesStoreConfig as StoreConfig;
pub use descriptor::PersistedQueryDescriptor;
pub use plugin::PersistedQueriesPlugin as Plugin;
pub use resolver::{PersistedQueryError, PersistedQueryResolver};
pub use store::in_memory::InMemoryPersistedQueryStore;
pub use store::{CacheEntry, PersistedQueryStore, StoreError};
