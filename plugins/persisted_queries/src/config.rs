use gateway_common::serde_utils::{
  JsonSchemaExample, JsonSchemaExampleMetadata, JsonSchemaExampleWrapperType,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The `persisted_queries` plugin implements [Automatic Persisted Queries](https://www.apollographql.com/docs/apollo-server/performance/apq/).
///
/// Clients send the SHA-256 hash of the operation instead of the full operation text:
///
/// `POST /graphql {"extensions": {"persistedQuery": {"version": 1, "sha256Hash": "ecf4..."}}}`
///
/// When the hash is unknown, the gateway responds with a `PERSISTED_QUERY_NOT_FOUND` error and the client
/// retries with both the operation text and the hash. The gateway remembers the pair, so the following
/// requests can be sent with the hash only.
///
/// Registered operations are kept in memory and are not shared across gateway instances or restarts.
#[derive(Deserialize, Serialize, Debug, Clone, Default, JsonSchema)]
#[schemars(example = "persisted_queries_example_1")]
#[schemars(example = "persisted_queries_example_2")]
pub struct PersistedQueriesPluginConfig {
  /// The store used to keep registered operations. Defaults to an unbounded in-memory store.
  #[serde(default)]
  pub store: PersistedQueriesStoreConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema, PartialEq)]
#[serde(tag = "source")]
pub enum PersistedQueriesStoreConfig {
  /// Keeps registered operations in the memory of the gateway process.
  #[serde(rename = "in_memory")]
  #[schemars(title = "in_memory")]
  InMemory {
    /// The maximum number of operations to keep. When the store is full, the least recently used
    /// operation is evicted.
    ///
    /// When not set, the store is unbounded and grows for the lifetime of the process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_size: Option<usize>,
  },
}

impl Default for PersistedQueriesStoreConfig {
  fn default() -> Self {
    PersistedQueriesStoreConfig::InMemory { max_size: None }
  }
}

fn persisted_queries_example_1() -> JsonSchemaExample<PersistedQueriesPluginConfig> {
  JsonSchemaExample {
    metadata: JsonSchemaExampleMetadata::new("Unbounded store", None),
    wrapper: Some(JsonSchemaExampleWrapperType::Plugin {
      name: "persisted_queries".to_string(),
    }),
    example: PersistedQueriesPluginConfig::default(),
  }
}

fn persisted_queries_example_2() -> JsonSchemaExample<PersistedQueriesPluginConfig> {
  JsonSchemaExample {
    metadata: JsonSchemaExampleMetadata::new(
      "Bounded store",
      Some("Keeps at most 1000 operations, evicting the least recently used one."),
    ),
    wrapper: Some(JsonSchemaExampleWrapperType::Plugin {
      name: "persisted_queries".to_string(),
    }),
    example: PersistedQueriesPluginConfig {
      store: PersistedQueriesStoreConfig::InMemory {
        max_size: Some(1000),
      },
    },
  }
}
