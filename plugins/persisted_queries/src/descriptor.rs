use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

pub const PERSISTED_QUERY_EXTENSION: &str = "persistedQuery";

/// The `extensions.persistedQuery` object sent by APQ clients.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PersistedQueryDescriptor {
  #[serde(rename = "sha256Hash")]
  pub sha256_hash: String,
  #[serde(default)]
  pub version: Option<f64>,
}

impl PersistedQueryDescriptor {
  /// Reads the descriptor from the request extensions.
  ///
  /// Returns `None` when there is no descriptor, when it has an unexpected shape (for example a
  /// non-string hash), or when the hash is empty. All of these are treated as a regular,
  /// non-persisted request.
  pub fn from_extensions(extensions: Option<&Map<String, Value>>) -> Option<Self> {
    let raw = extensions?.get(PERSISTED_QUERY_EXTENSION)?;

    match Self::deserialize(raw) {
      Ok(descriptor) if descriptor.sha256_hash.is_empty() => {
        debug!("persisted query descriptor has an empty hash, ignoring");

        None
      }
      Ok(descriptor) => Some(descriptor),
      Err(e) => {
        debug!(
          "persisted query descriptor has an unexpected shape, ignoring: {:?}",
          e
        );

        None
      }
    }
  }
}
