use std::sync::Arc;

use gateway_common::{
  graphql::{GraphQLError, GraphQLRequest, GraphQLResponse},
  http::{GatewayHttpResponse, HeaderValue, StatusCode, CONTENT_TYPE},
};
use tracing::{debug, error, info, warn};

use crate::{
  descriptor::PersistedQueryDescriptor,
  store::{CacheEntry, PersistedQueryStore},
};

pub const PERSISTED_QUERY_NOT_FOUND_MESSAGE: &str = "PersistedQueryNotFound";
pub const PERSISTED_QUERY_NOT_FOUND_CODE: &str = "PERSISTED_QUERY_NOT_FOUND";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PersistedQueryError {
  /// The client sent a hash without a query, and the hash was never registered.
  #[error("PersistedQueryNotFound")]
  NotFound { hash: String },
}

impl PersistedQueryError {
  pub fn to_graphql_error(&self) -> GraphQLError {
    match self {
      PersistedQueryError::NotFound { .. } => {
        GraphQLError::new(PERSISTED_QUERY_NOT_FOUND_MESSAGE)
          .with_code(PERSISTED_QUERY_NOT_FOUND_CODE)
      }
    }
  }

  /// Renders the error the way APQ clients expect it: a `200` response with a GraphQL error body.
  pub fn into_response(&self) -> GatewayHttpResponse {
    let mut response = GraphQLResponse::new_errors(vec![self.to_graphql_error()])
      .into_with_status_code(StatusCode::OK);
    response
      .headers
      .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

    response
  }
}

/// Resolves the APQ two-phase protocol against a store.
///
/// - no descriptor (or an empty hash): the request passes through untouched.
/// - hash without a query (lookup): the query is loaded from the store, or `NotFound` is returned.
/// - hash with a query (registration): the query is stored under the hash and the request passes through.
#[derive(Debug, Clone)]
pub struct PersistedQueryResolver {
  store: Arc<dyn PersistedQueryStore>,
}

impl PersistedQueryResolver {
  pub fn new(store: Arc<dyn PersistedQueryStore>) -> Self {
    Self { store }
  }

  pub fn store(&self) -> &Arc<dyn PersistedQueryStore> {
    &self.store
  }

  #[tracing::instrument(level = "debug", skip_all, name = "PersistedQueryResolver::resolve")]
  pub fn resolve(
    &self,
    mut request: GraphQLRequest,
  ) -> Result<GraphQLRequest, PersistedQueryError> {
    let descriptor = match PersistedQueryDescriptor::from_extensions(request.extensions.as_ref()) {
      Some(descriptor) => descriptor,
      None => return Ok(request),
    };

    request.has_persisted_params = true;

    match request.query_text() {
      None => self.lookup(request, descriptor),
      Some(query) => {
        let entry = CacheEntry {
          operation_name: request.operation_name.clone(),
          query: query.to_string(),
          hash: descriptor.sha256_hash,
          protocol_version: descriptor.version,
        };
        self.register(entry);

        Ok(request)
      }
    }
  }

  fn lookup(
    &self,
    mut request: GraphQLRequest,
    descriptor: PersistedQueryDescriptor,
  ) -> Result<GraphQLRequest, PersistedQueryError> {
    let hash = descriptor.sha256_hash;

    let entry = self.store.get(&hash).unwrap_or_else(|e| {
      error!(
        "failed to read persisted query {:?} from store, treating as a miss: {}",
        hash, e
      );

      None
    });

    match entry {
      Some(entry) => {
        info!("persisted query {:?} found in store", hash);

        request.operation_name = entry.operation_name;
        request.query = Some(entry.query);
        request.persisted = true;

        Ok(request)
      }
      None => {
        warn!("persisted query {:?} not found in store", hash);

        Err(PersistedQueryError::NotFound { hash })
      }
    }
  }

  fn register(&self, entry: CacheEntry) {
    debug!("registering persisted query {:?}", entry.hash);

    // The client sent the full query, so it can run even if we fail to remember it.
    if let Err(e) = self.store.insert(entry) {
      error!("failed to register persisted query, skipping: {}", e);
    }
  }
}
