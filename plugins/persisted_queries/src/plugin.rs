use std::{num::NonZeroUsize, sync::Arc};

use gateway_common::{
  execute::RequestExecutionContext,
  graphql::GraphQLRequest,
  plugin::{CreatablePlugin, Plugin, PluginError},
};
use tracing::{debug, warn};

use crate::{
  config::{PersistedQueriesPluginConfig, PersistedQueriesStoreConfig},
  resolver::PersistedQueryResolver,
  store::{in_memory::InMemoryPersistedQueryStore, PersistedQueryStore},
};

#[derive(Debug)]
pub struct PersistedQueriesPlugin {
  resolver: PersistedQueryResolver,
}

#[derive(Debug, thiserror::Error)]
pub enum PersistedQueriesPluginError {
  #[error("persisted queries store max_size must be greater than 0")]
  InvalidMaxSize,
}

impl PersistedQueriesPlugin {
  pub fn new(store: Arc<dyn PersistedQueryStore>) -> Self {
    Self {
      resolver: PersistedQueryResolver::new(store),
    }
  }

  pub fn resolver(&self) -> &PersistedQueryResolver {
    &self.resolver
  }
}

#[async_trait::async_trait(?Send)]
impl CreatablePlugin for PersistedQueriesPlugin {
  type Config = PersistedQueriesPluginConfig;

  async fn create(config: Self::Config) -> Result<Box<dyn Plugin>, PluginError> {
    debug!("creating persisted queries plugin");

    let store: Arc<dyn PersistedQueryStore> = match config.store {
      PersistedQueriesStoreConfig::InMemory { max_size: None } => {
        Arc::new(InMemoryPersistedQueryStore::unbounded())
      }
      PersistedQueriesStoreConfig::InMemory {
        max_size: Some(max_size),
      } => match NonZeroUsize::new(max_size) {
        Some(max_size) => Arc::new(InMemoryPersistedQueryStore::with_max_size(max_size)),
        None => {
          return Err(PluginError::InitError {
            source: PersistedQueriesPluginError::InvalidMaxSize.into(),
          })
        }
      },
    };

    Ok(Box::new(Self::new(store)))
  }
}

#[async_trait::async_trait(?Send)]
impl Plugin for PersistedQueriesPlugin {
  async fn on_graphql_params(
    &self,
    ctx: &mut RequestExecutionContext,
    params: &mut GraphQLRequest,
  ) {
    let request = std::mem::take(params);

    match self.resolver.resolve(request) {
      Ok(resolved) => *params = resolved,
      Err(e) => {
        warn!("persisted query resolution failed, short-circuit with an error: {}", e);

        ctx.short_circuit(e.into_response());
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use gateway_common::http::{GatewayHttpRequest, StatusCode};
  use serde_json::json;

  fn lookup_params(hash: &str) -> GraphQLRequest {
    GraphQLRequest {
      extensions: json!({ "persistedQuery": { "version": 1, "sha256Hash": hash } })
        .as_object()
        .cloned(),
      ..Default::default()
    }
  }

  #[tokio::test]
  async fn miss_short_circuits_and_hit_rewrites_params() {
    let plugin = PersistedQueriesPlugin::create(Default::default())
      .await
      .unwrap();

    let mut ctx = RequestExecutionContext::new(GatewayHttpRequest::default());
    let mut params = lookup_params("abc123");
    plugin.on_graphql_params(&mut ctx, &mut params).await;

    assert!(ctx.is_short_circuit());
    let response = ctx.short_circuit_response.unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
      String::from_utf8(response.body.to_vec()).unwrap(),
      r#"{"errors":[{"message":"PersistedQueryNotFound","extensions":{"code":"PERSISTED_QUERY_NOT_FOUND"}}]}"#
    );

    let mut ctx = RequestExecutionContext::new(GatewayHttpRequest::default());
    let mut params = GraphQLRequest {
      query: Some("{ __typename }".to_string()),
      ..lookup_params("abc123")
    };
    plugin.on_graphql_params(&mut ctx, &mut params).await;
    assert!(!ctx.is_short_circuit());
    assert!(params.has_persisted_params);

    let mut ctx = RequestExecutionContext::new(GatewayHttpRequest::default());
    let mut params = lookup_params("abc123");
    plugin.on_graphql_params(&mut ctx, &mut params).await;
    assert!(!ctx.is_short_circuit());
    assert!(params.persisted);
    assert_eq!(params.query.as_deref(), Some("{ __typename }"));
  }

  #[tokio::test]
  async fn plain_requests_are_untouched() {
    let plugin = PersistedQueriesPlugin::new(Arc::new(InMemoryPersistedQueryStore::unbounded()));

    let mut ctx = RequestExecutionContext::new(GatewayHttpRequest::default());
    let plain = GraphQLRequest {
      query: Some("{ __typename }".to_string()),
      ..Default::default()
    };
    let mut params = plain.clone();
    plugin.on_graphql_params(&mut ctx, &mut params).await;

    assert!(!ctx.is_short_circuit());
    assert_eq!(params, plain);
    assert!(plugin.resolver().store().is_empty().unwrap());
  }

  #[tokio::test]
  async fn zero_max_size_is_rejected() {
    let result = PersistedQueriesPlugin::create(PersistedQueriesPluginConfig {
      store: PersistedQueriesStoreConfig::InMemory { max_size: Some(0) },
    })
    .await;

    assert!(matches!(result, Err(PluginError::InitError { .. })));
  }
}
