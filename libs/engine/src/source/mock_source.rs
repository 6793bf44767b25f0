use futures::future::LocalBoxFuture;
use gateway_common::{execute::RequestExecutionContext, graphql::GraphQLResponse};
use gateway_config::MockedSourceConfig;

use super::runtime::{SourceError, SourceRuntime};
use crate::gateway::GatewayRouteData;

#[derive(Debug)]
pub struct MockedSourceRuntime {
  pub config: MockedSourceConfig,
}

impl MockedSourceRuntime {
  pub fn new(config: MockedSourceConfig) -> Self {
    Self { config }
  }
}

impl SourceRuntime for MockedSourceRuntime {
  fn execute<'a>(
    &'a self,
    _route_data: &'a GatewayRouteData,
    _request_context: &'a mut RequestExecutionContext,
  ) -> LocalBoxFuture<'a, Result<GraphQLResponse, SourceError>> {
    Box::pin(async move {
      serde_json::from_str::<GraphQLResponse>(&self.config.response_data.contents)
        .map_err(SourceError::InvalidResponse)
    })
  }
}
