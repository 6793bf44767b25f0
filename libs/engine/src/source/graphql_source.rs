use futures::future::LocalBoxFuture;
use gateway_common::{
  execute::RequestExecutionContext,
  graphql::GraphQLResponse,
  http::{Bytes, HeaderValue, CONTENT_TYPE},
};
use gateway_config::GraphQLSourceConfig;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::runtime::{GraphQLSourceInitError, SourceError, SourceRuntime};
use crate::gateway::GatewayRouteData;

#[derive(Debug)]
pub struct GraphQLSourceRuntime {
  pub fetcher: Client,
  pub config: GraphQLSourceConfig,
}

impl GraphQLSourceRuntime {
  pub fn new(config: GraphQLSourceConfig) -> Result<Self, GraphQLSourceInitError> {
    let fetcher = Client::builder()
      .build()
      .map_err(|source| GraphQLSourceInitError::FetcherError { source })?;

    Ok(Self { fetcher, config })
  }

  async fn fetch(
    &self,
    route_data: &GatewayRouteData,
    request_context: &mut RequestExecutionContext,
  ) -> Result<GraphQLResponse, SourceError> {
    let source_req = &mut request_context
      .downstream_graphql_request
      .as_mut()
      .ok_or(SourceError::MissingGraphQLRequest)?
      .request;

    route_data
      .plugin_manager
      .on_upstream_graphql_request(source_req)
      .await;

    debug!(
      "sending upstream request to {:?}: {}",
      self.config.endpoint, source_req
    );

    // Only the GraphQL parameters are forwarded, the persisted query flags are never serialized.
    let upstream_response = self
      .fetcher
      .post(&self.config.endpoint)
      .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
      .body(Bytes::from(&*source_req))
      .send()
      .await
      .map_err(SourceError::NetworkError)?;

    match upstream_response.status() {
      StatusCode::OK => {
        let body = upstream_response
          .bytes()
          .await
          .map_err(SourceError::NetworkError)?;

        serde_json::from_slice::<GraphQLResponse>(&body).map_err(SourceError::InvalidResponse)
      }
      code => Err(SourceError::UnexpectedHTTPStatusError(code)),
    }
  }
}

impl SourceRuntime for GraphQLSourceRuntime {
  #[tracing::instrument(
    skip(self, route_data, request_context),
    name = "GraphQLSourceRuntime::execute"
  )]
  fn execute<'a>(
    &'a self,
    route_data: &'a GatewayRouteData,
    request_context: &'a mut RequestExecutionContext,
  ) -> LocalBoxFuture<'a, Result<GraphQLResponse, SourceError>> {
    Box::pin(self.fetch(route_data, request_context))
  }
}
