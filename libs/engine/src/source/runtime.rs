use std::fmt::Debug;

use futures::future::LocalBoxFuture;
use gateway_common::{
  execute::RequestExecutionContext, graphql::GraphQLResponse, http::StatusCode,
};

use crate::gateway::GatewayRouteData;

/// An upstream that executes the GraphQL operation stored in the request context.
pub trait SourceRuntime: Debug + Send + Sync + 'static {
  fn execute<'a>(
    &'a self,
    route_data: &'a GatewayRouteData,
    request_context: &'a mut RequestExecutionContext,
  ) -> LocalBoxFuture<'a, Result<GraphQLResponse, SourceError>>;
}

#[derive(thiserror::Error, Debug)]
pub enum GraphQLSourceInitError {
  #[error("failed to init http client: {source}")]
  FetcherError { source: reqwest::Error },
}

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
  #[error("unexpected HTTP status: {0}")]
  UnexpectedHTTPStatusError(StatusCode),
  #[error("network error: {0}")]
  NetworkError(reqwest::Error),
  #[error("invalid upstream response: {0}")]
  InvalidResponse(serde_json::Error),
  #[error("GraphQL request isn't available at the time of execution")]
  MissingGraphQLRequest,
}

impl SourceError {
  pub fn http_status_code(&self) -> StatusCode {
    match self {
      Self::UnexpectedHTTPStatusError(_) => StatusCode::BAD_GATEWAY,
      Self::NetworkError(_) => StatusCode::BAD_GATEWAY,
      Self::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
      Self::MissingGraphQLRequest => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl From<SourceError> for GraphQLResponse {
  fn from(error: SourceError) -> Self {
    GraphQLResponse::new_error_with_code(&error.to_string(), error.http_status_code())
  }
}
