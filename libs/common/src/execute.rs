use crate::{
  graphql::ParsedGraphQLRequest,
  http::{GatewayHttpRequest, GatewayHttpResponse},
};

#[derive(Debug)]
pub struct RequestExecutionContext {
  pub downstream_http_request: GatewayHttpRequest,
  pub downstream_graphql_request: Option<ParsedGraphQLRequest>,
  pub short_circuit_response: Option<GatewayHttpResponse>,
}

impl RequestExecutionContext {
  pub fn new(downstream_http_request: GatewayHttpRequest) -> Self {
    RequestExecutionContext {
      downstream_http_request,
      downstream_graphql_request: None,
      short_circuit_response: None,
    }
  }

  pub fn short_circuit(&mut self, response: GatewayHttpResponse) {
    self.short_circuit_response = Some(response);
  }

  pub fn is_short_circuit(&self) -> bool {
    self.short_circuit_response.is_some()
  }
}
