use std::sync::Arc;

use gateway_common::{
  graphql::GraphQLRequest,
  http::{Bytes, GatewayHttpRequest, GatewayHttpResponse, HttpHeadersMap, Method, CONTENT_TYPE},
  plugin::Plugin,
};
use gateway_config::GraphQLSourceConfig;
use gateway_engine::{
  endpoint_runtime::EndpointRuntime,
  gateway::{Gateway, GatewayRouteData},
  plugin_manager::PluginManager,
  source::graphql_source::GraphQLSourceRuntime,
};
use httpmock::{prelude::*, Mock, Then, When};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// A single gateway route backed by an `httpmock` upstream.
///
/// The route (and its plugins) lives as long as the suite, so state kept by plugins is shared by all
/// requests sent through the same suite.
pub struct TestSuite {
  pub mock_server: MockServer,
  pub route_data: GatewayRouteData,
}

impl TestSuite {
  pub async fn new(plugins: Vec<Box<dyn Plugin>>) -> Self {
    let mock_server = MockServer::start_async().await;
    let source = GraphQLSourceRuntime::new(GraphQLSourceConfig {
      endpoint: mock_server.url("/graphql"),
    })
    .unwrap();

    Self {
      route_data: GatewayRouteData {
        from: EndpointRuntime::dummy(),
        to: Arc::new(source),
        plugin_manager: Arc::new(PluginManager::new_from_vec(plugins)),
      },
      mock_server,
    }
  }

  pub async fn with_persisted_queries() -> Self {
    let plugin =
      PluginManager::create_plugin::<persisted_queries_plugin::Plugin>(Default::default())
        .await
        .unwrap();

    Self::new(vec![plugin]).await
  }

  pub async fn with_graphiql(config: graphiql_plugin::Config) -> Self {
    let plugin = PluginManager::create_plugin::<graphiql_plugin::Plugin>(config)
      .await
      .unwrap();

    Self::new(vec![plugin]).await
  }

  pub async fn mock_upstream(&self, mock_fn: impl FnOnce(When, Then)) -> Mock<'_> {
    self.mock_server.mock_async(mock_fn).await
  }

  /// Upstream that answers every operation with `{"data":{"__typename":"Query"}}`.
  pub async fn mock_default_upstream(&self) -> Mock<'_> {
    self
      .mock_upstream(|when, then| {
        when.method(POST).path("/graphql");
        then
          .status(200)
          .header("content-type", "application/json")
          .body(json!({ "data": { "__typename": "Query" } }).to_string());
      })
      .await
  }

  pub async fn run_http_request(&self, request: GatewayHttpRequest) -> GatewayHttpResponse {
    Gateway::execute(request, &self.route_data).await
  }

  pub async fn run_json_request(&self, body: Value) -> GatewayHttpResponse {
    let mut headers = HttpHeadersMap::new();
    headers.append(CONTENT_TYPE, "application/json".parse().unwrap());

    self
      .run_http_request(GatewayHttpRequest {
        method: Method::POST,
        query_string: "".to_string(),
        uri: "/graphql".to_string(),
        body: body.to_string().into(),
        headers,
      })
      .await
  }

  pub async fn run_graphql_request(&self, request: GraphQLRequest) -> GatewayHttpResponse {
    let mut headers = HttpHeadersMap::new();
    headers.append(CONTENT_TYPE, "application/json".parse().unwrap());

    self
      .run_http_request(GatewayHttpRequest {
        method: Method::POST,
        query_string: "".to_string(),
        uri: "/graphql".to_string(),
        body: Bytes::from(&request),
        headers,
      })
      .await
  }
}

pub fn sha256_hex(query: &str) -> String {
  hex::encode(Sha256::digest(query.as_bytes()))
}

pub fn persisted_query_extensions(hash: &str) -> Value {
  json!({ "persistedQuery": { "version": 1, "sha256Hash": hash } })
}

pub fn body_string(response: &GatewayHttpResponse) -> String {
  String::from_utf8(response.body.to_vec()).unwrap()
}

pub fn body_json(response: &GatewayHttpResponse) -> Value {
  serde_json::from_slice(&response.body).unwrap()
}
