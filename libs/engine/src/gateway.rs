use std::sync::Arc;

use gateway_common::{
  execute::RequestExecutionContext,
  graphql::{ExtractGraphQLOperationError, GraphQLRequest, GraphQLResponse, ParsedGraphQLRequest},
  http::{GatewayHttpRequest, GatewayHttpResponse, Method, APPLICATION_JSON_UTF8},
  plugin::PluginError,
};
use gateway_config::{GatewayConfig, SourceDefinition};
use tracing::{debug, error, info};

use crate::{
  endpoint_runtime::EndpointRuntime,
  plugin_manager::PluginManager,
  source::{
    graphql_source::GraphQLSourceRuntime,
    mock_source::MockedSourceRuntime,
    runtime::{GraphQLSourceInitError, SourceRuntime},
  },
};

#[derive(Debug)]
pub struct GatewayRouteData {
  pub plugin_manager: Arc<PluginManager>,
  pub from: EndpointRuntime,
  pub to: Arc<dyn SourceRuntime>,
}

#[derive(Debug)]
pub struct GatewayRoute {
  pub base_path: String,
  pub route_data: Arc<GatewayRouteData>,
}

#[derive(Debug)]
pub struct Gateway {
  pub routes: Vec<GatewayRoute>,
}

#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
  #[error("endpoint {endpoint:?} refers to a missing source {source_id:?}")]
  MissingSource { endpoint: String, source_id: String },
  #[error("failed to initialize plugins: {0}")]
  PluginManagerInitError(#[from] PluginError),
  #[error("failed to initialize source: {0}")]
  SourceInitError(#[from] GraphQLSourceInitError),
}

impl Gateway {
  /// Builds one route per endpoint. Every endpoint gets its own plugin instances and source runtime.
  pub async fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
    let mut routes = Vec::with_capacity(config.endpoints.len());

    for endpoint_config in config.endpoints.iter() {
      let combined_plugins = config
        .plugins
        .iter()
        .chain(&endpoint_config.plugins)
        .flat_map(|vec| vec.iter())
        .cloned()
        .collect::<Vec<_>>();

      let plugin_manager = PluginManager::new(&combined_plugins).await?;
      let source_definition = config
        .sources
        .iter()
        .find(|source| source.id() == endpoint_config.from)
        .ok_or_else(|| GatewayError::MissingSource {
          endpoint: endpoint_config.path.clone(),
          source_id: endpoint_config.from.clone(),
        })?;

      let source: Arc<dyn SourceRuntime> = match source_definition {
        SourceDefinition::GraphQL { config, .. } => {
          Arc::new(GraphQLSourceRuntime::new(config.clone())?)
        }
        SourceDefinition::Mock { config, .. } => Arc::new(MockedSourceRuntime::new(config.clone())),
      };

      info!(
        "endpoint {:?} is served from source {:?} with {} plugin(s)",
        endpoint_config.path,
        endpoint_config.from,
        plugin_manager.len()
      );

      routes.push(GatewayRoute {
        base_path: endpoint_config.path.clone(),
        route_data: Arc::new(GatewayRouteData {
          plugin_manager: Arc::new(plugin_manager),
          from: EndpointRuntime {
            config: endpoint_config.clone(),
          },
          to: source,
        }),
      });
    }

    Ok(Self { routes })
  }

  #[cfg(any(test, feature = "test_utils"))]
  pub async fn execute_test(
    endpoint: EndpointRuntime,
    source: Arc<dyn SourceRuntime>,
    plugins: Vec<Box<dyn gateway_common::plugin::Plugin>>,
    request: GatewayHttpRequest,
  ) -> GatewayHttpResponse {
    let route_data = GatewayRouteData {
      from: endpoint,
      to: source,
      plugin_manager: Arc::new(PluginManager::new_from_vec(plugins)),
    };

    Self::execute(request, &route_data).await
  }

  /// Runs the request through the plugins and the source of a route.
  ///
  /// Plugins may short-circuit after `on_downstream_http_request`, `on_graphql_params` and
  /// `on_downstream_graphql_request`. `on_downstream_http_response` runs for every response.
  #[tracing::instrument(skip(request, route_data), name = "Gateway::execute")]
  pub async fn execute(
    request: GatewayHttpRequest,
    route_data: &GatewayRouteData,
  ) -> GatewayHttpResponse {
    let mut request_ctx = RequestExecutionContext::new(request);

    // Step 1: Trigger "on_downstream_http_request" on all plugins
    route_data
      .plugin_manager
      .on_downstream_http_request(&mut request_ctx)
      .await;

    if let Some(response) = request_ctx.short_circuit_response.take() {
      return Self::respond(&mut request_ctx, route_data, response);
    }

    if request_ctx.downstream_http_request.method == Method::OPTIONS {
      return Self::respond(&mut request_ctx, route_data, GatewayHttpResponse::no_content());
    }

    // Step 2: Decode the GraphQL parameters from the HTTP request
    let (accept, result) =
      GraphQLRequest::new_from_http_request(&request_ctx.downstream_http_request);
    let mut params = match result {
      Ok(params) => params,
      Err(e) => {
        error!("failed to extract GraphQL parameters from HTTP request: {:?}", e);

        let response = e.into_response(accept);
        return Self::respond(&mut request_ctx, route_data, response);
      }
    };

    // Step 3: Let plugins rewrite the parameters (persisted queries are resolved here)
    route_data
      .plugin_manager
      .on_graphql_params(&mut request_ctx, &mut params)
      .await;

    if let Some(response) = request_ctx.short_circuit_response.take() {
      return Self::respond(&mut request_ctx, route_data, response);
    }

    if params.query_text().is_none() {
      debug!("no GraphQL operation found in request: {}", params);

      let response = ExtractGraphQLOperationError::EmptyExtraction.into_response(accept);
      return Self::respond(&mut request_ctx, route_data, response);
    }

    // Step 4: Parse the operation and select the one to execute
    let parsed = match ParsedGraphQLRequest::create_and_parse(params) {
      Ok(parsed) => parsed,
      Err(e) => {
        debug!("failed to parse GraphQL operation: {:?}", e);

        let response = ExtractGraphQLOperationError::GraphQLParserError(e).into_response(accept);
        return Self::respond(&mut request_ctx, route_data, response);
      }
    };

    if let Err(e) = parsed.select_operation() {
      debug!("no executable operation in GraphQL document: {}", e);

      let response = e.into_response(accept);
      return Self::respond(&mut request_ctx, route_data, response);
    }

    request_ctx.downstream_graphql_request = Some(parsed);

    // Step 5: Execute plugins on the parsed GraphQL request
    route_data
      .plugin_manager
      .on_downstream_graphql_request(&mut request_ctx)
      .await;

    if let Some(response) = request_ctx.short_circuit_response.take() {
      return Self::respond(&mut request_ctx, route_data, response);
    }

    // Step 6: Execute the operation on the source
    let upstream_response = match route_data.to.execute(route_data, &mut request_ctx).await {
      Ok(response) => response,
      Err(e) => {
        error!("failed to execute GraphQL operation on source: {}", e);

        GraphQLResponse::from(e)
      }
    };

    let response = upstream_response.into_http_response(route_data.from.config.pretty);
    Self::respond(&mut request_ctx, route_data, response)
  }

  fn respond(
    request_ctx: &mut RequestExecutionContext,
    route_data: &GatewayRouteData,
    mut response: GatewayHttpResponse,
  ) -> GatewayHttpResponse {
    if !response.body.is_empty() {
      response.ensure_content_type(APPLICATION_JSON_UTF8);
    }

    route_data
      .plugin_manager
      .on_downstream_http_response(request_ctx, &mut response);

    response
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use gateway_common::{
    http::{HeaderValue, StatusCode, ToHeadersMap, CONTENT_TYPE},
    serde_utils::LocalFileReference,
  };
  use gateway_config::MockedSourceConfig;
  use graphiql_plugin::Plugin as GraphiQLPlugin;
  use persisted_queries_plugin::{InMemoryPersistedQueryStore, Plugin as PersistedQueriesPlugin};
  use serde_json::{json, Value};

  fn mock_source() -> Arc<dyn SourceRuntime> {
    Arc::new(MockedSourceRuntime::new(MockedSourceConfig {
      response_data: LocalFileReference {
        path: "response.json".to_string(),
        contents: r#"{"data":{"hello":"world"}}"#.to_string(),
      },
    }))
  }

  fn json_request(body: Value) -> GatewayHttpRequest {
    GatewayHttpRequest {
      headers: vec![("content-type", "application/json")]
        .to_headers_map()
        .unwrap(),
      body: body.to_string().into(),
      ..Default::default()
    }
  }

  fn body_json(response: &GatewayHttpResponse) -> Value {
    serde_json::from_slice(&response.body).unwrap()
  }

  async fn execute_with_apq(
    store: &Arc<InMemoryPersistedQueryStore>,
    request: GatewayHttpRequest,
  ) -> GatewayHttpResponse {
    Gateway::execute_test(
      EndpointRuntime::dummy(),
      mock_source(),
      vec![Box::new(PersistedQueriesPlugin::new(store.clone()))],
      request,
    )
    .await
  }

  #[tokio::test]
  async fn executes_plain_request() {
    let response = Gateway::execute_test(
      EndpointRuntime::dummy(),
      mock_source(),
      vec![],
      json_request(json!({ "query": "{ hello }" })),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
      response.headers.get(CONTENT_TYPE),
      Some(&HeaderValue::from_static(APPLICATION_JSON_UTF8))
    );
    assert_eq!(body_json(&response), json!({ "data": { "hello": "world" } }));
  }

  #[tokio::test]
  async fn options_request_has_no_content() {
    let response = Gateway::execute_test(
      EndpointRuntime::dummy(),
      mock_source(),
      vec![],
      GatewayHttpRequest {
        method: Method::OPTIONS,
        ..Default::default()
      },
    )
    .await;

    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert!(response.body.is_empty());
  }

  #[tokio::test]
  async fn request_without_operation_is_rejected() {
    let response = Gateway::execute_test(
      EndpointRuntime::dummy(),
      mock_source(),
      vec![],
      json_request(json!({ "variables": { "a": 1 } })),
    )
    .await;

    assert_eq!(
      body_json(&response),
      json!({ "errors": [{ "message": "failed to locate any GraphQL operation in request" }] })
    );
  }

  #[tokio::test]
  async fn invalid_operation_is_rejected() {
    let response = Gateway::execute_test(
      EndpointRuntime::dummy(),
      mock_source(),
      vec![],
      json_request(json!({ "query": "query {" })),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
      body_json(&response),
      json!({ "errors": [{ "message": "failed to parse GraphQL operation" }] })
    );
  }

  #[tokio::test]
  async fn unknown_operation_name_is_rejected() {
    let response = Gateway::execute_test(
      EndpointRuntime::dummy(),
      mock_source(),
      vec![],
      json_request(json!({ "query": "query a { a } query b { b }", "operationName": "c" })),
    )
    .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
      body_json(&response),
      json!({ "errors": [{ "message": "unknown operation named \"c\"" }] })
    );

    let response = Gateway::execute_test(
      EndpointRuntime::dummy(),
      mock_source(),
      vec![],
      json_request(json!({ "query": "fragment f on Query { a }" })),
    )
    .await;

    assert_eq!(
      body_json(&response),
      json!({ "errors": [{ "message": "must provide an operation" }] })
    );
  }

  #[tokio::test]
  async fn browser_requests_get_the_explorer() {
    let request = GatewayHttpRequest {
      method: Method::GET,
      headers: vec![("accept", "text/html")].to_headers_map().unwrap(),
      query_string: "query=%7B+hello+%7D".to_string(),
      body: Default::default(),
      ..Default::default()
    };
    let plugins = || -> Vec<Box<dyn gateway_common::plugin::Plugin>> {
      vec![Box::new(GraphiQLPlugin::new(Default::default()))]
    };

    let response = Gateway::execute_test(
      EndpointRuntime::dummy(),
      mock_source(),
      plugins(),
      request.clone(),
    )
    .await;
    assert_eq!(
      response.headers.get(CONTENT_TYPE),
      Some(&HeaderValue::from_static("text/html; charset=utf-8"))
    );

    let response = Gateway::execute_test(
      EndpointRuntime::dummy(),
      mock_source(),
      plugins(),
      GatewayHttpRequest {
        query_string: "query=%7B+hello+%7D&raw".to_string(),
        ..request
      },
    )
    .await;
    assert_eq!(
      response.headers.get(CONTENT_TYPE),
      Some(&HeaderValue::from_static(APPLICATION_JSON_UTF8))
    );
    assert_eq!(body_json(&response), json!({ "data": { "hello": "world" } }));
  }

  #[tokio::test]
  async fn pretty_endpoint_indents_response() {
    let mut endpoint = EndpointRuntime::dummy();
    endpoint.config.pretty = true;

    let response = Gateway::execute_test(
      endpoint,
      mock_source(),
      vec![],
      json_request(json!({ "query": "{ hello }" })),
    )
    .await;

    let body = String::from_utf8(response.body.to_vec()).unwrap();
    assert_eq!(body, "{\n  \"data\": {\n    \"hello\": \"world\"\n  }\n}");
  }

  #[tokio::test]
  async fn persisted_query_flow() {
    let store = Arc::new(InMemoryPersistedQueryStore::unbounded());
    let extensions = json!({ "persistedQuery": { "version": 1, "sha256Hash": "abc123" } });

    // lookup before registration
    let response =
      execute_with_apq(&store, json_request(json!({ "extensions": extensions }))).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
      response.headers.get(CONTENT_TYPE),
      Some(&HeaderValue::from_static("application/json"))
    );
    assert_eq!(
      String::from_utf8(response.body.to_vec()).unwrap(),
      r#"{"errors":[{"message":"PersistedQueryNotFound","extensions":{"code":"PERSISTED_QUERY_NOT_FOUND"}}]}"#
    );

    // registration
    let response = execute_with_apq(
      &store,
      json_request(json!({ "query": "{ hello }", "extensions": extensions })),
    )
    .await;
    assert_eq!(body_json(&response), json!({ "data": { "hello": "world" } }));

    // lookup over GET, after registration
    let response = execute_with_apq(
      &store,
      GatewayHttpRequest {
        method: Method::GET,
        query_string: format!(
          "extensions={}",
          "%7B%22persistedQuery%22%3A%7B%22version%22%3A1%2C%22sha256Hash%22%3A%22abc123%22%7D%7D"
        ),
        ..Default::default()
      },
    )
    .await;
    assert_eq!(body_json(&response), json!({ "data": { "hello": "world" } }));
  }
}
