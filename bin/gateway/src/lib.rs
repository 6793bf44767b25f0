use std::sync::Arc;

use actix_web::{
  dev::Response,
  http::{header, StatusCode},
  route,
  web::{self, Bytes},
  HttpRequest, HttpResponse, HttpServer, Responder, Scope,
};
use gateway_common::http::{
  GatewayHttpRequest, GatewayHttpResponse, HeaderName, HeaderValue, HttpHeadersMap, Method,
};
use gateway_config::GatewayConfig;
use gateway_engine::gateway::{Gateway, GatewayRouteData};
use tracing::{debug, info};

pub async fn run_services(config: GatewayConfig) -> anyhow::Result<()> {
  debug!("building gateway from configuration...");
  let gateway = Arc::new(Gateway::new(&config).await?);
  info!("gateway initialized with {} endpoint(s)", gateway.routes.len());

  let http_server = HttpServer::new(move || {
    let gateway = gateway.clone();

    actix_web::App::new().configure(move |cfg| configure_routes(&gateway, cfg))
  });

  let server_address = format!("{}:{}", config.server.host, config.server.port);
  info!("server is listening on {:?}", server_address);

  http_server
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

  Ok(())
}

/// Mounts a scope per endpoint, plus the health check route.
pub fn configure_routes(gateway: &Gateway, cfg: &mut web::ServiceConfig) {
  for gateway_route in gateway.routes.iter() {
    let child_router = Scope::new(gateway_route.base_path.as_str())
      .app_data(web::Data::from(gateway_route.route_data.clone()))
      .route("{tail:.*}", web::route().to(handler))
      .route("", web::route().to(handler));

    cfg.service(child_router);
  }

  cfg.service(health_handler);
}

#[route("/_health", method = "GET", method = "HEAD")]
async fn health_handler() -> impl Responder {
  Response::ok()
}

// actix-web is built on `http` 0.2 while the gateway types use `http` 1.x, so values are copied over as bytes.
#[tracing::instrument(level = "debug", skip(req, body))]
fn transform_req(req: HttpRequest, body: Bytes) -> GatewayHttpRequest {
  let mut headers_map = HttpHeadersMap::new();

  for (key, value) in req.headers().iter() {
    if let (Ok(key), Ok(value)) = (
      HeaderName::from_bytes(key.as_str().as_bytes()),
      HeaderValue::from_bytes(value.as_bytes()),
    ) {
      headers_map.append(key, value);
    }
  }

  GatewayHttpRequest {
    body,
    headers: headers_map,
    method: Method::from_bytes(req.method().as_str().as_bytes()).unwrap_or(Method::GET),
    uri: req.uri().to_string(),
    query_string: req.query_string().to_string(),
  }
}

#[tracing::instrument(level = "debug", skip(gateway_response))]
fn transform_res(gateway_response: GatewayHttpResponse) -> HttpResponse {
  let status = StatusCode::from_u16(gateway_response.status.as_u16())
    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
  let mut response = HttpResponse::build(status);

  for (key, value) in gateway_response.headers.iter() {
    if let (Ok(key), Ok(value)) = (
      header::HeaderName::from_bytes(key.as_str().as_bytes()),
      header::HeaderValue::from_bytes(value.as_bytes()),
    ) {
      response.insert_header((key, value));
    }
  }

  response.body(gateway_response.body)
}

#[tracing::instrument(level = "debug", skip(req, body, route_data), name = "gateway_bin::handler")]
async fn handler(
  req: HttpRequest,
  body: Bytes,
  route_data: web::Data<GatewayRouteData>,
) -> impl Responder {
  let gateway_request = transform_req(req, body);
  let gateway_response = Gateway::execute(gateway_request, &route_data).await;

  transform_res(gateway_response)
}

#[cfg(test)]
mod tests {
  use super::*;
  use actix_web::{test, App};
  use gateway_common::serde_utils::LocalFileReference;
  use gateway_config::{EndpointDefinition, MockedSourceConfig, PluginDefinition, SourceDefinition};
  use serde_json::{json, Value};

  async fn gateway() -> Gateway {
    let config = GatewayConfig {
      server: Default::default(),
      logger: Default::default(),
      plugins: None,
      sources: vec![SourceDefinition::Mock {
        id: "mock".to_string(),
        config: MockedSourceConfig {
          response_data: LocalFileReference {
            path: "response.json".to_string(),
            contents: r#"{"data":{"hello":"world"}}"#.to_string(),
          },
        },
      }],
      endpoints: vec![EndpointDefinition {
        path: "/graphql".to_string(),
        from: "mock".to_string(),
        pretty: false,
        plugins: Some(vec![PluginDefinition::PersistedQueriesPlugin {
          enabled: Some(true),
          config: Some(persisted_queries_plugin::Config::default()),
        }]),
      }],
    };

    Gateway::new(&config).await.unwrap()
  }

  #[actix_web::test]
  async fn health_check() {
    let gw = gateway().await;
    let app = test::init_service(App::new().configure(|cfg| configure_routes(&gw, cfg))).await;

    let res = test::call_service(&app, test::TestRequest::get().uri("/_health").to_request()).await;
    assert_eq!(res.status(), StatusCode::OK);
  }

  #[actix_web::test]
  async fn serves_persisted_queries_over_http() {
    let gw = gateway().await;
    let app = test::init_service(App::new().configure(|cfg| configure_routes(&gw, cfg))).await;
    let extensions = json!({ "persistedQuery": { "version": 1, "sha256Hash": "abc123" } });

    let req = test::TestRequest::post()
      .uri("/graphql")
      .set_json(json!({ "extensions": extensions }))
      .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
      res.headers().get("content-type").unwrap(),
      "application/json"
    );
    let body: Value = test::read_body_json(res).await;
    assert_eq!(
      body,
      json!({ "errors": [{ "message": "PersistedQueryNotFound", "extensions": { "code": "PERSISTED_QUERY_NOT_FOUND" } }] })
    );

    let req = test::TestRequest::post()
      .uri("/graphql")
      .set_json(json!({ "query": "{ hello }", "extensions": extensions }))
      .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({ "data": { "hello": "world" } }));

    let req = test::TestRequest::post()
      .uri("/graphql")
      .set_json(json!({ "extensions": extensions }))
      .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({ "data": { "hello": "world" } }));
  }
}
