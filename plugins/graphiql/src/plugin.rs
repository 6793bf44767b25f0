use gateway_common::{
  execute::RequestExecutionContext,
  graphql::GraphQLRequest,
  http::{
    parse_query_string, GatewayHttpRequest, GatewayHttpResponse, HeaderValue, HttpHeadersMap,
    Method, StatusCode, ACCEPT, CONTENT_TYPE,
  },
  plugin::{CreatablePlugin, Plugin, PluginError},
};
use serde_json::Value;
use tracing::{debug, error};

use crate::config::{
  GraphQLExplorer, GraphiQLPluginConfig, GraphiQLSource, PlaygroundSource, PlaygroundTab,
};

const YOGA_GRAPHIQL_VERSION: &str = "4.1.1";
const GRAPHQL_PLAYGROUND_VERSION: &str = "1.7.26";

#[derive(Debug)]
pub struct GraphiQLPlugin {
  config: GraphiQLPluginConfig,
}

impl GraphiQLPlugin {
  pub fn new(config: GraphiQLPluginConfig) -> Self {
    Self { config }
  }
}

#[async_trait::async_trait(?Send)]
impl CreatablePlugin for GraphiQLPlugin {
  type Config = GraphiQLPluginConfig;

  async fn create(config: Self::Config) -> Result<Box<dyn Plugin>, PluginError> {
    debug!("creating graphiql plugin, explorer: {:?}", config.explorer);

    Ok(Box::new(Self::new(config)))
  }
}

#[async_trait::async_trait(?Send)]
impl Plugin for GraphiQLPlugin {
  async fn on_downstream_http_request(&self, ctx: &mut RequestExecutionContext) {
    let request = &ctx.downstream_http_request;

    if !wants_explorer(request) {
      return;
    }

    match render_explorer(&self.config, request) {
      Ok(response) => {
        debug!("rendering {:?} explorer for {:?}", self.config.explorer, request.uri);

        ctx.short_circuit(response);
      }
      Err(e) => error!("failed to render GraphQL explorer, falling through: {}", e),
    }
  }
}

/// Browsers ask for `text/html` without `application/json`. `?raw` opts out.
fn wants_explorer(request: &GatewayHttpRequest) -> bool {
  if request.method == Method::OPTIONS {
    return false;
  }

  let accept = request
    .headers
    .get_all(ACCEPT)
    .iter()
    .filter_map(|value| value.to_str().ok())
    .collect::<Vec<_>>()
    .join(",");

  accept.contains("text/html")
    && !accept.contains("application/json")
    && !parse_query_string(&request.query_string).contains_key("raw")
}

fn endpoint_path(request: &GatewayHttpRequest) -> String {
  request
    .uri
    .split('?')
    .next()
    .unwrap_or_default()
    .to_string()
}

pub fn render_explorer(
  config: &GraphiQLPluginConfig,
  request: &GatewayHttpRequest,
) -> Result<GatewayHttpResponse, serde_json::Error> {
  // Prefill is best effort: undecodable parameters open an empty editor.
  let (_, params) = GraphQLRequest::new_from_http_request(request);
  let params = params.unwrap_or_default();

  let endpoint = endpoint_path(request);
  let query = params.query.unwrap_or_default();
  let variables = match params.variables {
    Some(variables) => Some(serde_json::to_string_pretty(&Value::Object(variables))?),
    None => None,
  };

  let body = match config.explorer {
    GraphQLExplorer::GraphiQL => render_graphiql(&GraphiQLSource {
      endpoint,
      query,
      variables,
      operation_name: params.operation_name,
      headers_editor_enabled: config.headers_editor_enabled.unwrap_or_default(),
    })?,
    GraphQLExplorer::Playground => render_playground(&PlaygroundSource {
      endpoint: endpoint.clone(),
      tabs: vec![PlaygroundTab {
        endpoint,
        query,
        variables,
      }],
    })?,
  };

  let mut headers = HttpHeadersMap::new();
  headers.insert(
    CONTENT_TYPE,
    HeaderValue::from_static("text/html; charset=utf-8"),
  );

  Ok(GatewayHttpResponse {
    body: body.into(),
    status: StatusCode::OK,
    headers,
  })
}

// `<` is escaped so prefilled values can't close the script tag.
fn script_json<T: serde::Serialize>(value: &T) -> Result<String, serde_json::Error> {
  Ok(serde_json::to_string(value)?.replace('<', "\\u003c"))
}

fn render_graphiql(source: &GraphiQLSource) -> Result<String, serde_json::Error> {
  Ok(format!(
    r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <title>GraphQL Gateway</title>
    <link
      rel="stylesheet"
      href="https://unpkg.com/@graphql-yoga/graphiql@{0}/dist/style.css"
    />
  </head>
  <body id="body" class="no-focus-outline">
    <noscript>You need to enable JavaScript to run this app.</noscript>
    <div id="root"></div>

    <script type="module">
      import {{ renderYogaGraphiQL }} from 'https://unpkg.com/@graphql-yoga/graphiql@{0}/dist/yoga-graphiql.es.js';

      renderYogaGraphiQL(root, {1});
    </script>
  </body>
</html>"#,
    YOGA_GRAPHIQL_VERSION,
    script_json(source)?
  ))
}

fn render_playground(source: &PlaygroundSource) -> Result<String, serde_json::Error> {
  Ok(format!(
    r#"<!doctype html>
<html lang="en">
  <head>
    <meta charset="utf-8" />
    <meta name="viewport" content="user-scalable=no, initial-scale=1.0, minimum-scale=1.0, maximum-scale=1.0, minimal-ui" />
    <title>GraphQL Gateway</title>
    <link
      rel="stylesheet"
      href="https://cdn.jsdelivr.net/npm/graphql-playground-react@{0}/build/static/css/index.css"
    />
    <script src="https://cdn.jsdelivr.net/npm/graphql-playground-react@{0}/build/static/js/middleware.js"></script>
  </head>
  <body>
    <div id="root"></div>

    <script>
      window.addEventListener('load', function () {{
        GraphQLPlayground.init(document.getElementById('root'), {1});
      }});
    </script>
  </body>
</html>"#,
    GRAPHQL_PLAYGROUND_VERSION,
    script_json(source)?
  ))
}
