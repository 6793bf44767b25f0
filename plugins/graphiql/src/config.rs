use gateway_common::serde_utils::{
  JsonSchemaExample, JsonSchemaExampleMetadata, JsonSchemaExampleWrapperType,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[schemars(example = "graphiql_example")]
#[schemars(example = "playground_example")]
/// This plugin adds an interactive GraphQL explorer to your Endpoint.
///
/// The explorer is rendered for requests sent by a browser: the `Accept` header contains `text/html`
/// and does not contain `application/json`. Add `?raw` to the URL to get the plain GraphQL response instead.
///
/// The `query`, `variables` and `operationName` parameters of the request are used to prefill the editor.
pub struct GraphiQLPluginConfig {
  #[serde(
    default = "headers_editor_enabled_default_value",
    skip_serializing_if = "Option::is_none"
  )]
  /// Enable/disable the HTTP headers editor in the GraphiQL interface.
  pub headers_editor_enabled: Option<bool>,
  /// The explorer to render.
  #[serde(default)]
  pub explorer: GraphQLExplorer,
}

impl Default for GraphiQLPluginConfig {
  fn default() -> Self {
    Self {
      headers_editor_enabled: headers_editor_enabled_default_value(),
      explorer: GraphQLExplorer::default(),
    }
  }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, JsonSchema)]
pub enum GraphQLExplorer {
  /// [GraphiQL](https://github.com/graphql/graphiql), as packaged by GraphQL Yoga.
  #[serde(rename = "graphiql")]
  #[default]
  GraphiQL,
  /// [GraphQL Playground](https://github.com/graphql/graphql-playground).
  #[serde(rename = "playground")]
  Playground,
}

fn graphiql_example() -> JsonSchemaExample<GraphiQLPluginConfig> {
  JsonSchemaExample {
    metadata: JsonSchemaExampleMetadata::new("Enable GraphiQL", None),
    wrapper: Some(JsonSchemaExampleWrapperType::Plugin {
      name: "graphiql".to_string(),
    }),
    example: GraphiQLPluginConfig::default(),
  }
}

fn playground_example() -> JsonSchemaExample<GraphiQLPluginConfig> {
  JsonSchemaExample {
    metadata: JsonSchemaExampleMetadata::new("Enable GraphQL Playground", None),
    wrapper: Some(JsonSchemaExampleWrapperType::Plugin {
      name: "graphiql".to_string(),
    }),
    example: GraphiQLPluginConfig {
      explorer: GraphQLExplorer::Playground,
      ..Default::default()
    },
  }
}

fn headers_editor_enabled_default_value() -> Option<bool> {
  Some(true)
}

// See https://github.com/dotansimha/graphql-yoga/blob/main/packages/graphiql/src/YogaGraphiQL.tsx
#[derive(Serialize, Debug, Clone)]
pub struct GraphiQLSource {
  pub endpoint: String,
  pub query: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub variables: Option<String>,
  #[serde(rename = "operationName", skip_serializing_if = "Option::is_none")]
  pub operation_name: Option<String>,
  #[serde(rename = "isHeadersEditorEnabled")]
  pub headers_editor_enabled: bool,
}

#[derive(Serialize, Debug, Clone)]
pub struct PlaygroundTab {
  pub endpoint: String,
  pub query: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub variables: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
pub struct PlaygroundSource {
  pub endpoint: String,
  pub tabs: Vec<PlaygroundTab>,
}
