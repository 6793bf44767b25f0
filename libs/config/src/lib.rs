pub mod interpolate;

use std::{fs::read_to_string, path::Path};

use gateway_common::serde_utils::{
  JsonSchemaExample, JsonSchemaExampleMetadata, LocalFileReference, BASE_PATH,
};
use gateway_logger::config::LoggerConfigFormat;
use interpolate::{interpolate, EnvVars};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// The top-level configuration object of the gateway.
///
/// Both YAML and JSON formats are supported, the format is picked by the file extension (`.json`, `.yaml`
/// or `.yml`).
///
/// ## Loading the config file
///
/// The path of the config file is the first argument of the binary:
///
/// ```sh
///
/// gateway my-config-file.yaml
///
/// ```
///
/// > By default, the gateway looks for a file named `config.json` in the current directory.
///
/// ### Configuration Interpolation with Environment Variables
///
/// Environment variables can be inserted anywhere in the config file:
///
/// - `${VAR_NAME}` inserts the value of `VAR_NAME`. When it's not set, an empty string is used and a warning is printed.
/// - `${VAR_NAME:-default_value}` uses `default_value` when `VAR_NAME` is not set or empty.
/// - `${VAR_NAME:?message}` fails the startup with `message` when `VAR_NAME` is not set or empty.
/// - `$$` is a literal `$`.
///
/// Relative file paths in the config (for example a mock source response) are resolved against the directory of
/// the config file.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct GatewayConfig {
  /// Configuration for the HTTP server.
  #[serde(default)]
  pub server: ServerConfig,
  /// Gateway logger configuration.
  #[serde(default)]
  pub logger: LoggerConfig,
  /// List of sources used by the gateway. Each source is an upstream the resolved GraphQL operations are
  /// executed against.
  pub sources: Vec<SourceDefinition>,
  /// List of GraphQL endpoints exposed by the gateway.
  /// Each endpoint is backed by a single source and can have its own set of plugins.
  pub endpoints: Vec<EndpointDefinition>,
  /// List of global plugins applied to all endpoints. Global plugins run before endpoint-specific plugins.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub plugins: Option<Vec<PluginDefinition>>,
}

/// The `Endpoint` object exposes a source over HTTP, with a set of plugins applied to it.
///
/// Every endpoint gets its own plugin instances, so two endpoints with the `persisted_queries` plugin keep
/// separate stores.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[schemars(example = "endpoint_definition_example1")]
pub struct EndpointDefinition {
  /// A valid HTTP path to listen on for this endpoint.
  pub path: String,
  /// The identifier of the `Source` to be used.
  ///
  /// This must match the `id` field of a `Source` definition.
  pub from: String,
  /// Pretty-prints (indents) the JSON responses of this endpoint.
  #[serde(default)]
  pub pretty: bool,
  /// A list of plugins applied to this endpoint, after the global plugins.
  ///
  /// Order of plugins is important: plugins are applied in the order they are defined.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub plugins: Option<Vec<PluginDefinition>>,
}

fn endpoint_definition_example1() -> JsonSchemaExample<GatewayConfig> {
  JsonSchemaExample {
    metadata: JsonSchemaExampleMetadata::new(
      "Persisted queries",
      Some("Exposes a GraphQL upstream with Automatic Persisted Queries enabled. Browsers get a GraphiQL interface."),
    ),
    wrapper: None,
    example: GatewayConfig {
      server: Default::default(),
      logger: Default::default(),
      plugins: None,
      sources: vec![SourceDefinition::GraphQL {
        id: "my-source".to_string(),
        config: GraphQLSourceConfig {
          endpoint: "https://my-source.com/graphql".to_string(),
        },
      }],
      endpoints: vec![EndpointDefinition {
        path: "/graphql".to_string(),
        from: "my-source".to_string(),
        pretty: false,
        plugins: Some(vec![
          PluginDefinition::PersistedQueriesPlugin {
            enabled: default_plugin_enabled(),
            config: None,
          },
          PluginDefinition::GraphiQLPlugin {
            enabled: default_plugin_enabled(),
            config: None,
          },
        ]),
      }],
    },
  }
}

fn default_plugin_enabled() -> Option<bool> {
  Some(true)
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(tag = "type")]
pub enum PluginDefinition {
  #[serde(rename = "graphiql")]
  GraphiQLPlugin {
    #[serde(
      default = "default_plugin_enabled",
      skip_serializing_if = "Option::is_none"
    )]
    enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    config: Option<graphiql_plugin::Config>,
  },

  #[serde(rename = "persisted_queries")]
  PersistedQueriesPlugin {
    #[serde(
      default = "default_plugin_enabled",
      skip_serializing_if = "Option::is_none"
    )]
    enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    config: Option<persisted_queries_plugin::Config>,
  },
}

impl PluginDefinition {
  pub fn is_enabled(&self) -> bool {
    match self {
      PluginDefinition::GraphiQLPlugin { enabled, .. } => enabled.unwrap_or(true),
      PluginDefinition::PersistedQueriesPlugin { enabled, .. } => enabled.unwrap_or(true),
    }
  }
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct LoggerConfig {
  /// Environment filter configuration as a string, see
  /// [tracing_subscriber::EnvFilter](https://docs.rs/tracing-subscriber/latest/tracing_subscriber/filter/struct.EnvFilter.html).
  ///
  /// - `info` logs all messages at info level and higher across all modules.
  ///
  /// - `info,persisted_queries_plugin=debug` also logs the persisted queries descriptor handling.
  #[serde(default = "default_log_filter")]
  pub filter: String,
  /// The logger format.
  ///
  /// By default, `pretty` is used in debug builds. Release builds use `compact` in TTY environments and `json`
  /// otherwise.
  #[serde(default)]
  pub format: LoggerConfigFormat,
  /// Logs span close events, including their busy and idle timings.
  #[serde(default)]
  pub print_performance_info: bool,
}

impl Default for LoggerConfig {
  fn default() -> Self {
    Self {
      filter: default_log_filter(),
      format: LoggerConfigFormat::default(),
      print_performance_info: false,
    }
  }
}

fn default_log_filter() -> String {
  "info".to_string()
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct ServerConfig {
  /// The port to listen on, default to 9000
  #[serde(default = "default_server_port")]
  pub port: u16,
  /// The host to listen on, default to 127.0.0.1
  #[serde(default = "default_server_host")]
  pub host: String,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      port: default_server_port(),
      host: default_server_host(),
    }
  }
}

fn default_server_port() -> u16 {
  9000
}

fn default_server_host() -> String {
  "127.0.0.1".to_string()
}

#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[serde(tag = "type")]
/// An upstream the resolved GraphQL operations are executed against.
pub enum SourceDefinition {
  #[serde(rename = "graphql")]
  /// A simple, single GraphQL endpoint
  GraphQL {
    /// The identifier of the source. This is used to reference the source in the `from` field of an endpoint definition.
    id: String,
    /// The configuration for the GraphQL source.
    config: GraphQLSourceConfig,
  },
  #[serde(rename = "mock")]
  /// A static response, returned for every executed operation
  Mock {
    /// The identifier of the source. This is used to reference the source in the `from` field of an endpoint definition.
    id: String,
    /// The configuration for the mocked source.
    config: MockedSourceConfig,
  },
}

impl SourceDefinition {
  pub fn id(&self) -> &str {
    match self {
      SourceDefinition::GraphQL { id, .. } => id,
      SourceDefinition::Mock { id, .. } => id,
    }
  }
}

/// An upstream based on a simple, single GraphQL endpoint.
///
/// Operations are forwarded as `POST` requests with a JSON body. Persisted query hashes are resolved by the
/// gateway, so the upstream always receives the full operation text.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
#[schemars(example = "graphql_source_definition_example1")]
pub struct GraphQLSourceConfig {
  /// The HTTP(S) endpoint URL for the GraphQL source.
  pub endpoint: String,
}

fn graphql_source_definition_example1() -> JsonSchemaExample<SourceDefinition> {
  JsonSchemaExample {
    wrapper: None,
    metadata: JsonSchemaExampleMetadata::new("Simple", None),
    example: SourceDefinition::GraphQL {
      id: "my-source".to_string(),
      config: GraphQLSourceConfig {
        endpoint: "https://my-source.com/graphql".to_string(),
      },
    },
  }
}

/// A mocked upstream with a static response for all executed operations.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct MockedSourceConfig {
  /// Path to a JSON file with the GraphQL response body.
  pub response_data: LocalFileReference,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("failed to read config file {path:?}: {source}")]
  ReadError {
    path: String,
    source: std::io::Error,
  },
  #[error("unsupported config file extension: {0:?}, expected .json, .yaml or .yml")]
  UnsupportedFormat(String),
  #[error("failed to interpolate config file: {}", .0.join(", "))]
  InterpolationError(Vec<String>),
  #[error("failed to parse JSON config file: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("failed to parse YAML config file: {0}")]
  YamlError(#[from] serde_yaml::Error),
}

#[tracing::instrument(level = "trace", skip(get_env_value))]
pub fn load_config(
  file_path: &str,
  get_env_value: impl EnvVars,
) -> Result<GatewayConfig, ConfigError> {
  let path = Path::new(file_path);
  let format = ConfigFormat::from_path(path)?;

  let raw_contents = read_to_string(path).map_err(|source| ConfigError::ReadError {
    path: file_path.to_string(),
    source,
  })?;

  let base_path = path.parent().unwrap_or_else(|| Path::new("")).to_path_buf();
  BASE_PATH.with(|bp| {
    *bp.borrow_mut() = base_path;
  });

  parse_config_contents(&raw_contents, format, get_env_value)
}

pub fn parse_config_contents(
  contents: &str,
  format: ConfigFormat,
  get_env_value: impl EnvVars,
) -> Result<GatewayConfig, ConfigError> {
  let (interpolated, warnings) =
    interpolate(contents, get_env_value).map_err(ConfigError::InterpolationError)?;

  for warning in warnings {
    warn!("config interpolation: {}", warning);
  }

  Ok(match format {
    ConfigFormat::Json => serde_json::from_str::<GatewayConfig>(&interpolated)?,
    ConfigFormat::Yaml => serde_yaml::from_str::<GatewayConfig>(&interpolated)?,
  })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigFormat {
  Json,
  Yaml,
}

impl ConfigFormat {
  pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
    match path.extension().and_then(|ext| ext.to_str()) {
      Some("json") => Ok(ConfigFormat::Json),
      Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
      other => Err(ConfigError::UnsupportedFormat(
        other.unwrap_or_default().to_string(),
      )),
    }
  }
}
