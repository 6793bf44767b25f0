use gateway_common::{
  execute::RequestExecutionContext,
  graphql::GraphQLRequest,
  http::GatewayHttpResponse,
  plugin::{CreatablePlugin, Plugin, PluginError},
};
use gateway_config::PluginDefinition;
use tracing::debug;

/// Runs the hooks of an endpoint's plugins, in the order they were configured.
///
/// Every hook that receives the request context stops at the first plugin that short-circuits.
#[derive(Debug, Default)]
pub struct PluginManager {
  plugins: Vec<Box<dyn Plugin>>,
}

impl PluginManager {
  pub fn new_from_vec(plugins: Vec<Box<dyn Plugin>>) -> Self {
    Self { plugins }
  }

  pub async fn create_plugin<T: CreatablePlugin>(
    config: T::Config,
  ) -> Result<Box<dyn Plugin>, PluginError> {
    T::create(config).await
  }

  pub async fn new(plugins_config: &[PluginDefinition]) -> Result<Self, PluginError> {
    let mut instance = PluginManager::default();

    for plugin_def in plugins_config.iter() {
      if !plugin_def.is_enabled() {
        debug!("skipping disabled plugin: {:?}", plugin_def);
        continue;
      }

      let plugin = match plugin_def {
        PluginDefinition::GraphiQLPlugin { config, .. } => {
          Self::create_plugin::<graphiql_plugin::Plugin>(config.clone().unwrap_or_default()).await?
        }
        PluginDefinition::PersistedQueriesPlugin { config, .. } => {
          Self::create_plugin::<persisted_queries_plugin::Plugin>(
            config.clone().unwrap_or_default(),
          )
          .await?
        }
      };

      instance.register_boxed_plugin(plugin);
    }

    Ok(instance)
  }

  pub fn register_boxed_plugin(&mut self, plugin: Box<dyn Plugin>) {
    self.plugins.push(plugin);
  }

  pub fn len(&self) -> usize {
    self.plugins.len()
  }

  pub fn is_empty(&self) -> bool {
    self.plugins.is_empty()
  }

  #[tracing::instrument(level = "debug", skip(self, context))]
  pub async fn on_downstream_http_request(&self, context: &mut RequestExecutionContext) {
    for plugin in self.plugins.iter() {
      plugin.on_downstream_http_request(context).await;

      if context.is_short_circuit() {
        return;
      }
    }
  }

  #[tracing::instrument(level = "debug", skip(self, context, params))]
  pub async fn on_graphql_params(
    &self,
    context: &mut RequestExecutionContext,
    params: &mut GraphQLRequest,
  ) {
    for plugin in self.plugins.iter() {
      plugin.on_graphql_params(context, params).await;

      if context.is_short_circuit() {
        return;
      }
    }
  }

  #[tracing::instrument(level = "debug", skip(self, context))]
  pub async fn on_downstream_graphql_request(&self, context: &mut RequestExecutionContext) {
    for plugin in self.plugins.iter() {
      plugin.on_downstream_graphql_request(context).await;

      if context.is_short_circuit() {
        return;
      }
    }
  }

  #[tracing::instrument(level = "debug", skip(self, req))]
  pub async fn on_upstream_graphql_request(&self, req: &mut GraphQLRequest) {
    for plugin in self.plugins.iter() {
      plugin.on_upstream_graphql_request(req).await;
    }
  }

  #[tracing::instrument(level = "debug", skip(self, context, response))]
  pub fn on_downstream_http_response(
    &self,
    context: &mut RequestExecutionContext,
    response: &mut GatewayHttpResponse,
  ) {
    for plugin in self.plugins.iter() {
      plugin.on_downstream_http_response(context, response);

      if context.is_short_circuit() {
        return;
      }
    }
  }
}
