mod config;
mod plugin;

pub use config::GraphQLExplorer as Explorer;
pub use config::GraphiQLPluginConfig as Config;
pub use plugin::GraphiQLPlugin as Plugin;
