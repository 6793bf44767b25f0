use anyhow::Context;
use gateway::run_services;
use gateway_config::{load_config, LoggerConfig};
use gateway_logger::logger_layer::build_logger;
use tracing::{info, subscriber::set_global_default};
use tracing_subscriber::layer::SubscriberExt;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
  let config_file_path = std::env::args()
    .nth(1)
    .unwrap_or("./config.json".to_string());

  // The `logger` section is only known after the config is loaded, so loading is logged with defaults.
  let default_logger_config = LoggerConfig::default();
  let bootstrap_logger = build_logger(
    default_logger_config.format,
    &default_logger_config.filter,
    default_logger_config.print_performance_info,
  )?;
  let config = tracing::subscriber::with_default(
    tracing_subscriber::registry().with(bootstrap_logger),
    || load_config(&config_file_path, |key: &str| std::env::var(key).ok()),
  )
  .with_context(|| format!("failed to load config file {:?}", config_file_path))?;

  let logger = build_logger(
    config.logger.format,
    &config.logger.filter,
    config.logger.print_performance_info,
  )
  .context("invalid logger filter")?;
  set_global_default(tracing_subscriber::registry().with(logger))
    .context("failed to set global default logger")?;

  info!("configuration loaded from {:?}", config_file_path);

  run_services(config).await
}
