use crate::config::LoggerConfigFormat;
use tracing_subscriber::{
  filter::ParseError,
  fmt::{self, format::FmtSpan, time::UtcTime},
  EnvFilter, Layer, Registry,
};

pub type BoxedLoggerLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Builds the `fmt` layer installed by the gateway binary.
///
/// `filter` uses the `EnvFilter` directive syntax, for example `info,persisted_queries_plugin=debug`.
/// With `print_performance_info`, span close events (including their busy/idle timings) are logged too.
pub fn build_logger(
  format: LoggerConfigFormat,
  filter: &str,
  print_performance_info: bool,
) -> Result<BoxedLoggerLayer, ParseError> {
  let timer = UtcTime::rfc_3339();
  let filter = EnvFilter::try_new(filter)?;
  let span_events = match print_performance_info {
    true => FmtSpan::CLOSE,
    false => FmtSpan::NONE,
  };

  Ok(match format {
    LoggerConfigFormat::Json => fmt::Layer::<Registry>::default()
      .json()
      .with_timer(timer)
      .with_span_events(span_events)
      .with_filter(filter)
      .boxed(),
    LoggerConfigFormat::Pretty => fmt::Layer::<Registry>::default()
      .pretty()
      .with_timer(timer)
      .with_span_events(span_events)
      .with_filter(filter)
      .boxed(),
    LoggerConfigFormat::Compact => fmt::Layer::<Registry>::default()
      .compact()
      .with_timer(timer)
      .with_span_events(span_events)
      .with_filter(filter)
      .boxed(),
  })
}
