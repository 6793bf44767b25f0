use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Output format of the gateway logs.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, JsonSchema, PartialEq)]
pub enum LoggerConfigFormat {
  /// One line per event, with the message and its fields. Small and fast, a good fit for production
  /// terminals.
  #[serde(rename = "compact")]
  #[schemars(title = "compact")]
  Compact,

  /// Multi-line, human friendly output including source locations and span context.
  ///
  /// Useful while developing or debugging the persisted queries flow, too verbose for production.
  #[serde(rename = "pretty")]
  #[schemars(title = "pretty")]
  Pretty,

  /// One JSON object per event, for log aggregators.
  #[serde(rename = "json")]
  #[schemars(title = "json")]
  Json,
}

impl Default for LoggerConfigFormat {
  #[cfg(debug_assertions)]
  fn default() -> Self {
    LoggerConfigFormat::Pretty
  }

  #[cfg(not(debug_assertions))]
  fn default() -> Self {
    if atty::is(atty::Stream::Stdout) {
      LoggerConfigFormat::Compact
    } else {
      LoggerConfigFormat::Json
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn formats_use_lowercase_names() {
    assert_eq!(
      serde_json::from_str::<LoggerConfigFormat>("\"compact\"").unwrap(),
      LoggerConfigFormat::Compact
    );
    assert_eq!(
      serde_json::from_str::<LoggerConfigFormat>("\"json\"").unwrap(),
      LoggerConfigFormat::Json
    );
    assert!(serde_json::from_str::<LoggerConfigFormat>("\"Pretty\"").is_err());
  }
}
