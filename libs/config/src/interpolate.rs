use lazy_static::lazy_static;
use regex::{Captures, Regex};

// Interpolation follows the POSIX shell parameter expansion rules:
// https://pubs.opengroup.org/onlinepubs/000095399/basedefs/xbd_chap08.html

lazy_static! {
  static ref ENV_VAR_INTERPOLATION_REGEX: Regex = Regex::new(
    r"(?x)
    \$\$|
    \$([[:word:].]+)|
    \$\{([[:word:].]+)(?:(:?-|:?\?)([^}]*))?\}",
  )
  // @expected: static pattern
  .unwrap();
}

pub type Warnings = Vec<String>;
pub type Errors = Vec<String>;

/// Source of environment variables used while interpolating the config file.
pub trait EnvVars {
  fn get_var(&self, key: &str) -> Option<String>;
}

impl<F> EnvVars for F
where
  F: Fn(&str) -> Option<String>,
{
  fn get_var(&self, key: &str) -> Option<String> {
    self(key)
  }
}

/// Replaces `$VAR`, `${VAR}`, `${VAR:-default}`, `${VAR-default}`, `${VAR:?error}` and `${VAR?error}`
/// with values from `env`. `$$` is an escaped `$`.
///
/// Unknown variables without a default are replaced by an empty string and reported as warnings.
/// Required (`?`) variables that are missing are reported as errors.
pub fn interpolate(input: &str, env: impl EnvVars) -> Result<(String, Warnings), Errors> {
  let mut errors = Errors::new();
  let mut warnings = Warnings::new();

  let interpolated = ENV_VAR_INTERPOLATION_REGEX
    .replace_all(input, |caps: &Captures| {
      let name = match caps.get(1).or_else(|| caps.get(2)) {
        Some(name) => name.as_str(),
        None => return "$".to_string(),
      };
      let flag = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
      let fallback = caps.get(4).map(|m| m.as_str()).unwrap_or_default();
      let value = env.get_var(name);

      match (flag, value) {
        (":-", Some(v)) | (":?", Some(v)) if !v.is_empty() => v,
        ("-", Some(v)) | ("?", Some(v)) => v,
        (":-", _) | ("-", None) => fallback.to_string(),
        (":?", _) => {
          errors.push(format!(
            "non-empty env var {:?} is required in config: {}",
            name, fallback
          ));
          String::new()
        }
        ("?", None) => {
          errors.push(format!(
            "env var {:?} is required in config: {}",
            name, fallback
          ));
          String::new()
        }
        (_, Some(v)) => v,
        (_, None) => {
          warnings.push(format!("unknown env var {:?} in config", name));
          String::new()
        }
      }
    })
    .into_owned();

  match errors.is_empty() {
    true => Ok((interpolated, warnings)),
    false => Err(errors),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn env(key: &str) -> Option<String> {
    match key {
      "ENDPOINT" => Some("https://upstream.local/graphql".to_string()),
      "EMPTY" => Some("".to_string()),
      _ => None,
    }
  }

  #[test]
  fn replaces_known_variables() {
    let (out, warnings) = interpolate("endpoint: ${ENDPOINT}, again: $ENDPOINT", env).unwrap();

    assert_eq!(
      out,
      "endpoint: https://upstream.local/graphql, again: https://upstream.local/graphql"
    );
    assert!(warnings.is_empty());
  }

  #[test]
  fn defaults_and_escapes() {
    let (out, _) = interpolate(
      "a: ${MISSING:-1000}, b: ${EMPTY:-x}, c: ${EMPTY-x}, d: $$HOME",
      env,
    )
    .unwrap();

    assert_eq!(out, "a: 1000, b: x, c: , d: $HOME");
  }

  #[test]
  fn unknown_variable_is_a_warning() {
    let (out, warnings) = interpolate("port: ${PORT}", env).unwrap();

    assert_eq!(out, "port: ");
    assert_eq!(warnings.len(), 1);
  }

  #[test]
  fn required_variables_are_errors() {
    let errors = interpolate("a: ${MISSING?set it}, b: ${EMPTY:?non empty}", env).unwrap_err();

    assert_eq!(errors.len(), 2);
  }
}
