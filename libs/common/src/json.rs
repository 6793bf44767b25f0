use serde::de::Error as DeError;
use serde_json::{from_str, Error as SerdeError, Map, Value};

pub fn parse_and_extract_json_map_value(value: &str) -> Result<Map<String, Value>, SerdeError> {
  let parsed_json = from_str::<Value>(value);

  match parsed_json {
    Ok(Value::Object(v)) => Ok(v),
    Ok(_) => Err(DeError::custom("expected object")),
    Err(e) => Err(e),
  }
}

/// Accepts either a JSON object or a JSON-encoded string holding an object. `null` maps to `None`.
pub fn json_map_from_value(value: Option<Value>) -> Result<Option<Map<String, Value>>, SerdeError> {
  match value {
    None | Some(Value::Null) => Ok(None),
    Some(Value::Object(v)) => Ok(Some(v)),
    Some(Value::String(v)) if v.is_empty() => Ok(None),
    Some(Value::String(v)) => parse_and_extract_json_map_value(&v).map(Some),
    Some(_) => Err(DeError::custom("expected object")),
  }
}
