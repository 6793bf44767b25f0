use std::fmt::{Display, Formatter};

use bytes::Bytes;
use graphql_parser::{
  parse_query,
  query::{Definition, Document, OperationDefinition, ParseError},
};
use mime::{Mime, APPLICATION_JSON};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{Error as SerdeError, Map, Value};
use tracing::debug;

use crate::http::{
  extract_accept, extract_content_type, parse_query_string, GatewayHttpRequest,
  GatewayHttpResponse, Method, StatusCode, APPLICATION_WWW_FORM_URLENCODED,
};
use crate::json::{json_map_from_value, parse_and_extract_json_map_value};

pub const APPLICATION_GRAPHQL: &str = "application/graphql";
pub const APPLICATION_GRAPHQL_JSON: &str = "application/graphql-response+json";
pub static APPLICATION_GRAPHQL_JSON_MIME: Lazy<Mime> = Lazy::new(|| {
  APPLICATION_GRAPHQL_JSON
    .parse::<Mime>()
    // @expected: we're parsing a statically defined constant, we know it works ;)
    .unwrap()
});

/// A GraphQL request after it was decoded from whatever HTTP encoding the client used.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct GraphQLRequest {
  // The GraphQL operation, as string. Missing when the client only sent a persisted query hash.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub query: Option<String>,
  // The operation name, if specified
  #[serde(rename = "operationName")]
  #[serde(skip_serializing_if = "Option::is_none")]
  pub operation_name: Option<String>,
  // GraphQL operation variables, in JSON format
  #[serde(skip_serializing_if = "Option::is_none")]
  pub variables: Option<Map<String, Value>>,
  // GraphQL execution extensions, in JSON format
  #[serde(skip_serializing_if = "Option::is_none")]
  pub extensions: Option<Map<String, Value>>,
  /// Set when the query text was loaded from the persisted queries store.
  #[serde(skip)]
  pub persisted: bool,
  /// Set when the client sent a persisted query hash, whether or not it was found.
  #[serde(skip)]
  pub has_persisted_params: bool,
}

impl Display for GraphQLRequest {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "{}",
      serde_json::to_string(self)
        .unwrap_or_else(|e| ExtractGraphQLOperationError::SerializationError(e).to_string())
    )
  }
}

#[derive(thiserror::Error, Debug)]
pub enum ExtractGraphQLOperationError {
  #[error("invalid variables json format")]
  InvalidVariablesJsonFormat(SerdeError),
  #[error("invalid extensions json format")]
  InvalidExtensionsJsonFormat(SerdeError),
  #[error("invalid body json format")]
  InvalidBodyJsonFormat(SerdeError),
  #[error("failed to read request body")]
  FailedToReadRequestBody,
  #[error("failed to parse GraphQL operation")]
  GraphQLParserError(ParseError),
  #[error("failed to locate any GraphQL operation in request")]
  EmptyExtraction,
  #[error("unknown operation named {0:?}")]
  UnknownOperationName(String),
  #[error("must provide an operation")]
  MissingOperation,
  #[error("serialization error")]
  SerializationError(SerdeError),
}

impl ExtractGraphQLOperationError {
  pub fn into_response(&self, accept: Option<Mime>) -> GatewayHttpResponse {
    let status = match accept {
      None => StatusCode::OK,
      Some(accept_header) => match self {
        ExtractGraphQLOperationError::GraphQLParserError(_)
        | ExtractGraphQLOperationError::UnknownOperationName(_)
        | ExtractGraphQLOperationError::MissingOperation
          if accept_header == APPLICATION_JSON =>
        {
          StatusCode::OK
        }
        _ => StatusCode::BAD_REQUEST,
      },
    };

    GraphQLResponse::new_error(self.to_string().as_str()).into_with_status_code(status)
  }
}

/// The JSON body shape accepted over `POST`. `variables` and `extensions` are kept loose here,
/// because some clients send them as JSON-encoded strings.
#[derive(Deserialize, Debug)]
struct RawGraphQLRequestBody {
  query: Option<String>,
  #[serde(rename = "operationName")]
  operation_name: Option<String>,
  variables: Option<Value>,
  extensions: Option<Value>,
}

pub type ExtractionResult = (
  Option<Mime>,
  Result<GraphQLRequest, ExtractGraphQLOperationError>,
);

impl GraphQLRequest {
  /// Decodes the GraphQL parameters from an incoming HTTP request.
  ///
  /// Non-`POST` requests are read from the query string. `POST` requests are decoded based on
  /// their `Content-Type`: `application/graphql` carries the raw operation,
  /// `application/x-www-form-urlencoded` carries form fields, and everything else (including a
  /// missing header) is treated as JSON.
  ///
  /// An empty or missing `query` is not an error at this stage: it may be filled later from the
  /// persisted queries store.
  #[tracing::instrument(
    level = "debug",
    skip(http_request),
    name = "GraphQLRequest::new_from_http_request"
  )]
  pub fn new_from_http_request(http_request: &GatewayHttpRequest) -> ExtractionResult {
    let accept = extract_accept(&http_request.headers);

    if http_request.method != Method::POST {
      debug!("non-POST request, extracting GraphQL parameters from the query string");

      return (accept, Self::new_from_form_fields(&http_request.query_string));
    }

    let content_type = extract_content_type(&http_request.headers);
    let essence = content_type.as_ref().map(|v| v.essence_str().to_string());

    let result = match essence.as_deref() {
      Some(APPLICATION_GRAPHQL) => match std::str::from_utf8(&http_request.body) {
        Ok(body) => Ok(GraphQLRequest {
          query: Some(body.to_string()),
          ..Default::default()
        }),
        Err(_) => Err(ExtractGraphQLOperationError::FailedToReadRequestBody),
      },
      Some(v) if v == APPLICATION_WWW_FORM_URLENCODED.essence_str() => {
        match std::str::from_utf8(&http_request.body) {
          Ok(body) => Self::new_from_form_fields(body),
          Err(_) => Err(ExtractGraphQLOperationError::FailedToReadRequestBody),
        }
      }
      _ => Self::new_from_json_body(http_request),
    };

    (accept, result)
  }

  fn new_from_form_fields(input: &str) -> Result<GraphQLRequest, ExtractGraphQLOperationError> {
    let params = parse_query_string(input);

    let variables = match params.get("variables").filter(|v| !v.is_empty()) {
      Some(v) => Some(
        parse_and_extract_json_map_value(v)
          .map_err(ExtractGraphQLOperationError::InvalidVariablesJsonFormat)?,
      ),
      None => None,
    };

    let extensions = match params.get("extensions").filter(|v| !v.is_empty()) {
      Some(v) => Some(
        parse_and_extract_json_map_value(v)
          .map_err(ExtractGraphQLOperationError::InvalidExtensionsJsonFormat)?,
      ),
      None => None,
    };

    Ok(GraphQLRequest {
      query: params.get("query").cloned(),
      operation_name: params.get("operationName").cloned(),
      variables,
      extensions,
      ..Default::default()
    })
  }

  fn new_from_json_body(
    http_request: &GatewayHttpRequest,
  ) -> Result<GraphQLRequest, ExtractGraphQLOperationError> {
    let body = http_request
      .json_body::<RawGraphQLRequestBody>()
      .map_err(ExtractGraphQLOperationError::InvalidBodyJsonFormat)?;

    Ok(GraphQLRequest {
      query: body.query,
      operation_name: body.operation_name,
      variables: json_map_from_value(body.variables)
        .map_err(ExtractGraphQLOperationError::InvalidVariablesJsonFormat)?,
      extensions: json_map_from_value(body.extensions)
        .map_err(ExtractGraphQLOperationError::InvalidExtensionsJsonFormat)?,
      ..Default::default()
    })
  }

  /// The operation text, if the request carries a non-empty one.
  pub fn query_text(&self) -> Option<&str> {
    self.query.as_deref().filter(|v| !v.is_empty())
  }
}

impl From<&GraphQLRequest> for Bytes {
  fn from(request: &GraphQLRequest) -> Self {
    serde_json::to_vec(&request)
      .unwrap_or_else(|e| {
        ExtractGraphQLOperationError::SerializationError(e)
          .to_string()
          .into_bytes()
      })
      .into()
  }
}

/// An error with a message and optional extensions.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct GraphQLError {
  /// The error message.
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub locations: Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub path: Option<Value>,
  /// Extensions to the error.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub extensions: Option<Map<String, Value>>,
}

impl std::fmt::Display for GraphQLError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.message)
  }
}

impl GraphQLError {
  pub fn new(message: &str) -> Self {
    GraphQLError {
      message: message.to_string(),
      locations: None,
      path: None,
      extensions: None,
    }
  }

  /// Sets `extensions.code`, the machine readable error identifier clients match on.
  pub fn with_code(mut self, code: &str) -> Self {
    self
      .extensions
      .get_or_insert_with(Map::new)
      .insert("code".to_string(), Value::String(code.to_string()));
    self
  }
}

pub type ParsedGraphQLDocument = Document<'static, String>;

#[derive(Debug)]
pub struct ParsedGraphQLRequest {
  pub request: GraphQLRequest,
  pub parsed_operation: ParsedGraphQLDocument,
}

impl ParsedGraphQLRequest {
  #[tracing::instrument(level = "trace", skip(raw_request), name = "graphql_parse")]
  pub fn create_and_parse(raw_request: GraphQLRequest) -> Result<Self, ParseError> {
    parse_graphql_operation(raw_request.query.as_deref().unwrap_or_default()).map(
      |parsed_operation| ParsedGraphQLRequest {
        request: raw_request,
        parsed_operation,
      },
    )
  }

  /// The operation named by `operationName`, or the first operation of the document when no
  /// (or an empty) name was sent.
  pub fn executable_operation(&self) -> Option<&Definition<'static, String>> {
    match self.request.operation_name.as_deref().filter(|v| !v.is_empty()) {
      Some(op_name) => self.parsed_operation.definitions.iter().find(|v| {
        if let Definition::Operation(op) = v {
          let name: &Option<String> = match op {
            OperationDefinition::SelectionSet(_) => &None,
            OperationDefinition::Query(query) => &query.name,
            OperationDefinition::Mutation(mutation) => &mutation.name,
            OperationDefinition::Subscription(subscription) => &subscription.name,
          };

          if let Some(actual_name) = name {
            return actual_name.as_str() == op_name;
          }
        }

        false
      }),
      _ => self
        .parsed_operation
        .definitions
        .iter()
        .find(|v| matches!(v, Definition::Operation(_))),
    }
  }

  pub fn select_operation(
    &self,
  ) -> Result<&Definition<'static, String>, ExtractGraphQLOperationError> {
    self.executable_operation().ok_or_else(|| {
      match self.request.operation_name.as_deref().filter(|v| !v.is_empty()) {
        Some(name) => ExtractGraphQLOperationError::UnknownOperationName(name.to_string()),
        None => ExtractGraphQLOperationError::MissingOperation,
      }
    })
  }
}

#[derive(Deserialize, Serialize, Debug)]
pub struct GraphQLResponse {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub data: Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub errors: Option<Vec<GraphQLError>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub extensions: Option<Value>,

  #[serde(skip)]
  downstream_http_code: Option<StatusCode>,
}

impl GraphQLResponse {
  pub fn new_error(error: &str) -> Self {
    Self::new_errors(vec![GraphQLError::new(error)])
  }

  pub fn new_errors(errors: Vec<GraphQLError>) -> Self {
    GraphQLResponse {
      data: None,
      errors: Some(errors),
      extensions: None,
      downstream_http_code: None,
    }
  }

  pub fn new_error_with_code(error: &str, status_code: StatusCode) -> Self {
    GraphQLResponse {
      data: None,
      errors: Some(vec![GraphQLError::new(error)]),
      extensions: None,
      downstream_http_code: Some(status_code),
    }
  }

  pub fn into_with_status_code(self, code: StatusCode) -> GatewayHttpResponse {
    GatewayHttpResponse {
      body: self.into(),
      status: code,
      headers: Default::default(),
    }
  }

  pub fn to_bytes(&self, pretty: bool) -> Bytes {
    let serialized = match pretty {
      true => serde_json::to_vec_pretty(self),
      false => serde_json::to_vec(self),
    };

    serialized
      .unwrap_or_else(|e| {
        ExtractGraphQLOperationError::SerializationError(e)
          .to_string()
          .into_bytes()
      })
      .into()
  }

  pub fn into_http_response(self, pretty: bool) -> GatewayHttpResponse {
    GatewayHttpResponse {
      body: self.to_bytes(pretty),
      status: self.downstream_http_code.unwrap_or(StatusCode::OK),
      headers: Default::default(),
    }
  }
}

impl From<GraphQLResponse> for Bytes {
  fn from(response: GraphQLResponse) -> Self {
    response.to_bytes(false)
  }
}

impl From<GraphQLResponse> for GatewayHttpResponse {
  fn from(response: GraphQLResponse) -> Self {
    response.into_http_response(false)
  }
}

pub fn parse_graphql_operation(operation_str: &str) -> Result<ParsedGraphQLDocument, ParseError> {
  parse_query::<String>(operation_str).map(|v| v.into_static())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::http::ToHeadersMap;
  use serde_json::json;

  fn http_request(
    method: Method,
    headers: Vec<(&str, &str)>,
    query_string: &str,
    body: &str,
  ) -> GatewayHttpRequest {
    GatewayHttpRequest {
      headers: headers.to_headers_map().unwrap(),
      method,
      uri: "/graphql".to_string(),
      query_string: query_string.to_string(),
      body: body.to_string().into(),
    }
  }

  #[test]
  fn post_json_body() {
    let (_, result) = GraphQLRequest::new_from_http_request(&http_request(
      Method::POST,
      vec![("content-type", "application/json")],
      "",
      &json!({
        "query": "query test { __typename }",
        "operationName": "test",
        "variables": { "a": 1 },
        "extensions": { "persistedQuery": { "sha256Hash": "abc", "version": 1 } }
      })
      .to_string(),
    ));

    let request = result.unwrap();
    assert_eq!(request.query.as_deref(), Some("query test { __typename }"));
    assert_eq!(request.operation_name.as_deref(), Some("test"));
    assert_eq!(request.variables.unwrap().get("a"), Some(&json!(1)));
    assert!(request.extensions.unwrap().contains_key("persistedQuery"));
    assert!(!request.persisted);
    assert!(!request.has_persisted_params);
  }

  #[test]
  fn post_json_body_without_query_and_content_type() {
    let (_, result) = GraphQLRequest::new_from_http_request(&http_request(
      Method::POST,
      vec![],
      "",
      &json!({
        "extensions": { "persistedQuery": { "sha256Hash": "abc", "version": 1 } }
      })
      .to_string(),
    ));

    let request = result.unwrap();
    assert_eq!(request.query, None);
    assert_eq!(request.query_text(), None);
    assert!(request.extensions.is_some());
  }

  #[test]
  fn post_json_body_with_string_variables() {
    let (_, result) = GraphQLRequest::new_from_http_request(&http_request(
      Method::POST,
      vec![("content-type", "application/json")],
      "",
      &json!({
        "query": "{ hello }",
        "variables": "{\"id\": \"1\"}"
      })
      .to_string(),
    ));

    let variables = result.unwrap().variables.unwrap();
    assert_eq!(variables.get("id"), Some(&json!("1")));

    let (_, result) = GraphQLRequest::new_from_http_request(&http_request(
      Method::POST,
      vec![("content-type", "application/json")],
      "",
      &json!({ "query": "{ hello }", "variables": "not json" }).to_string(),
    ));

    assert!(matches!(
      result,
      Err(ExtractGraphQLOperationError::InvalidVariablesJsonFormat(_))
    ));
  }

  #[test]
  fn post_invalid_json_body() {
    let (_, result) = GraphQLRequest::new_from_http_request(&http_request(
      Method::POST,
      vec![("content-type", "application/json")],
      "",
      "{",
    ));

    assert!(matches!(
      result,
      Err(ExtractGraphQLOperationError::InvalidBodyJsonFormat(_))
    ));
  }

  #[test]
  fn post_application_graphql_body() {
    let (_, result) = GraphQLRequest::new_from_http_request(&http_request(
      Method::POST,
      vec![("content-type", "application/graphql; charset=utf-8")],
      "",
      "{ hello }",
    ));

    let request = result.unwrap();
    assert_eq!(request.query.as_deref(), Some("{ hello }"));
    assert_eq!(request.operation_name, None);
    assert_eq!(request.extensions, None);
  }

  #[test]
  fn post_form_urlencoded_body() {
    let (_, result) = GraphQLRequest::new_from_http_request(&http_request(
      Method::POST,
      vec![("content-type", "application/x-www-form-urlencoded")],
      "",
      "query=%7B+hello+%7D&operationName=Hello&variables=%7B%22a%22%3A1%7D",
    ));

    let request = result.unwrap();
    assert_eq!(request.query.as_deref(), Some("{ hello }"));
    assert_eq!(request.operation_name.as_deref(), Some("Hello"));
    assert_eq!(request.variables.unwrap().get("a"), Some(&json!(1)));
  }

  #[test]
  fn get_query_string() {
    let (_, result) = GraphQLRequest::new_from_http_request(&http_request(
      Method::GET,
      vec![],
      "extensions=%7B%22persistedQuery%22%3A%7B%22sha256Hash%22%3A%22abc%22%2C%22version%22%3A1%7D%7D",
      "",
    ));

    let request = result.unwrap();
    assert_eq!(request.query, None);
    assert_eq!(
      request.extensions.unwrap().get("persistedQuery"),
      Some(&json!({ "sha256Hash": "abc", "version": 1 }))
    );

    let (_, result) = GraphQLRequest::new_from_http_request(&http_request(
      Method::GET,
      vec![],
      "query=%7B%20hello%20%7D&extensions=nope",
      "",
    ));

    assert!(matches!(
      result,
      Err(ExtractGraphQLOperationError::InvalidExtensionsJsonFormat(_))
    ));
  }

  #[test]
  fn error_with_code_serializes_extensions() {
    let response = GraphQLResponse::new_errors(vec![
      GraphQLError::new("PersistedQueryNotFound").with_code("PERSISTED_QUERY_NOT_FOUND")
    ]);

    assert_eq!(
      String::from_utf8(response.to_bytes(false).to_vec()).unwrap(),
      r#"{"errors":[{"message":"PersistedQueryNotFound","extensions":{"code":"PERSISTED_QUERY_NOT_FOUND"}}]}"#
    );
  }

  #[test]
  fn extraction_error_status_depends_on_accept() {
    let response = ExtractGraphQLOperationError::EmptyExtraction.into_response(None);
    assert_eq!(response.status, StatusCode::OK);

    let response = ExtractGraphQLOperationError::EmptyExtraction
      .into_response(Some(APPLICATION_GRAPHQL_JSON_MIME.clone()));
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
  }

  #[test]
  fn parse_selects_named_operation() {
    let parsed = ParsedGraphQLRequest::create_and_parse(GraphQLRequest {
      query: Some("query a { a } query b { b }".to_string()),
      operation_name: Some("b".to_string()),
      ..Default::default()
    })
    .unwrap();

    match parsed.executable_operation() {
      Some(Definition::Operation(OperationDefinition::Query(q))) => {
        assert_eq!(q.name.as_deref(), Some("b"))
      }
      other => panic!("unexpected operation: {:?}", other),
    }
  }

  #[test]
  fn select_operation_reports_why_nothing_is_executable() {
    let parse = |query: &str, operation_name: Option<&str>| {
      ParsedGraphQLRequest::create_and_parse(GraphQLRequest {
        query: Some(query.to_string()),
        operation_name: operation_name.map(ToString::to_string),
        ..Default::default()
      })
      .unwrap()
    };

    assert!(parse("query a { a } query b { b }", Some("a")).select_operation().is_ok());
    assert!(parse("query a { a }", Some("")).select_operation().is_ok());
    assert!(parse("{ a }", None).select_operation().is_ok());

    assert!(matches!(
      parse("query a { a }", Some("c")).select_operation(),
      Err(ExtractGraphQLOperationError::UnknownOperationName(name)) if name == "c"
    ));
    assert!(matches!(
      parse("{ a }", Some("a")).select_operation(),
      Err(ExtractGraphQLOperationError::UnknownOperationName(_))
    ));
    assert!(matches!(
      parse("fragment f on Query { a }", None).select_operation(),
      Err(ExtractGraphQLOperationError::MissingOperation)
    ));
  }
}
