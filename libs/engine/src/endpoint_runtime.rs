use gateway_config::EndpointDefinition;

#[derive(Debug)]
pub struct EndpointRuntime {
  pub config: EndpointDefinition,
}

impl EndpointRuntime {
  #[cfg(any(test, feature = "test_utils"))]
  pub fn dummy() -> Self {
    EndpointRuntime {
      config: EndpointDefinition {
        from: "dummy".to_string(),
        path: "/".to_string(),
        pretty: false,
        plugins: None,
      },
    }
  }
}
