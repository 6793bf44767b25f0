use gateway_config::GatewayConfig;
use schemars::schema_for;

const SCHEMA_PATH: &str = "libs/config/gateway.schema.json";

pub fn main() -> Result<(), Box<dyn std::error::Error>> {
  println!("generating JSON schema for the gateway config file...");
  let schema = schema_for!(GatewayConfig);
  let as_string = serde_json::to_string_pretty(&schema)?;
  println!("writing to: {}", SCHEMA_PATH);
  std::fs::write(SCHEMA_PATH, as_string)?;
  println!("done");

  Ok(())
}
