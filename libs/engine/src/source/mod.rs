pub mod graphql_source;
pub mod mock_source;
pub mod runtime;
