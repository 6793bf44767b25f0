pub mod execute;
pub mod graphql;
pub mod http;
pub mod json;
pub mod plugin;
pub mod serde_utils;
