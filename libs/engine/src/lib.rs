pub mod endpoint_runtime;
pub mod gateway;
pub mod plugin_manager;
pub mod source;
