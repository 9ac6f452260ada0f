//! Core types for the tool server.
//!
//! This module provides foundational types used throughout the system:
//! - **IDs**: Strongly-typed identifiers (CorrelationId, AuthCode)
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Configuration structures for server, API client and tools

mod config;
mod errors;
mod ids;

pub use config::{
    ApiConfig, AuthConfig, Config, ObservabilityConfig, ServerConfig, ToolsConfig,
    TransportConfig, ENV_API_URL, ENV_LOG_FORMAT, ENV_LOG_LEVEL,
};
pub use errors::{
    Error, Result, RPC_INTERNAL_ERROR, RPC_INVALID_PARAMS, RPC_INVALID_REQUEST,
    RPC_METHOD_NOT_FOUND, RPC_PARSE_ERROR,
};
pub use ids::{AuthCode, CorrelationId};
