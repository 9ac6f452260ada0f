//! # minutes-mcp
//!
//! MCP tool server for the Minutes quick-commerce API. Exposes catalog, cart,
//! address, checkout and order operations to AI assistants as named tools.
//!
//! ## Architecture
//!
//! Every tool call resolves to exactly one `ResponseEnvelope`:
//! ```text
//!   tools/call ──► McpRouter ──► Dispatcher ──► ToolHandler ──► ApiClient ──► REST backend
//!                                   │  unknown name, bad arguments,
//!                                   │  handler error, handler panic
//!                                   ▼
//!                            ResponseEnvelope {success, message, data?, requiresUserAction?}
//! ```
//!
//! The registry is built once at startup and never mutated. Shared state is
//! limited to the API client's session token and the pending-authorization store.

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod auth;
pub mod client;
pub mod envelope;
pub mod mcp;
pub mod tools;
pub mod types;
pub mod validation;

// Internal utilities
pub mod observability;

pub use envelope::{ImageContent, ResponseEnvelope};
pub use types::{Config, Error, Result};
