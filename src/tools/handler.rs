//! The handler seam and the context every handler receives.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use super::catalog::ToolDefinition;
use crate::auth::PendingAuthStore;
use crate::client::ApiClient;
use crate::envelope::ResponseEnvelope;
use crate::types::{Error, Result, ToolsConfig};

/// Shared collaborators handed to every handler invocation.
#[derive(Clone)]
pub struct ToolContext {
    pub client: Arc<dyn ApiClient>,
    pub pending: Arc<PendingAuthStore>,
    pub config: ToolsConfig,
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("pending", &self.pending)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ToolContext {
    pub fn new(
        client: Arc<dyn ApiClient>,
        pending: Arc<PendingAuthStore>,
        config: ToolsConfig,
    ) -> Self {
        Self {
            client,
            pending,
            config,
        }
    }
}

/// Validated, default-filled arguments of one call.
#[derive(Debug, Clone)]
pub struct Params(Value);

impl Params {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Parse into the handler's typed parameter record.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.0.clone())
            .map_err(|e| Error::validation(format!("invalid arguments: {}", e)))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }
}

/// One callable tool.
///
/// Handlers return `Ok` for every outcome they can explain to the assistant
/// (including business failures) and `Err` for faults; the dispatcher turns
/// the latter into a failure envelope.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    async fn call(&self, ctx: &ToolContext, params: Params) -> Result<ResponseEnvelope>;
}
