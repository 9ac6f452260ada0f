use async_trait::async_trait;
use serde_json::json;

use crate::envelope::ResponseEnvelope;
use crate::tools::catalog::ToolDefinition;
use crate::tools::handler::{Params, ToolContext, ToolHandler};
use crate::tools::registry::ToolRegistry;
use crate::types::{Error, Result};

pub fn register(registry: &mut ToolRegistry) -> Result<()> {
    registry.register(CheckApiHealth)
}

/// Backend reachability check. Never raises; an outage is reported as data.
#[derive(Debug)]
pub struct CheckApiHealth;

#[async_trait]
impl ToolHandler for CheckApiHealth {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "check_api_health",
            "Check whether the shopping API server is reachable and healthy.",
        )
    }

    async fn call(&self, ctx: &ToolContext, _params: Params) -> Result<ResponseEnvelope> {
        match ctx.client.health().await {
            Ok(data) => Ok(ResponseEnvelope::success("API server is healthy.").with_data(data)),
            Err(err @ (Error::Transport(_) | Error::Timeout(_))) => {
                tracing::warn!(error = %err, "api_unreachable");
                Ok(ResponseEnvelope::failure(
                    "Cannot connect to the API server. Make sure the backend is running.",
                )
                .with_data(json!({"error": err.to_string()})))
            }
            Err(err) => Ok(ResponseEnvelope::failure(format!(
                "API server is unhealthy: {}",
                err
            ))
            .with_data(json!({"error": err.to_string()}))),
        }
    }
}
