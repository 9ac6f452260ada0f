//! Dispatcher: resolves a tool name, validates, invokes, and guarantees an envelope.
//!
//! Nothing escapes `dispatch`: unknown names, schema violations, handler
//! errors and handler panics all become failure envelopes.

use futures::FutureExt;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;

use super::catalog::ToolDefinition;
use super::handler::{Params, ToolContext};
use super::registry::ToolRegistry;
use crate::envelope::ResponseEnvelope;
use crate::observability::ToolLogger;

/// Routes tool calls to registered handlers.
#[derive(Debug)]
pub struct Dispatcher {
    registry: ToolRegistry,
    ctx: ToolContext,
    logger: ToolLogger,
}

impl Dispatcher {
    pub fn new(registry: ToolRegistry, ctx: ToolContext) -> Self {
        Self {
            registry,
            ctx,
            logger: ToolLogger::new(),
        }
    }

    /// Definitions of every registered tool, in registration order.
    pub fn list_tools(&self) -> Vec<&ToolDefinition> {
        self.registry.definitions().collect()
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.registry.names()
    }

    pub fn context(&self) -> &ToolContext {
        &self.ctx
    }

    /// Run one tool call to completion.
    pub async fn dispatch(&self, name: &str, mut args: Value) -> ResponseEnvelope {
        let call = self.logger.tool_start(name, &args);

        let Some((definition, handler)) = self.registry.get(name) else {
            let message = format!(
                "Unknown tool: '{}'. Available tools: {}",
                name,
                self.registry.names().join(", ")
            );
            self.logger.tool_error(&call, name, &message);
            return ResponseEnvelope::failure(message);
        };

        let errors = definition.validate_args(&args);
        if !errors.is_empty() {
            let message = format!(
                "Invalid arguments for '{}': {}. Expected: {}",
                name,
                errors.join("; "),
                definition.signature()
            );
            self.logger.tool_error(&call, name, &message);
            return ResponseEnvelope::failure(message);
        }
        definition.fill_defaults(&mut args);

        let outcome = AssertUnwindSafe(handler.call(&self.ctx, Params::new(args)))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(envelope)) => {
                self.logger.tool_success(&call, name, &envelope);
                envelope
            }
            Ok(Err(err)) => {
                let envelope = ResponseEnvelope::from_error(&err);
                self.logger.tool_error(&call, name, &err.to_string());
                envelope
            }
            Err(panic) => {
                let description = panic_message(panic.as_ref());
                self.logger.tool_error(&call, name, &description);
                ResponseEnvelope::from_error(description)
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("handler panicked: {}", s)
    } else {
        "handler panicked".to_string()
    }
}
