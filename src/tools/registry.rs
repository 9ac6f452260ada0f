//! Tool registry: definitions for discovery, handlers for dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use super::catalog::ToolDefinition;
use super::handler::ToolHandler;
use crate::types::{Error, Result};

struct Registered {
    definition: ToolDefinition,
    handler: Arc<dyn ToolHandler>,
}

/// Name → handler map plus definitions in registration order.
///
/// Both views are fed by the single `register` call, so every listed
/// definition has exactly one handler and vice versa.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Registered>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under the name its definition declares.
    pub fn register<H: ToolHandler + 'static>(&mut self, handler: H) -> Result<()> {
        let definition = handler.definition();
        if definition.name.trim().is_empty() {
            return Err(Error::validation("Tool name cannot be empty"));
        }
        if self.index.contains_key(&definition.name) {
            return Err(Error::validation(format!(
                "Tool '{}' is already registered",
                definition.name
            )));
        }
        self.index.insert(definition.name.clone(), self.tools.len());
        self.tools.push(Registered {
            definition,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<(&ToolDefinition, Arc<dyn ToolHandler>)> {
        let entry = self.tools.get(*self.index.get(name)?)?;
        Some((&entry.definition, Arc::clone(&entry.handler)))
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All definitions, in registration order.
    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter().map(|t| &t.definition)
    }

    /// All tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.definition.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
