//! Tool infrastructure: definitions, argument validation, the name-indexed
//! registry and the dispatcher that turns every call into a `ResponseEnvelope`.

pub mod catalog;
pub mod dispatcher;
pub mod handler;
pub mod handlers;
pub mod recommend;
pub mod registry;

pub use catalog::{ParamDef, ParamType, ToolDefinition};
pub use dispatcher::Dispatcher;
pub use handler::{Params, ToolContext, ToolHandler};
pub use registry::ToolRegistry;

use crate::types::Result;

/// Registry with the full shopping tool set.
pub fn default_registry() -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    handlers::register_all(&mut registry)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_registry_is_complete() {
        let registry = default_registry().unwrap();
        assert_eq!(registry.len(), 29);

        let names: HashSet<&str> = registry.names().into_iter().collect();
        assert_eq!(names.len(), registry.len());
        for name in [
            "login_user",
            "search_products",
            "add_to_cart",
            "validate_location",
            "process_payment",
            "track_order",
            "check_api_health",
            "show_product_image",
        ] {
            assert!(registry.has_tool(name), "missing {}", name);
        }
    }

    #[test]
    fn test_every_definition_resolves_to_itself() {
        let registry = default_registry().unwrap();
        for def in registry.definitions() {
            let (found, _) = registry.get(&def.name).unwrap();
            assert_eq!(found.name, def.name);
            assert!(!def.description.is_empty());
            assert_eq!(def.input_schema()["type"], "object");
        }
    }
}
