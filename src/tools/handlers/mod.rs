//! Tool handlers for the shopping backend, grouped by domain.

pub mod address;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod common;
pub mod health;
pub mod orders;

use crate::tools::registry::ToolRegistry;
use crate::types::Result;

/// Register every shopping tool. Order here is the order `tools/list` reports.
pub fn register_all(registry: &mut ToolRegistry) -> Result<()> {
    auth::register(registry)?;
    catalog::register(registry)?;
    cart::register(registry)?;
    address::register(registry)?;
    orders::register(registry)?;
    health::register(registry)?;
    Ok(())
}
