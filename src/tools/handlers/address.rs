//! Delivery address tools.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::common::{address_summary, amount, count_of, recover, require_login};
use crate::client::{LocationCheck, NewAddress};
use crate::envelope::ResponseEnvelope;
use crate::tools::catalog::{ParamDef, ParamType, ToolDefinition};
use crate::tools::handler::{Params, ToolContext, ToolHandler};
use crate::tools::registry::ToolRegistry;
use crate::types::Result;
use crate::validation::{validate_id, validate_non_empty, validate_phone, validate_pincode};

pub const ADDRESS_TYPES: &[&str] = &["home", "work", "other"];

pub fn register(registry: &mut ToolRegistry) -> Result<()> {
    registry.register(GetAddresses)?;
    registry.register(CreateAddress)?;
    registry.register(SetDefaultAddress)?;
    registry.register(ValidateLocation)?;
    Ok(())
}

fn address_not_found(address_id: &str) -> String {
    format!(
        "Address '{}' not found. Use get_addresses to list saved addresses.",
        address_id
    )
}

#[derive(Debug, Deserialize)]
struct AddressIdParams {
    address_id: String,
}

// =============================================================================
// get_addresses
// =============================================================================

#[derive(Debug)]
pub struct GetAddresses;

#[async_trait]
impl ToolHandler for GetAddresses {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("get_addresses", "List the user's saved delivery addresses.")
    }

    async fn call(&self, ctx: &ToolContext, _params: Params) -> Result<ResponseEnvelope> {
        if let Some(env) = require_login(ctx).await {
            return Ok(env);
        }
        let addresses = match ctx.client.get_addresses().await {
            Ok(addresses) => addresses,
            Err(err) => return recover(ctx, err, "No addresses found. Add one with create_address.").await,
        };

        let summaries: Vec<Value> = addresses.iter().map(address_summary).collect();
        let message = if summaries.is_empty() {
            "No saved addresses. Add one with create_address.".to_string()
        } else {
            format!("You have {}.", count_of(summaries.len(), "saved address", "saved addresses"))
        };
        Ok(ResponseEnvelope::success(message).with_data(json!({
            "addresses": summaries,
            "count": summaries.len(),
        })))
    }
}

// =============================================================================
// create_address
// =============================================================================

#[derive(Debug)]
pub struct CreateAddress;

#[derive(Debug, Deserialize)]
struct CreateAddressParams {
    name: String,
    phone: String,
    address_line1: String,
    city: String,
    state: String,
    pincode: String,
    address_type: String,
    address_line2: Option<String>,
    landmark: Option<String>,
    is_default: bool,
}

#[async_trait]
impl ToolHandler for CreateAddress {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("create_address", "Save a new delivery address.")
            .param(ParamDef::required("name", ParamType::String, "Recipient name"))
            .param(ParamDef::required("phone", ParamType::String, "10-digit phone number"))
            .param(ParamDef::required("address_line1", ParamType::String, "Street address"))
            .param(ParamDef::required("city", ParamType::String, "City"))
            .param(ParamDef::required("state", ParamType::String, "State"))
            .param(ParamDef::required("pincode", ParamType::String, "6-digit postal code"))
            .param(ParamDef::with_default(
                "address_type",
                ParamType::one_of(ADDRESS_TYPES),
                "Address type",
                json!("home"),
            ))
            .param(ParamDef::optional(
                "address_line2",
                ParamType::String,
                "Additional address details",
            ))
            .param(ParamDef::optional("landmark", ParamType::String, "Nearby landmark"))
            .param(ParamDef::with_default(
                "is_default",
                ParamType::Bool,
                "Make this the default address",
                json!(false),
            ))
    }

    async fn call(&self, ctx: &ToolContext, params: Params) -> Result<ResponseEnvelope> {
        let p: CreateAddressParams = params.parse()?;
        if let Some(env) = require_login(ctx).await {
            return Ok(env);
        }
        validate_non_empty(&p.name, "name")?;
        validate_non_empty(&p.address_line1, "address_line1")?;
        validate_non_empty(&p.city, "city")?;
        validate_non_empty(&p.state, "state")?;
        validate_phone(&p.phone)?;
        validate_pincode(&p.pincode)?;

        let new_address = NewAddress {
            address_type: p.address_type,
            name: p.name,
            phone: p.phone,
            address_line1: p.address_line1,
            address_line2: p.address_line2.filter(|s| !s.is_empty()),
            landmark: p.landmark.filter(|s| !s.is_empty()),
            city: p.city,
            state: p.state,
            pincode: p.pincode,
            is_default: p.is_default,
        };

        match ctx.client.create_address(&new_address).await {
            Ok(address) => Ok(ResponseEnvelope::success(format!(
                "Address saved for {}, {} ({}).",
                address.name, address.city, address.pincode
            ))
            .with_data(json!({"address": address_summary(&address)}))),
            Err(err) => recover(ctx, err, "Address could not be saved.").await,
        }
    }
}

// =============================================================================
// set_default_address
// =============================================================================

#[derive(Debug)]
pub struct SetDefaultAddress;

#[async_trait]
impl ToolHandler for SetDefaultAddress {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("set_default_address", "Make a saved address the default.")
            .param(ParamDef::required("address_id", ParamType::String, "Address ID"))
    }

    async fn call(&self, ctx: &ToolContext, params: Params) -> Result<ResponseEnvelope> {
        let p: AddressIdParams = params.parse()?;
        if let Some(env) = require_login(ctx).await {
            return Ok(env);
        }
        validate_id(&p.address_id, "address_id")?;
        match ctx.client.set_default_address(&p.address_id).await {
            Ok(data) => Ok(ResponseEnvelope::success("Default address updated.").with_data(data)),
            Err(err) => recover(ctx, err, &address_not_found(&p.address_id)).await,
        }
    }
}

// =============================================================================
// validate_location
// =============================================================================

#[derive(Debug)]
pub struct ValidateLocation;

/// Serviceability flags shared by both outcomes.
fn location_data(check: &LocationCheck) -> Value {
    json!({
        "is_serviceable": check.is_serviceable,
        "available": check.available.unwrap_or(check.is_serviceable),
        "cod_available": check.cod_available,
        "cod_limit": amount(check.cod_limit),
        "address": check.address,
        "estimated_delivery_mins": check.estimated_delivery_mins,
    })
}

#[async_trait]
impl ToolHandler for ValidateLocation {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "validate_location",
            "Check whether delivery is available at a saved address, and whether cash on \
             delivery is allowed there.",
        )
        .param(ParamDef::required("address_id", ParamType::String, "Address ID"))
    }

    async fn call(&self, ctx: &ToolContext, params: Params) -> Result<ResponseEnvelope> {
        let p: AddressIdParams = params.parse()?;
        if let Some(env) = require_login(ctx).await {
            return Ok(env);
        }
        validate_id(&p.address_id, "address_id")?;
        let check = match ctx.client.validate_location(&p.address_id).await {
            Ok(check) => check,
            Err(err) => return recover(ctx, err, &address_not_found(&p.address_id)).await,
        };

        let data = location_data(&check);
        if !check.is_serviceable {
            return Ok(ResponseEnvelope::failure(format!(
                "Sorry, delivery is not available at {} ({}) yet. Suggest another saved \
                 address from get_addresses or a new one with create_address.",
                check.city(),
                check.pincode()
            ))
            .with_data(data));
        }

        let eta = check
            .estimated_delivery_mins
            .map(|m| format!(" Estimated delivery: ~{} minutes.", m))
            .unwrap_or_default();
        let cod = if check.cod_available {
            format!(" Cash on delivery is available up to ₹{}.", check.cod_limit)
        } else {
            " Cash on delivery is not available; pay by UPI.".to_string()
        };
        Ok(ResponseEnvelope::success(format!(
            "Delivery is available at {} ({}).{}{}",
            check.city(),
            check.pincode(),
            eta,
            cod
        ))
        .with_data(data))
    }
}
