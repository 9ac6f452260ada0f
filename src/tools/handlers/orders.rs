//! Checkout, payment and order tools. All require a session.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::common::{count_of, recover, require_login};
use crate::envelope::ResponseEnvelope;
use crate::tools::catalog::{ParamDef, ParamType, ToolDefinition};
use crate::tools::handler::{Params, ToolContext, ToolHandler};
use crate::tools::registry::ToolRegistry;
use crate::types::Result;
use crate::validation::{validate_id, validate_payment_mode, validate_positive, PAYMENT_MODES};

pub fn register(registry: &mut ToolRegistry) -> Result<()> {
    registry.register(ProceedToCheckout)?;
    registry.register(SetPaymentMode)?;
    registry.register(ProcessPayment)?;
    registry.register(GetOrderHistory)?;
    registry.register(GetOrderDetails)?;
    registry.register(TrackOrder)?;
    registry.register(CancelOrder)?;
    registry.register(Reorder)?;
    Ok(())
}

fn order_not_found(order_id: &str) -> String {
    format!(
        "Order '{}' not found. Use get_order_history to list your orders.",
        order_id
    )
}

fn order_id_param() -> ParamDef {
    ParamDef::required("order_id", ParamType::String, "Order ID")
}

#[derive(Debug, Deserialize)]
struct OrderIdParams {
    order_id: String,
}

/// Field of an order payload, looked up on `data` then `data.order`.
fn order_field<'a>(data: &'a Value, key: &str) -> Option<&'a Value> {
    data.get(key)
        .or_else(|| data.get("order").and_then(|o| o.get(key)))
}

/// Handler shape shared by the order tools that take only an `order_id`.
async fn order_call<F, Fut>(
    ctx: &ToolContext,
    params: Params,
    call: F,
    message: impl FnOnce(&str, &Value) -> String,
) -> Result<ResponseEnvelope>
where
    F: FnOnce(String) -> Fut,
    Fut: std::future::Future<Output = Result<Value>>,
{
    let p: OrderIdParams = params.parse()?;
    if let Some(env) = require_login(ctx).await {
        return Ok(env);
    }
    validate_id(&p.order_id, "order_id")?;
    match call(p.order_id.clone()).await {
        Ok(data) => Ok(ResponseEnvelope::success(message(&p.order_id, &data)).with_data(data)),
        Err(err) => recover(ctx, err, &order_not_found(&p.order_id)).await,
    }
}

// =============================================================================
// proceed_to_checkout
// =============================================================================

#[derive(Debug)]
pub struct ProceedToCheckout;

#[derive(Debug, Deserialize)]
struct CheckoutParams {
    address_id: String,
}

#[async_trait]
impl ToolHandler for ProceedToCheckout {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "proceed_to_checkout",
            "Create a pending order from the cart for delivery to address_id. \
             Next set_payment_mode, then process_payment.",
        )
        .param(ParamDef::required("address_id", ParamType::String, "Delivery address ID"))
    }

    async fn call(&self, ctx: &ToolContext, params: Params) -> Result<ResponseEnvelope> {
        let p: CheckoutParams = params.parse()?;
        if let Some(env) = require_login(ctx).await {
            return Ok(env);
        }
        validate_id(&p.address_id, "address_id")?;
        match ctx.client.checkout(&p.address_id).await {
            Ok(data) => {
                let order_id = order_field(&data, "_id")
                    .or_else(|| order_field(&data, "id"))
                    .and_then(Value::as_str)
                    .map(|id| format!(" Order ID: {}.", id))
                    .unwrap_or_default();
                Ok(ResponseEnvelope::success(format!(
                    "Order created.{} Ask the user to choose UPI or cash on delivery, then call set_payment_mode.",
                    order_id
                ))
                .with_data(data))
            }
            Err(err) => {
                recover(
                    ctx,
                    err,
                    &format!(
                        "Address '{}' not found. Use get_addresses to list saved addresses.",
                        p.address_id
                    ),
                )
                .await
            }
        }
    }
}

// =============================================================================
// set_payment_mode
// =============================================================================

#[derive(Debug)]
pub struct SetPaymentMode;

#[derive(Debug, Deserialize)]
struct PaymentModeParams {
    order_id: String,
    payment_mode: String,
}

#[async_trait]
impl ToolHandler for SetPaymentMode {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "set_payment_mode",
            "Choose how an order is paid: 'upi' or 'cod' (cash on delivery).",
        )
        .param(order_id_param())
        .param(ParamDef::required(
            "payment_mode",
            ParamType::one_of(PAYMENT_MODES),
            "Payment mode",
        ))
    }

    async fn call(&self, ctx: &ToolContext, params: Params) -> Result<ResponseEnvelope> {
        let p: PaymentModeParams = params.parse()?;
        if let Some(env) = require_login(ctx).await {
            return Ok(env);
        }
        validate_id(&p.order_id, "order_id")?;
        validate_payment_mode(&p.payment_mode)?;
        match ctx.client.set_payment_mode(&p.order_id, &p.payment_mode).await {
            Ok(data) => Ok(ResponseEnvelope::success(format!(
                "Payment mode set to {}. Call process_payment to place the order.",
                p.payment_mode.to_uppercase()
            ))
            .with_data(data)),
            Err(err) => recover(ctx, err, &order_not_found(&p.order_id)).await,
        }
    }
}

// =============================================================================
// process_payment
// =============================================================================

#[derive(Debug)]
pub struct ProcessPayment;

#[async_trait]
impl ToolHandler for ProcessPayment {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "process_payment",
            "Pay for and confirm an order. UPI returns payment details; COD confirms directly. \
             Clears the cart on success.",
        )
        .param(order_id_param())
    }

    async fn call(&self, ctx: &ToolContext, params: Params) -> Result<ResponseEnvelope> {
        order_call(
            ctx,
            params,
            |id| async move { ctx.client.process_payment(&id).await },
            |id, _| format!("Payment processed. Order {} is confirmed.", id),
        )
        .await
    }
}

// =============================================================================
// get_order_history
// =============================================================================

#[derive(Debug)]
pub struct GetOrderHistory;

#[derive(Debug, Deserialize)]
struct HistoryParams {
    page: i64,
    limit: i64,
}

#[async_trait]
impl ToolHandler for GetOrderHistory {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("get_order_history", "List past orders with status and totals.")
            .param(ParamDef::with_default("page", ParamType::Int, "Page number", json!(1)))
            .param(ParamDef::with_default(
                "limit",
                ParamType::Int,
                "Orders per page",
                json!(10),
            ))
    }

    async fn call(&self, ctx: &ToolContext, params: Params) -> Result<ResponseEnvelope> {
        let p: HistoryParams = params.parse()?;
        if let Some(env) = require_login(ctx).await {
            return Ok(env);
        }
        let page = validate_positive(p.page, "page")?;
        let limit = validate_positive(p.limit, "limit")?;
        match ctx.client.get_orders(page, limit).await {
            Ok(history) => {
                let message = if history.orders.is_empty() {
                    "No orders yet.".to_string()
                } else {
                    format!("Found {}.", count_of(history.orders.len(), "order", "orders"))
                };
                Ok(ResponseEnvelope::success(message).with_data(json!({
                    "orders": history.orders,
                    "count": history.orders.len(),
                    "pagination": history.pagination,
                })))
            }
            Err(err) => recover(ctx, err, "No orders found.").await,
        }
    }
}

// =============================================================================
// get_order_details / track_order
// =============================================================================

#[derive(Debug)]
pub struct GetOrderDetails;

#[async_trait]
impl ToolHandler for GetOrderDetails {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("get_order_details", "Get full details of one order.")
            .param(order_id_param())
    }

    async fn call(&self, ctx: &ToolContext, params: Params) -> Result<ResponseEnvelope> {
        order_call(
            ctx,
            params,
            |id| async move { ctx.client.get_order(&id).await },
            |id, data| match order_field(data, "status").and_then(Value::as_str) {
                Some(status) => format!("Order {} is {}.", id, status),
                None => format!("Details for order {}.", id),
            },
        )
        .await
    }
}

#[derive(Debug)]
pub struct TrackOrder;

#[async_trait]
impl ToolHandler for TrackOrder {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "track_order",
            "Live order status: current stage, history, rider details when out for delivery, \
             and delivery countdown.",
        )
        .param(order_id_param())
    }

    async fn call(&self, ctx: &ToolContext, params: Params) -> Result<ResponseEnvelope> {
        order_call(
            ctx,
            params,
            |id| async move { ctx.client.track_order(&id).await },
            |id, data| match order_field(data, "status").and_then(Value::as_str) {
                Some(status) => format!("Order {} status: {}.", id, status.replace('_', " ")),
                None => format!("Tracking details for order {}.", id),
            },
        )
        .await
    }
}

// =============================================================================
// cancel_order
// =============================================================================

#[derive(Debug)]
pub struct CancelOrder;

#[derive(Debug, Deserialize)]
struct CancelParams {
    order_id: String,
    reason: Option<String>,
}

#[async_trait]
impl ToolHandler for CancelOrder {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "cancel_order",
            "Cancel an order. Only possible within 5 minutes of placing it and before \
             delivery; UPI payments are refunded.",
        )
        .param(order_id_param())
        .param(ParamDef::optional("reason", ParamType::String, "Cancellation reason"))
    }

    async fn call(&self, ctx: &ToolContext, params: Params) -> Result<ResponseEnvelope> {
        let p: CancelParams = params.parse()?;
        if let Some(env) = require_login(ctx).await {
            return Ok(env);
        }
        validate_id(&p.order_id, "order_id")?;
        let reason = p.reason.filter(|r| !r.trim().is_empty());
        match ctx.client.cancel_order(&p.order_id, reason).await {
            Ok(data) => Ok(
                ResponseEnvelope::success(format!("Order {} has been cancelled.", p.order_id))
                    .with_data(data),
            ),
            Err(err) => recover(ctx, err, &order_not_found(&p.order_id)).await,
        }
    }
}

// =============================================================================
// reorder
// =============================================================================

#[derive(Debug)]
pub struct Reorder;

#[async_trait]
impl ToolHandler for Reorder {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "reorder",
            "Check which items of a past order are available to order again.",
        )
        .param(order_id_param())
    }

    async fn call(&self, ctx: &ToolContext, params: Params) -> Result<ResponseEnvelope> {
        order_call(
            ctx,
            params,
            |id| async move { ctx.client.reorder(&id).await },
            |id, data| {
                let count = |key: &str| data.get(key).and_then(Value::as_array).map(Vec::len);
                match (count("availableItems"), count("unavailableItems")) {
                    (Some(available), Some(unavailable)) => format!(
                        "From order {}: {} available, {} unavailable.",
                        id, available, unavailable
                    ),
                    _ => format!("Reorder availability checked for order {}.", id),
                }
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PendingAuthStore;
    use crate::client::MockApiClient;
    use crate::types::{Error, ToolsConfig};
    use std::sync::Arc;
    use std::time::Duration;

    fn ctx(mock: MockApiClient) -> ToolContext {
        ToolContext::new(
            Arc::new(mock),
            Arc::new(PendingAuthStore::new(Duration::from_secs(60))),
            ToolsConfig::default(),
        )
    }

    fn logged_in() -> MockApiClient {
        let mut mock = MockApiClient::new();
        mock.expect_is_authenticated().returning(|| true);
        mock
    }

    #[tokio::test]
    async fn test_track_order_reports_status() {
        let mut mock = logged_in();
        mock.expect_track_order()
            .withf(|id| id == "o1")
            .returning(|_| Ok(json!({"status": "out_for_delivery", "rider": {"name": "Ravi"}})));

        let env = TrackOrder
            .call(&ctx(mock), Params::new(json!({"order_id": "o1"})))
            .await
            .unwrap();
        assert!(env.success);
        assert_eq!(env.message, "Order o1 status: out for delivery.");
        assert_eq!(env.data.unwrap()["rider"]["name"], "Ravi");
    }

    #[tokio::test]
    async fn test_unknown_order_is_friendly() {
        let mut mock = logged_in();
        mock.expect_get_order()
            .returning(|_| Err(Error::api(404, "Order not found")));

        let env = GetOrderDetails
            .call(&ctx(mock), Params::new(json!({"order_id": "nope"})))
            .await
            .unwrap();
        assert!(!env.success);
        assert!(env.message.contains("get_order_history"));
    }

    #[tokio::test]
    async fn test_payment_mode_is_validated() {
        let mut mock = logged_in();
        mock.expect_set_payment_mode().never();
        let err = SetPaymentMode
            .call(
                &ctx(mock),
                Params::new(json!({"order_id": "o1", "payment_mode": "card"})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_payment_mode_asks_for_login_before_validating() {
        let mut mock = MockApiClient::new();
        mock.expect_is_authenticated().returning(|| false);
        mock.expect_set_payment_mode().never();

        let env = SetPaymentMode
            .call(
                &ctx(mock),
                Params::new(json!({"order_id": "o1", "payment_mode": "card"})),
            )
            .await
            .unwrap();
        assert!(!env.success);
        assert!(env.message.contains("login_user"));
    }

    #[tokio::test]
    async fn test_history_asks_for_login_before_validating() {
        let mut mock = MockApiClient::new();
        mock.expect_is_authenticated().returning(|| false);
        mock.expect_get_orders().never();

        let env = GetOrderHistory
            .call(&ctx(mock), Params::new(json!({"page": 0, "limit": 10})))
            .await
            .unwrap();
        assert!(!env.success);
        assert!(env.message.contains("login_user"));
    }

    #[tokio::test]
    async fn test_dot_segment_order_id_is_rejected() {
        let mut mock = logged_in();
        mock.expect_cancel_order().never();
        mock.expect_get_order().never();
        let ctx = ctx(mock);

        let err = CancelOrder
            .call(&ctx, Params::new(json!({"order_id": ".."})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = GetOrderDetails
            .call(&ctx, Params::new(json!({"order_id": ""})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_cancel_drops_blank_reason() {
        let mut mock = logged_in();
        mock.expect_cancel_order()
            .withf(|id, reason| id == "o1" && reason.is_none())
            .times(1)
            .returning(|_, _| Ok(json!({"status": "cancelled"})));

        let env = CancelOrder
            .call(&ctx(mock), Params::new(json!({"order_id": "o1", "reason": "  "})))
            .await
            .unwrap();
        assert!(env.success);
    }

    #[tokio::test]
    async fn test_order_tools_require_login() {
        let mut mock = MockApiClient::new();
        mock.expect_is_authenticated().returning(|| false);
        mock.expect_process_payment().never();

        let env = ProcessPayment
            .call(&ctx(mock), Params::new(json!({"order_id": "o1"})))
            .await
            .unwrap();
        assert!(!env.success);
        assert!(env.message.contains("login_user"));
    }
}
