//! Cart tools.
//!
//! `add_to_cart` is two-step: an unconfirmed call previews the product and asks
//! for the user's go-ahead; only a confirmed call changes the cart.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::common::{
    address_summary, amount, product_images, product_summary, recover, require_login,
};
use crate::client::{Address, DEFAULT_DELIVERY_MINS};
use crate::envelope::ResponseEnvelope;
use crate::tools::catalog::{ParamDef, ParamType, ToolDefinition};
use crate::tools::handler::{Params, ToolContext, ToolHandler};
use crate::tools::recommend::frequently_bought_together;
use crate::tools::registry::ToolRegistry;
use crate::types::Result;
use crate::validation::{validate_id, validate_quantity, validate_quantity_update};

/// Order value above which delivery is free when the bill does not say.
const DEFAULT_FREE_DELIVERY_THRESHOLD: f64 = 199.0;

pub fn register(registry: &mut ToolRegistry) -> Result<()> {
    registry.register(ViewCart)?;
    registry.register(AddToCart)?;
    registry.register(UpdateCartItem)?;
    registry.register(RemoveFromCart)?;
    registry.register(ClearCart)?;
    Ok(())
}

fn not_in_cart(product_id: &str) -> String {
    format!(
        "Product '{}' is not in your cart. Use view_cart to see the items in it.",
        product_id
    )
}

// =============================================================================
// view_cart
// =============================================================================

#[derive(Debug)]
pub struct ViewCart;

#[async_trait]
impl ToolHandler for ViewCart {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "view_cart",
            "Show the cart: items, bill, delivery estimate, delivery address and whether \
             it is ready for checkout.",
        )
    }

    async fn call(&self, ctx: &ToolContext, _params: Params) -> Result<ResponseEnvelope> {
        if let Some(env) = require_login(ctx).await {
            return Ok(env);
        }
        let summary = match ctx.client.get_cart().await {
            Ok(summary) => summary,
            Err(err) => return recover(ctx, err, "No cart found. Add a product with add_to_cart.").await,
        };

        // The cart is still useful without an address; a failed lookup just means none.
        let default_address: Option<Address> = match ctx.client.get_addresses().await {
            Ok(addresses) => addresses.into_iter().find(|a| a.is_default),
            Err(err) => {
                tracing::warn!(error = %err, "cart_address_lookup_failed");
                None
            }
        };

        let items: Vec<Value> = summary
            .cart
            .items
            .iter()
            .map(|item| {
                json!({
                    "product_id": item.product_id,
                    "name": item.name,
                    "quantity": item.quantity,
                    "price_per_unit": amount(item.price),
                    "total_price": amount(item.price * f64::from(item.quantity)),
                    "unit": item.unit,
                    "image": item.image,
                })
            })
            .collect();
        let item_count = items.len();
        let bill_field = |key: &str| summary.bill.get(key).and_then(Value::as_f64);
        let delivery_mins = DEFAULT_DELIVERY_MINS;

        let message = match &default_address {
            None => "No delivery address set. Add one with create_address before checkout.".to_string(),
            Some(addr) if addr.is_serviceable == Some(false) => {
                "Delivery is not available at the selected address.".to_string()
            }
            Some(_) if item_count == 0 => "Your cart is empty.".to_string(),
            Some(addr) => format!(
                "Ready for checkout! Delivery to {} in ~{} minutes.",
                addr.city, delivery_mins
            ),
        };
        let ready = default_address.is_some() && item_count > 0;

        Ok(ResponseEnvelope::success(message).with_data(json!({
            "cart": {
                "items": items,
                "total_items": summary.cart.total_items.unwrap_or(item_count as u32),
                "item_count": item_count,
            },
            "bill": summary.bill,
            "delivery": {
                "estimated_mins": delivery_mins,
                "estimated_time": format!("~{} minutes", delivery_mins),
                "free_delivery_threshold": amount(
                    bill_field("freeDeliveryThreshold").unwrap_or(DEFAULT_FREE_DELIVERY_THRESHOLD)
                ),
                "amount_to_free_delivery": amount(bill_field("amountToFreeDelivery").unwrap_or(0.0)),
            },
            "selected_address": default_address.as_ref().map(address_summary),
            "has_address": default_address.is_some(),
            "ready_for_checkout": ready,
        })))
    }
}

// =============================================================================
// add_to_cart
// =============================================================================

#[derive(Debug)]
pub struct AddToCart;

#[derive(Debug, Deserialize)]
struct AddParams {
    product_id: String,
    quantity: i64,
    confirmed: bool,
    #[serde(default)]
    show_image: bool,
}

fn product_not_found(product_id: &str) -> String {
    format!(
        "Product '{}' not found. Use search_products to find valid product IDs.",
        product_id
    )
}

#[async_trait]
impl ToolHandler for AddToCart {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "add_to_cart",
            "Add a product to the cart. First call with confirmed=false to preview price and \
             delivery time; call again with confirmed=true only after the user agrees. \
             A confirmed add may carry a frequently-bought-together recommendation.",
        )
        .param(ParamDef::required("product_id", ParamType::String, "Product ID"))
        .param(ParamDef::with_default(
            "quantity",
            ParamType::Int,
            "Quantity (1-10)",
            json!(1),
        ))
        .param(ParamDef::with_default(
            "confirmed",
            ParamType::Bool,
            "True only after the user confirmed",
            json!(false),
        ))
        .param(ParamDef::with_default(
            "show_image",
            ParamType::Bool,
            "Show the product image with the preview",
            json!(true),
        ))
    }

    async fn call(&self, ctx: &ToolContext, params: Params) -> Result<ResponseEnvelope> {
        let p: AddParams = params.parse()?;
        if p.confirmed {
            if let Some(env) = require_login(ctx).await {
                return Ok(env);
            }
        }
        validate_id(&p.product_id, "product_id")?;
        let quantity = validate_quantity(p.quantity, ctx.config.max_quantity)?;

        if !p.confirmed {
            let product = match ctx.client.get_product(&p.product_id).await {
                Ok(product) => product,
                Err(err) => return recover(ctx, err, &product_not_found(&p.product_id)).await,
            };
            let rating = product
                .rating
                .map(|r| format!("{}/5 ({} reviews)", r, product.review_count))
                .unwrap_or_else(|| "not rated yet".to_string());
            let message = format!(
                "{} ({}): ₹{} (MRP ₹{}, {}% off). Rating: {}. Delivery in ~{} minutes. \
                 Shall I add {} to the cart? Ask the user to confirm, then call add_to_cart \
                 again with confirmed=true.",
                product.name,
                product.unit.as_deref().unwrap_or("1 unit"),
                product.price,
                product.mrp,
                product.discount_percent(),
                rating,
                product.delivery_mins(),
                quantity,
            );
            let images = if p.show_image {
                product_images(ctx, std::slice::from_ref(&product), 1).await
            } else {
                Vec::new()
            };
            return Ok(ResponseEnvelope::success(message)
                .with_data(json!({
                    "awaiting_confirmation": true,
                    "product_id": p.product_id,
                    "quantity": quantity,
                    "product": product_summary(&product),
                }))
                .with_images(images)
                .requiring_user_action());
        }

        let product_name = match ctx.client.get_product(&p.product_id).await {
            Ok(product) => product.name,
            Err(err) => {
                tracing::debug!(error = %err, "add_to_cart_name_lookup_failed");
                "this item".to_string()
            }
        };

        let cart = match ctx.client.add_cart_item(&p.product_id, quantity).await {
            Ok(cart) => cart,
            Err(err) => return recover(ctx, err, &product_not_found(&p.product_id)).await,
        };

        let recommendation = frequently_bought_together(ctx, &p.product_id, &product_name).await;
        let mut data = json!({
            "cart": cart,
            "has_recommendation": recommendation.is_some(),
        });
        if let (Some(rec), Some(map)) = (recommendation, data.as_object_mut()) {
            map.insert("recommendation".to_string(), rec);
        }

        Ok(ResponseEnvelope::success(format!(
            "Added {} x {} to your cart.",
            quantity, product_name
        ))
        .with_data(data))
    }
}

// =============================================================================
// update_cart_item
// =============================================================================

#[derive(Debug)]
pub struct UpdateCartItem;

#[derive(Debug, Deserialize)]
struct UpdateParams {
    product_id: String,
    quantity: i64,
}

#[async_trait]
impl ToolHandler for UpdateCartItem {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "update_cart_item",
            "Change the quantity of a cart item. Quantity 0 removes it.",
        )
        .param(ParamDef::required("product_id", ParamType::String, "Product ID"))
        .param(ParamDef::required("quantity", ParamType::Int, "New quantity (0-10)"))
    }

    async fn call(&self, ctx: &ToolContext, params: Params) -> Result<ResponseEnvelope> {
        let p: UpdateParams = params.parse()?;
        if let Some(env) = require_login(ctx).await {
            return Ok(env);
        }
        validate_id(&p.product_id, "product_id")?;
        let quantity = validate_quantity_update(p.quantity, ctx.config.max_quantity)?;

        let (result, message) = if quantity == 0 {
            (
                ctx.client.remove_cart_item(&p.product_id).await,
                "Item removed from your cart.".to_string(),
            )
        } else {
            (
                ctx.client.update_cart_item(&p.product_id, quantity).await,
                format!("Quantity updated to {}.", quantity),
            )
        };

        match result {
            Ok(cart) => Ok(ResponseEnvelope::success(message).with_data(json!({"cart": cart}))),
            Err(err) => recover(ctx, err, &not_in_cart(&p.product_id)).await,
        }
    }
}

// =============================================================================
// remove_from_cart
// =============================================================================

#[derive(Debug)]
pub struct RemoveFromCart;

#[derive(Debug, Deserialize)]
struct RemoveParams {
    product_id: String,
}

#[async_trait]
impl ToolHandler for RemoveFromCart {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("remove_from_cart", "Remove an item from the cart entirely.")
            .param(ParamDef::required("product_id", ParamType::String, "Product ID"))
    }

    async fn call(&self, ctx: &ToolContext, params: Params) -> Result<ResponseEnvelope> {
        let p: RemoveParams = params.parse()?;
        if let Some(env) = require_login(ctx).await {
            return Ok(env);
        }
        validate_id(&p.product_id, "product_id")?;
        match ctx.client.remove_cart_item(&p.product_id).await {
            Ok(cart) => Ok(ResponseEnvelope::success("Item removed from your cart.")
                .with_data(json!({"cart": cart}))),
            Err(err) => recover(ctx, err, &not_in_cart(&p.product_id)).await,
        }
    }
}

// =============================================================================
// clear_cart
// =============================================================================

#[derive(Debug)]
pub struct ClearCart;

#[async_trait]
impl ToolHandler for ClearCart {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("clear_cart", "Remove every item from the cart.")
    }

    async fn call(&self, ctx: &ToolContext, _params: Params) -> Result<ResponseEnvelope> {
        if let Some(env) = require_login(ctx).await {
            return Ok(env);
        }
        match ctx.client.clear_cart().await {
            Ok(cart) => Ok(ResponseEnvelope::success("Your cart is now empty.")
                .with_data(json!({"cart": cart}))),
            Err(err) => recover(ctx, err, "No cart found.").await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PendingAuthStore;
    use crate::client::{CartSummary, MockApiClient, OrderPage, Product};
    use crate::envelope::ImageContent;
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

    fn milk() -> Product {
        serde_json::from_value(json!({
            "_id": "p1", "name": "Amul Milk", "unit": "500 ml", "price": 27, "mrp": 30,
            "rating": 4.5, "reviewCount": 120, "stock": 10
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_preview_needs_no_login_and_asks_confirmation() {
        let mut mock = MockApiClient::new();
        mock.expect_get_product().returning(|_| Ok(milk()));
        mock.expect_add_cart_item().never();

        let env = AddToCart
            .call(
                &ctx(mock),
                Params::new(json!({"product_id": "p1", "quantity": 2, "confirmed": false})),
            )
            .await
            .unwrap();
        assert!(env.success);
        assert!(env.needs_user_action());
        assert!(env.message.contains("Amul Milk"));
        assert!(env.message.contains("10% off"));
        assert_eq!(env.data.unwrap()["quantity"], 2);
    }

    #[tokio::test]
    async fn test_preview_shows_product_image() {
        let mut mock = MockApiClient::new();
        mock.expect_get_product().returning(|_| {
            let mut product = milk();
            product.image = Some("/img/milk.png".to_string());
            Ok(product)
        });
        mock.expect_fetch_image()
            .withf(|url| url == "/img/milk.png")
            .times(1)
            .returning(|_| Ok(ImageContent::new("iVBORw0=", "image/png")));

        let env = AddToCart
            .call(
                &ctx(mock),
                Params::new(json!({
                    "product_id": "p1", "quantity": 1, "confirmed": false, "show_image": true
                })),
            )
            .await
            .unwrap();
        assert!(env.needs_user_action());
        assert_eq!(env.images.len(), 1);
        assert_eq!(env.images[0].mime_type, "image/png");
    }

    #[tokio::test]
    async fn test_confirmed_add_requires_login() {
        let mut mock = MockApiClient::new();
        mock.expect_is_authenticated().returning(|| false);
        mock.expect_add_cart_item().never();

        let env = AddToCart
            .call(
                &ctx(mock),
                Params::new(json!({"product_id": "p1", "quantity": 1, "confirmed": true})),
            )
            .await
            .unwrap();
        assert!(!env.success);
        assert!(env.message.contains("login_user"));
    }

    #[tokio::test]
    async fn test_confirmed_add_without_history_has_no_recommendation() {
        let mut mock = MockApiClient::new();
        mock.expect_is_authenticated().returning(|| true);
        mock.expect_get_product().returning(|_| Ok(milk()));
        mock.expect_add_cart_item()
            .withf(|id, qty| id == "p1" && *qty == 3)
            .times(1)
            .returning(|_, _| Ok(json!({"totalItems": 3})));
        mock.expect_get_orders()
            .returning(|_, _| Ok(OrderPage::default()));

        let env = AddToCart
            .call(
                &ctx(mock),
                Params::new(json!({"product_id": "p1", "quantity": 3, "confirmed": true})),
            )
            .await
            .unwrap();
        assert!(env.success);
        assert_eq!(env.message, "Added 3 x Amul Milk to your cart.");
        let data = env.data.unwrap();
        assert_eq!(data["has_recommendation"], false);
        assert!(data.get("recommendation").is_none());
    }

    #[tokio::test]
    async fn test_quantity_out_of_range_is_raised() {
        let err = AddToCart
            .call(
                &ctx(MockApiClient::new()),
                Params::new(json!({"product_id": "p1", "quantity": 11, "confirmed": false})),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_to_zero_removes() {
        let mut mock = MockApiClient::new();
        mock.expect_is_authenticated().returning(|| true);
        mock.expect_remove_cart_item()
            .times(1)
            .returning(|_| Ok(json!({})));
        mock.expect_update_cart_item().never();

        let env = UpdateCartItem
            .call(&ctx(mock), Params::new(json!({"product_id": "p1", "quantity": 0})))
            .await
            .unwrap();
        assert!(env.success);
        assert!(env.message.contains("removed"));
    }

    #[tokio::test]
    async fn test_update_asks_for_login_before_validating() {
        let mut mock = MockApiClient::new();
        mock.expect_is_authenticated().returning(|| false);

        let env = UpdateCartItem
            .call(&ctx(mock), Params::new(json!({"product_id": "p1", "quantity": 50})))
            .await
            .unwrap();
        assert!(!env.success);
        assert!(env.message.contains("login_user"));
    }

    #[tokio::test]
    async fn test_remove_rejects_dot_segment_id() {
        let mut mock = MockApiClient::new();
        mock.expect_is_authenticated().returning(|| true);
        mock.expect_remove_cart_item().never();
        mock.expect_clear_cart().never();

        let err = RemoveFromCart
            .call(&ctx(mock), Params::new(json!({"product_id": ".."})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_view_cart_without_address_is_not_ready() {
        let mut mock = MockApiClient::new();
        mock.expect_is_authenticated().returning(|| true);
        mock.expect_get_cart().returning(|| {
            Ok(serde_json::from_value::<CartSummary>(json!({
                "cart": {"items": [{"productId": "p1", "name": "Milk", "quantity": 2, "price": 27}]},
                "bill": {"total": 54, "freeDeliveryThreshold": 199}
            }))
            .unwrap())
        });
        mock.expect_get_addresses().returning(|| Ok(vec![]));

        let env = ViewCart.call(&ctx(mock), Params::new(json!({}))).await.unwrap();
        assert!(env.success);
        assert!(env.message.contains("No delivery address"));
        let data = env.data.unwrap();
        assert_eq!(data["ready_for_checkout"], false);
        assert_eq!(data["cart"]["items"][0]["total_price"], 54);
        assert_eq!(data["delivery"]["estimated_mins"], 15);
    }
}
