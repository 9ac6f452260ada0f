//! "Frequently bought together" suggestions mined from the user's order history.

use serde_json::{json, Value};
use std::collections::HashMap;

use crate::client::{discount_percent, DEFAULT_DELIVERY_MINS};
use crate::tools::handler::ToolContext;
use crate::tools::handlers::common::amount;

/// A product seen alongside the anchor product in past orders.
#[derive(Debug, Clone, PartialEq)]
pub struct CoPurchase {
    pub product_id: String,
    pub count: u32,
    pub name: Option<String>,
    pub price: Option<Value>,
    pub unit: Option<String>,
    pub image: Option<String>,
}

fn item_product_id(item: &Value) -> Option<String> {
    if let Some(id) = item.get("productId").and_then(Value::as_str) {
        return Some(id.to_string());
    }
    match item.get("product") {
        Some(Value::String(id)) => Some(id.clone()),
        Some(product) => product
            .get("_id")
            .or_else(|| product.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string),
        None => None,
    }
}

/// Field of an order line, falling back to its embedded product.
fn item_field<'a>(item: &'a Value, key: &str) -> Option<&'a Value> {
    item.get(key)
        .filter(|v| !v.is_null())
        .or_else(|| item.get("product")?.get(key).filter(|v| !v.is_null()))
}

fn item_str(item: &Value, key: &str) -> Option<String> {
    item_field(item, key)
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Most frequent co-purchase of `anchor_id` across `orders`.
///
/// Counts one per order line of every other product in orders that contain
/// the anchor. Ties go to the product seen first.
pub fn top_co_purchase(orders: &[Value], anchor_id: &str) -> Option<CoPurchase> {
    let mut seen: Vec<CoPurchase> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for order in orders {
        let Some(items) = order.get("items").and_then(Value::as_array) else {
            continue;
        };
        let contains_anchor = items
            .iter()
            .any(|item| item_product_id(item).as_deref() == Some(anchor_id));
        if !contains_anchor {
            continue;
        }

        for item in items {
            let Some(id) = item_product_id(item) else {
                continue;
            };
            if id == anchor_id {
                continue;
            }
            match index.get(&id) {
                Some(&i) => seen[i].count += 1,
                None => {
                    index.insert(id.clone(), seen.len());
                    seen.push(CoPurchase {
                        product_id: id,
                        count: 1,
                        name: item_str(item, "name"),
                        price: item_field(item, "price").cloned(),
                        unit: item_str(item, "unit"),
                        image: item_str(item, "image"),
                    });
                }
            }
        }
    }

    let mut best: Option<CoPurchase> = None;
    for candidate in seen {
        if best.as_ref().map_or(true, |b| candidate.count > b.count) {
            best = Some(candidate);
        }
    }
    best
}

/// Recommendation payload for a product just added to the cart.
///
/// Any failure along the way means no recommendation.
pub async fn frequently_bought_together(
    ctx: &ToolContext,
    added_id: &str,
    added_name: &str,
) -> Option<Value> {
    let history = match ctx
        .client
        .get_orders(1, ctx.config.recommendation_history_limit)
        .await
    {
        Ok(page) => page,
        Err(err) => {
            tracing::debug!(error = %err, "recommendation_history_unavailable");
            return None;
        }
    };

    let top = top_co_purchase(&history.orders, added_id)?;
    let header = format!(
        "Customers who bought {} also frequently bought:",
        added_name
    );

    let (product, name, price) = match ctx.client.get_product(&top.product_id).await {
        Ok(p) => {
            let name = p.name.clone();
            let price = amount(p.price);
            (
                json!({
                    "id": top.product_id,
                    "name": p.name,
                    "price": amount(p.price),
                    "mrp": amount(p.mrp),
                    "discount_percent": discount_percent(p.price, p.mrp),
                    "unit": p.unit,
                    "image": p.image,
                    "in_stock": p.in_stock(),
                    "estimated_delivery_mins": p.delivery_mins(),
                }),
                name,
                price,
            )
        }
        Err(err) => {
            tracing::debug!(error = %err, product_id = %top.product_id, "recommendation_refresh_failed");
            let name = top.name.clone().unwrap_or_else(|| "this item".to_string());
            let price = top.price.clone().unwrap_or(Value::Null);
            (
                json!({
                    "id": top.product_id,
                    "name": top.name,
                    "price": top.price,
                    "unit": top.unit,
                    "image": top.image,
                    "estimated_delivery_mins": DEFAULT_DELIVERY_MINS,
                }),
                name,
                price,
            )
        }
    };

    Some(json!({
        "type": "frequently_bought_together",
        "message": header,
        "product": product,
        "times_bought_together": top.count,
        "prompt": format!("Would you like to add {} (₹{}) to your cart as well?", name, price),
    }))
}
