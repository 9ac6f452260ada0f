//! Helpers shared by the tool handlers.

use futures::future::join_all;
use serde_json::{json, Value};

use crate::client::{Address, Product};
use crate::envelope::{ImageContent, ResponseEnvelope};
use crate::tools::handler::ToolContext;
use crate::types::{Error, Result};

pub const NOT_LOGGED_IN: &str =
    "You are not logged in. Call login_user first to sign in, then retry.";

pub const SESSION_EXPIRED: &str =
    "Your session has expired. Call login_user to sign in again, then retry.";

/// Precondition for every tool that needs a session.
///
/// Returns the directive envelope to hand back when there is none.
pub async fn require_login(ctx: &ToolContext) -> Option<ResponseEnvelope> {
    if ctx.client.is_authenticated().await {
        None
    } else {
        Some(ResponseEnvelope::failure(NOT_LOGGED_IN))
    }
}

/// Turn the backend errors an assistant can act on into envelopes.
///
/// 401 clears the session and asks for a new login; 404 reports
/// `not_found`. Anything else is re-raised for the dispatcher.
pub async fn recover(ctx: &ToolContext, err: Error, not_found: &str) -> Result<ResponseEnvelope> {
    if err.is_unauthorized() {
        ctx.client.clear_session().await;
        return Ok(ResponseEnvelope::failure(SESSION_EXPIRED));
    }
    if err.is_not_found() {
        return Ok(ResponseEnvelope::failure(not_found));
    }
    Err(err)
}

/// Images shown alongside a product listing.
pub const LISTING_IMAGES: usize = 3;

/// Download the images of the first `limit` products that have one.
///
/// A failed download is logged and skipped; the listing is still returned.
pub async fn product_images(ctx: &ToolContext, products: &[Product], limit: usize) -> Vec<ImageContent> {
    let urls: Vec<&str> = products
        .iter()
        .filter_map(|p| p.image.as_deref())
        .filter(|url| !url.trim().is_empty())
        .take(limit)
        .collect();
    let fetched = join_all(urls.iter().map(|url| ctx.client.fetch_image(url))).await;
    urls.iter()
        .zip(fetched)
        .filter_map(|(url, result)| match result {
            Ok(image) => Some(image),
            Err(err) => {
                tracing::warn!(url = %url, error = %err, "product_image_skipped");
                None
            }
        })
        .collect()
}

/// Money and limits as JSON numbers; whole values print without a fraction.
pub fn amount(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9.0e15 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

/// Product summary shown in listings.
pub fn product_summary(p: &Product) -> Value {
    json!({
        "id": p.product_id(),
        "name": p.name,
        "price": amount(p.price),
        "mrp": amount(p.mrp),
        "discount_percent": p.discount_percent(),
        "unit": p.unit,
        "rating": p.rating,
        "review_count": p.review_count,
        "estimated_delivery_mins": p.delivery_mins(),
        "in_stock": p.in_stock(),
        "dietary": p.dietary_preference.as_deref().unwrap_or("veg"),
        "brand": p.brand.as_deref().unwrap_or(""),
        "image_url": p.image,
    })
}

/// Address as presented to the assistant.
pub fn address_summary(a: &Address) -> Value {
    json!({
        "id": a.address_id(),
        "type": a.address_type,
        "name": a.name,
        "phone": a.phone,
        "address_line1": a.address_line1,
        "address_line2": a.address_line2,
        "landmark": a.landmark,
        "city": a.city,
        "state": a.state,
        "pincode": a.pincode,
        "is_default": a.is_default,
        "is_serviceable": a.is_serviceable.unwrap_or(true),
    })
}

/// `n` followed by the singular or plural noun.
pub fn count_of(n: usize, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("1 {}", singular)
    } else {
        format!("{} {}", n, plural)
    }
}
