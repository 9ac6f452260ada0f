//! Backend data models.
//!
//! The backend speaks camelCase JSON and (being document-store backed) may
//! identify records by `_id`, `id`, or both. Records keep unrecognised fields
//! in `extra` so they can be handed back to the assistant untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Delivery estimate used when the backend does not provide one.
pub const DEFAULT_DELIVERY_MINS: u32 = 15;

/// Percentage saved versus MRP, rounded to the nearest integer.
///
/// Zero when there is no MRP or the price is not below it.
pub fn discount_percent(price: f64, mrp: f64) -> u32 {
    if mrp > price && mrp > 0.0 {
        ((mrp - price) / mrp * 100.0).round() as u32
    } else {
        0
    }
}

fn record_id(mongo_id: &Option<String>, id: &Option<String>) -> String {
    mongo_id.clone().or_else(|| id.clone()).unwrap_or_default()
}

// =============================================================================
// Auth
// =============================================================================

/// Account profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub mongo_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    pub fn user_id(&self) -> String {
        record_id(&self.mongo_id, &self.id)
    }
}

/// Token issued by login, registration or an approved authorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    #[serde(default)]
    pub user: Option<User>,
}

/// Browser authorization started on behalf of the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthChallenge {
    pub code: String,
    pub auth_url: String,
    /// Seconds until the backend forgets the code.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// State of a browser authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthState {
    Pending,
    Approved,
    Denied,
    Expired,
}

/// Poll result for a browser authorization code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthStatus {
    pub status: AuthState,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

/// Account registration payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: String,
}

// =============================================================================
// Catalog
// =============================================================================

/// Catalog product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub mongo_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub mrp: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub review_count: u64,
    #[serde(default)]
    pub estimated_delivery_mins: Option<u32>,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub dietary_preference: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Product {
    pub fn product_id(&self) -> String {
        record_id(&self.mongo_id, &self.id)
    }

    pub fn discount_percent(&self) -> u32 {
        discount_percent(self.price, self.mrp)
    }

    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }

    pub fn delivery_mins(&self) -> u32 {
        self.estimated_delivery_mins.unwrap_or(DEFAULT_DELIVERY_MINS)
    }
}

/// A page of products plus whatever pagination block the backend sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPage {
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Value>,
}

/// Multi-criteria product query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub dietary: Option<String>,
    pub brand: Option<String>,
    pub in_stock: bool,
    pub sort_by: String,
    pub page: u32,
    pub limit: u32,
}

impl ProductFilter {
    /// Query-string pairs in the backend's naming.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
            ("sortBy", self.sort_by.clone()),
        ];
        if let Some(category) = &self.category {
            pairs.push(("category", category.clone()));
        }
        if let Some(min) = self.min_price {
            pairs.push(("minPrice", min.to_string()));
        }
        if let Some(max) = self.max_price {
            pairs.push(("maxPrice", max.to_string()));
        }
        if let Some(dietary) = &self.dietary {
            pairs.push(("dietary", dietary.clone()));
        }
        if let Some(brand) = &self.brand {
            pairs.push(("brand", brand.clone()));
        }
        if self.in_stock {
            pairs.push(("inStock", "true".to_string()));
        }
        pairs
    }
}

// =============================================================================
// Cart
// =============================================================================

/// One cart line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(default)]
    pub product_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "one")]
    pub quantity: u32,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub total_items: Option<u32>,
}

/// Cart contents plus the bill computed by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartSummary {
    #[serde(default)]
    pub cart: Cart,
    #[serde(default)]
    pub bill: Value,
}

// =============================================================================
// Addresses
// =============================================================================

/// Saved delivery address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub mongo_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub address_type: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    #[serde(default)]
    pub landmark: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub pincode: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_serviceable: Option<bool>,
}

impl Address {
    pub fn address_id(&self) -> String {
        record_id(&self.mongo_id, &self.id)
    }
}

/// Address creation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAddress {
    #[serde(rename = "type")]
    pub address_type: String,
    pub name: String,
    pub phone: String,
    pub address_line1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landmark: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub is_default: bool,
}

/// Serviceability verdict for a saved address.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationCheck {
    pub is_serviceable: bool,
    #[serde(default)]
    pub available: Option<bool>,
    #[serde(default)]
    pub address: Option<Value>,
    #[serde(default)]
    pub estimated_delivery_mins: Option<u32>,
    #[serde(default)]
    pub cod_available: bool,
    #[serde(default)]
    pub cod_limit: f64,
}

impl LocationCheck {
    fn address_field(&self, key: &str) -> Option<&str> {
        self.address.as_ref()?.get(key)?.as_str()
    }

    pub fn city(&self) -> &str {
        self.address_field("city").unwrap_or("this location")
    }

    pub fn pincode(&self) -> &str {
        self.address_field("pincode").unwrap_or("unknown pincode")
    }
}

// =============================================================================
// Orders
// =============================================================================

/// A page of orders. Orders themselves stay untyped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderPage {
    #[serde(default)]
    pub orders: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Value>,
}
