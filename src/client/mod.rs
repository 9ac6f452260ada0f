//! Backend API client.
//!
//! Tool handlers only see the [`ApiClient`] trait. The client owns the session
//! token; handlers decide when to set or clear it.

mod http;
pub mod models;

pub use http::HttpApiClient;
pub use models::{
    discount_percent, Address, AuthChallenge, AuthSession, AuthState, AuthStatus, Cart, CartItem,
    CartSummary, LocationCheck, NewAddress, NewUser, OrderPage, Product, ProductFilter,
    ProductPage, User, DEFAULT_DELIVERY_MINS,
};

use async_trait::async_trait;
use serde_json::Value;

use crate::envelope::ImageContent;
use crate::types::Result;

/// Typed access to the quick-commerce backend.
///
/// Every call may fail with [`crate::types::Error::Api`] (backend rejected the
/// request) or a transport error. Payloads the tools only pass through are
/// returned as the backend's `data` object.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ApiClient: Send + Sync {
    // --- session ---------------------------------------------------------

    async fn is_authenticated(&self) -> bool;

    async fn set_session(&self, token: String, user: Option<User>);

    async fn clear_session(&self);

    // --- auth ------------------------------------------------------------

    async fn login(&self, email: &str, password: &str) -> Result<AuthSession>;

    async fn register(&self, user: &NewUser) -> Result<AuthSession>;

    async fn get_me(&self) -> Result<User>;

    async fn request_auth(&self) -> Result<AuthChallenge>;

    async fn check_auth_status(&self, code: &str) -> Result<AuthStatus>;

    // --- catalog ---------------------------------------------------------

    async fn search_products(&self, query: &str, page: u32, limit: u32) -> Result<ProductPage>;

    async fn get_categories(&self) -> Result<Value>;

    async fn get_products_by_category(
        &self,
        category_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<ProductPage>;

    async fn filter_products(&self, filter: &ProductFilter) -> Result<ProductPage>;

    async fn get_product(&self, product_id: &str) -> Result<Product>;

    async fn get_alternatives(&self, product_id: &str) -> Result<Value>;

    async fn get_featured(&self, limit: u32) -> Result<ProductPage>;

    /// Download a product image. Relative URLs resolve against the backend host.
    async fn fetch_image(&self, url: &str) -> Result<ImageContent>;

    // --- cart ------------------------------------------------------------

    async fn get_cart(&self) -> Result<CartSummary>;

    async fn add_cart_item(&self, product_id: &str, quantity: u32) -> Result<Value>;

    async fn update_cart_item(&self, product_id: &str, quantity: u32) -> Result<Value>;

    async fn remove_cart_item(&self, product_id: &str) -> Result<Value>;

    async fn clear_cart(&self) -> Result<Value>;

    // --- addresses -------------------------------------------------------

    async fn get_addresses(&self) -> Result<Vec<Address>>;

    async fn create_address(&self, address: &NewAddress) -> Result<Address>;

    async fn set_default_address(&self, address_id: &str) -> Result<Value>;

    async fn validate_location(&self, address_id: &str) -> Result<LocationCheck>;

    // --- checkout & orders -----------------------------------------------

    async fn checkout(&self, address_id: &str) -> Result<Value>;

    async fn set_payment_mode(&self, order_id: &str, payment_mode: &str) -> Result<Value>;

    async fn process_payment(&self, order_id: &str) -> Result<Value>;

    async fn get_orders(&self, page: u32, limit: u32) -> Result<OrderPage>;

    async fn get_order(&self, order_id: &str) -> Result<Value>;

    async fn track_order(&self, order_id: &str) -> Result<Value>;

    async fn cancel_order(&self, order_id: &str, reason: Option<String>) -> Result<Value>;

    async fn reorder(&self, order_id: &str) -> Result<Value>;

    // --- health ----------------------------------------------------------

    async fn health(&self) -> Result<Value>;
}
