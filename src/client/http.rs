//! reqwest implementation of [`ApiClient`].
//!
//! Every backend response is `{success, message?, data?}`. A non-2xx status or
//! `success: false` becomes `Error::Api` carrying the backend's message.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Instant;
use tokio::sync::RwLock;

use super::models::{
    Address, AuthChallenge, AuthSession, AuthStatus, CartSummary, LocationCheck, NewAddress,
    NewUser, OrderPage, Product, ProductFilter, ProductPage, User,
};
use super::ApiClient;
use crate::envelope::ImageContent;
use crate::types::{ApiConfig, Error, Result};
use crate::validation::validate_id;

#[derive(Debug, Clone)]
struct Session {
    token: String,
    user: Option<User>,
}

#[derive(Debug, Deserialize)]
struct BackendReply {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<Value>,
}

/// Unwrapped backend reply.
#[derive(Debug)]
struct Reply {
    message: Option<String>,
    data: Value,
}

/// HTTP client for the quick-commerce backend.
#[derive(Debug)]
pub struct HttpApiClient {
    http: reqwest::Client,
    base_url: String,
    max_image_bytes: usize,
    session: RwLock<Option<Session>>,
}

impl HttpApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_image_bytes: config.max_image_bytes,
            session: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// User attached to the current session, if any.
    pub async fn session_user(&self) -> Option<User> {
        self.session.read().await.as_ref().and_then(|s| s.user.clone())
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base_url, path))
    }

    async fn send(&self, method: Method, path: &str, builder: RequestBuilder) -> Result<Reply> {
        let builder = match self.session.read().await.as_ref() {
            Some(session) => builder.bearer_auth(&session.token),
            None => builder,
        };

        let started = Instant::now();
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = started.elapsed().as_millis() as u64,
            "backend_request"
        );

        let reply: Option<BackendReply> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let message = reply
                .and_then(|r| r.message)
                .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });
            return Err(Error::api(status.as_u16(), message));
        }

        let reply = reply.ok_or_else(|| {
            Error::transport(format!("{} {} returned a non-JSON body", method, path))
        })?;

        if reply.success == Some(false) {
            return Err(Error::api(
                status.as_u16(),
                reply
                    .message
                    .unwrap_or_else(|| "request was rejected".to_string()),
            ));
        }

        Ok(Reply {
            message: reply.message,
            data: reply.data.unwrap_or(Value::Null),
        })
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Reply> {
        let builder = self.request(Method::GET, path).query(query);
        self.send(Method::GET, path, builder).await
    }

    async fn write<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Reply> {
        let mut builder = self.request(method.clone(), path);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        self.send(method, path, builder).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Reply> {
        self.write(Method::POST, path, Some(body)).await
    }

    async fn put(&self, path: &str, body: &Value) -> Result<Reply> {
        self.write(Method::PUT, path, Some(body)).await
    }

    async fn delete(&self, path: &str) -> Result<Reply> {
        self.write::<Value>(Method::DELETE, path, None).await
    }
}

/// Decode the whole `data` object.
fn decode<T: DeserializeOwned>(path: &str, data: Value) -> Result<T> {
    serde_json::from_value(data)
        .map_err(|e| Error::transport(format!("unexpected response from {}: {}", path, e)))
}

/// Decode one field of the `data` object.
fn decode_field<T: DeserializeOwned>(path: &str, mut data: Value, key: &str) -> Result<T> {
    let field = data
        .get_mut(key)
        .map(Value::take)
        .ok_or_else(|| Error::transport(format!("response from {} has no '{}'", path, key)))?;
    decode(path, field)
}

/// One percent-encoded path segment for a caller-supplied ID.
fn segment(id: &str, field: &str) -> Result<String> {
    validate_id(id, field)?;
    Ok(urlencoding::encode(id).into_owned())
}

/// MIME type of an image response. A missing header is taken as JPEG.
fn image_mime_type(content_type: Option<&str>) -> Result<String> {
    let Some(raw) = content_type else {
        return Ok("image/jpeg".to_string());
    };
    let mime = raw.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    if mime.starts_with("image/") {
        Ok(mime)
    } else {
        Err(Error::transport(format!("expected an image, got '{}'", raw)))
    }
}

fn page_query(page: u32, limit: u32) -> Vec<(&'static str, String)> {
    vec![("page", page.to_string()), ("limit", limit.to_string())]
}

#[async_trait]
impl ApiClient for HttpApiClient {
    async fn is_authenticated(&self) -> bool {
        self.session.read().await.is_some()
    }

    async fn set_session(&self, token: String, user: Option<User>) {
        *self.session.write().await = Some(Session { token, user });
    }

    async fn clear_session(&self) {
        *self.session.write().await = None;
    }

    async fn login(&self, email: &str, password: &str) -> Result<AuthSession> {
        let path = "/auth/login";
        let reply = self
            .post(path, &json!({"email": email, "password": password}))
            .await?;
        decode(path, reply.data)
    }

    async fn register(&self, user: &NewUser) -> Result<AuthSession> {
        let path = "/auth/register";
        let reply = self.write(Method::POST, path, Some(user)).await?;
        decode(path, reply.data)
    }

    async fn get_me(&self) -> Result<User> {
        let path = "/auth/me";
        let reply = self.get(path, &[]).await?;
        decode_field(path, reply.data, "user")
    }

    async fn request_auth(&self) -> Result<AuthChallenge> {
        let path = "/auth/device";
        let reply = self.post(path, &json!({})).await?;
        decode(path, reply.data)
    }

    async fn check_auth_status(&self, code: &str) -> Result<AuthStatus> {
        let path = format!("/auth/device/{}", segment(code, "code")?);
        let reply = self.get(&path, &[]).await?;
        decode(&path, reply.data)
    }

    async fn search_products(&self, query: &str, page: u32, limit: u32) -> Result<ProductPage> {
        let path = "/products/search";
        let mut params = page_query(page, limit);
        params.push(("q", query.to_string()));
        let reply = self.get(path, &params).await?;
        decode(path, reply.data)
    }

    async fn get_categories(&self) -> Result<Value> {
        Ok(self.get("/products/categories", &[]).await?.data)
    }

    async fn get_products_by_category(
        &self,
        category_id: &str,
        page: u32,
        limit: u32,
    ) -> Result<ProductPage> {
        let path = format!("/products/category/{}", segment(category_id, "category_id")?);
        let reply = self.get(&path, &page_query(page, limit)).await?;
        decode(&path, reply.data)
    }

    async fn filter_products(&self, filter: &ProductFilter) -> Result<ProductPage> {
        let path = "/products/filter";
        let reply = self.get(path, &filter.query_pairs()).await?;
        decode(path, reply.data)
    }

    async fn get_product(&self, product_id: &str) -> Result<Product> {
        let path = format!("/products/{}", segment(product_id, "product_id")?);
        let reply = self.get(&path, &[]).await?;
        decode_field(&path, reply.data, "product")
    }

    async fn get_alternatives(&self, product_id: &str) -> Result<Value> {
        let path = format!("/products/{}/alternatives", segment(product_id, "product_id")?);
        Ok(self.get(&path, &[]).await?.data)
    }

    async fn get_featured(&self, limit: u32) -> Result<ProductPage> {
        let path = "/products/featured";
        let reply = self.get(path, &[("limit", limit.to_string())]).await?;
        decode(path, reply.data)
    }

    async fn fetch_image(&self, url: &str) -> Result<ImageContent> {
        let url = Url::parse(&self.base_url)
            .and_then(|base| base.join(url.trim()))
            .map_err(|e| Error::validation(format!("invalid image URL '{}': {}", url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::validation(format!("image URL must be http(s): '{}'", url)));
        }

        let started = Instant::now();
        let mut response = self.http.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::api(
                status.as_u16(),
                format!("image download failed: {}", status),
            ));
        }
        let mime_type = image_mime_type(
            response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
        )?;

        let too_large = || {
            Error::transport(format!(
                "image exceeds {} bytes: {}",
                self.max_image_bytes, url
            ))
        };
        if response
            .content_length()
            .is_some_and(|len| len > self.max_image_bytes as u64)
        {
            return Err(too_large());
        }
        let mut bytes = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if bytes.len() + chunk.len() > self.max_image_bytes {
                return Err(too_large());
            }
            bytes.extend_from_slice(&chunk);
        }

        tracing::debug!(
            url = %url,
            mime_type = %mime_type,
            bytes = bytes.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "image_fetched"
        );
        Ok(ImageContent::new(STANDARD.encode(&bytes), mime_type))
    }

    async fn get_cart(&self) -> Result<CartSummary> {
        let path = "/cart";
        let reply = self.get(path, &[]).await?;
        decode(path, reply.data)
    }

    async fn add_cart_item(&self, product_id: &str, quantity: u32) -> Result<Value> {
        let body = json!({"productId": product_id, "quantity": quantity});
        Ok(self.post("/cart/items", &body).await?.data)
    }

    async fn update_cart_item(&self, product_id: &str, quantity: u32) -> Result<Value> {
        let path = format!("/cart/items/{}", segment(product_id, "product_id")?);
        Ok(self.put(&path, &json!({"quantity": quantity})).await?.data)
    }

    async fn remove_cart_item(&self, product_id: &str) -> Result<Value> {
        let path = format!("/cart/items/{}", segment(product_id, "product_id")?);
        Ok(self.delete(&path).await?.data)
    }

    async fn clear_cart(&self) -> Result<Value> {
        Ok(self.delete("/cart").await?.data)
    }

    async fn get_addresses(&self) -> Result<Vec<Address>> {
        let path = "/addresses";
        let reply = self.get(path, &[]).await?;
        decode_field(path, reply.data, "addresses")
    }

    async fn create_address(&self, address: &NewAddress) -> Result<Address> {
        let path = "/addresses";
        let reply = self.write(Method::POST, path, Some(address)).await?;
        decode_field(path, reply.data, "address")
    }

    async fn set_default_address(&self, address_id: &str) -> Result<Value> {
        let path = format!("/addresses/{}/default", segment(address_id, "address_id")?);
        Ok(self.put(&path, &json!({})).await?.data)
    }

    async fn validate_location(&self, address_id: &str) -> Result<LocationCheck> {
        let path = format!("/addresses/{}/validate", segment(address_id, "address_id")?);
        let reply = self.get(&path, &[]).await?;
        decode(&path, reply.data)
    }

    async fn checkout(&self, address_id: &str) -> Result<Value> {
        Ok(self
            .post("/checkout", &json!({"addressId": address_id}))
            .await?
            .data)
    }

    async fn set_payment_mode(&self, order_id: &str, payment_mode: &str) -> Result<Value> {
        let path = format!("/orders/{}/payment-mode", segment(order_id, "order_id")?);
        Ok(self
            .put(&path, &json!({"paymentMode": payment_mode}))
            .await?
            .data)
    }

    async fn process_payment(&self, order_id: &str) -> Result<Value> {
        let path = format!("/orders/{}/pay", segment(order_id, "order_id")?);
        Ok(self.post(&path, &json!({})).await?.data)
    }

    async fn get_orders(&self, page: u32, limit: u32) -> Result<OrderPage> {
        let path = "/orders";
        let reply = self.get(path, &page_query(page, limit)).await?;
        decode(path, reply.data)
    }

    async fn get_order(&self, order_id: &str) -> Result<Value> {
        let path = format!("/orders/{}", segment(order_id, "order_id")?);
        Ok(self.get(&path, &[]).await?.data)
    }

    async fn track_order(&self, order_id: &str) -> Result<Value> {
        let path = format!("/orders/{}/status", segment(order_id, "order_id")?);
        Ok(self.get(&path, &[]).await?.data)
    }

    async fn cancel_order(&self, order_id: &str, reason: Option<String>) -> Result<Value> {
        let path = format!("/orders/{}/cancel", segment(order_id, "order_id")?);
        let body = match reason {
            Some(reason) => json!({"reason": reason}),
            None => json!({}),
        };
        Ok(self.post(&path, &body).await?.data)
    }

    async fn reorder(&self, order_id: &str) -> Result<Value> {
        let path = format!("/orders/{}/reorder", segment(order_id, "order_id")?);
        Ok(self.post(&path, &json!({})).await?.data)
    }

    async fn health(&self) -> Result<Value> {
        let reply = self.get("/health", &[]).await?;
        Ok(json!({
            "message": reply.message,
            "data": reply.data,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ApiConfig;

    fn client() -> HttpApiClient {
        HttpApiClient::new(&ApiConfig {
            base_url: "http://localhost:5000/api/".to_string(),
            ..ApiConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(client().base_url(), "http://localhost:5000/api");
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let client = client();
        assert!(!client.is_authenticated().await);

        client.set_session("tok".to_string(), None).await;
        assert!(client.is_authenticated().await);
        assert!(client.session_user().await.is_none());

        client.clear_session().await;
        assert!(!client.is_authenticated().await);
    }

    #[test]
    fn test_segment_is_encoded_and_checked() {
        assert_eq!(segment("p1", "product_id").unwrap(), "p1");
        assert_eq!(segment("o1/cancel", "order_id").unwrap(), "o1%2Fcancel");
        assert_eq!(segment("a b?c#d", "address_id").unwrap(), "a%20b%3Fc%23d");
        assert_eq!(segment("%2e%2e", "product_id").unwrap(), "%252e%252e");
        assert!(matches!(segment("..", "product_id"), Err(Error::Validation(_))));
        assert!(matches!(segment("", "product_id"), Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_bad_id_never_reaches_the_network() {
        // Nothing listens here; a request would surface as a transport error.
        let client = HttpApiClient::new(&ApiConfig {
            base_url: "http://127.0.0.1:9/api".to_string(),
            ..ApiConfig::default()
        })
        .unwrap();
        let err = client.remove_cart_item("..").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_image_mime_type() {
        assert_eq!(image_mime_type(Some("image/png")).unwrap(), "image/png");
        assert_eq!(
            image_mime_type(Some("Image/WEBP; charset=binary")).unwrap(),
            "image/webp"
        );
        assert_eq!(image_mime_type(None).unwrap(), "image/jpeg");
        assert!(matches!(
            image_mime_type(Some("text/html; charset=utf-8")),
            Err(Error::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_image_rejects_non_http_scheme() {
        let err = client().fetch_image("file:///etc/passwd").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_decode_field_missing_key() {
        let err = decode_field::<Product>("/products/p1", json!({}), "product").unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert!(err.to_string().contains("'product'"));
    }
}
