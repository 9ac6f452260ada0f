//! Product discovery tools. None of them need a session.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::common::{count_of, product_images, product_summary, recover, LISTING_IMAGES};
use crate::client::{ProductFilter, ProductPage};
use crate::envelope::{ImageContent, ResponseEnvelope};
use crate::tools::catalog::{ParamDef, ParamType, ToolDefinition};
use crate::tools::handler::{Params, ToolContext, ToolHandler};
use crate::tools::registry::ToolRegistry;
use crate::types::Result;
use crate::validation::{validate_id, validate_non_empty, validate_positive, validate_price_range};

pub const SORT_OPTIONS: &[&str] = &["rating", "price_low", "price_high", "name", "newest", "discount"];
pub const DIETARY_OPTIONS: &[&str] = &["veg", "non_veg", "vegan"];

pub fn register(registry: &mut ToolRegistry) -> Result<()> {
    registry.register(SearchProducts)?;
    registry.register(GetCategories)?;
    registry.register(GetProductsByCategory)?;
    registry.register(FilterProducts)?;
    registry.register(GetProductDetails)?;
    registry.register(GetAlternativeProducts)?;
    registry.register(GetFeaturedProducts)?;
    registry.register(ShowProductImage)?;
    Ok(())
}

fn page_param() -> ParamDef {
    ParamDef::with_default("page", ParamType::Int, "Page number", json!(1))
}

fn limit_param(default: u32) -> ParamDef {
    ParamDef::with_default("limit", ParamType::Int, "Results per page", json!(default))
}

fn show_images_param() -> ParamDef {
    ParamDef::with_default(
        "show_images",
        ParamType::Bool,
        "Show images of the top 3 products",
        json!(true),
    )
}

/// Images for the head of a listing, when asked for.
async fn listing_images(ctx: &ToolContext, page: &ProductPage, wanted: bool) -> Vec<ImageContent> {
    if wanted {
        product_images(ctx, &page.products, LISTING_IMAGES).await
    } else {
        Vec::new()
    }
}

/// Listing envelope with one summary per product.
fn listing(page: ProductPage, found: impl FnOnce(usize) -> String, empty: String) -> ResponseEnvelope {
    let summaries: Vec<Value> = page.products.iter().map(product_summary).collect();
    let message = if summaries.is_empty() {
        empty
    } else {
        found(summaries.len())
    };
    ResponseEnvelope::success(message).with_data(json!({
        "products": summaries,
        "count": summaries.len(),
        "pagination": page.pagination,
    }))
}

// =============================================================================
// search_products
// =============================================================================

#[derive(Debug)]
pub struct SearchProducts;

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: String,
    page: i64,
    limit: i64,
    #[serde(default)]
    show_images: bool,
}

#[async_trait]
impl ToolHandler for SearchProducts {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "search_products",
            "Search products by name, description, brand or tags (e.g. 'milk', 'tomatoes'). \
             Use for direct item requests; for dishes ask servings, diet and allergies first.",
        )
        .param(ParamDef::required("query", ParamType::String, "Search term"))
        .param(page_param())
        .param(limit_param(10))
        .param(show_images_param())
    }

    async fn call(&self, ctx: &ToolContext, params: Params) -> Result<ResponseEnvelope> {
        let p: SearchParams = params.parse()?;
        validate_non_empty(&p.query, "query")?;
        let page = validate_positive(p.page, "page")?;
        let limit = validate_positive(p.limit, "limit")?;

        let results = ctx.client.search_products(&p.query, page, limit).await?;
        let images = listing_images(ctx, &results, p.show_images).await;
        let query = p.query;
        Ok(listing(
            results,
            |n| format!("Found {} for '{}'.", count_of(n, "product", "products"), query),
            format!("No products found for '{}'. Try a broader term or get_categories.", query),
        )
        .with_images(images))
    }
}

// =============================================================================
// get_categories
// =============================================================================

#[derive(Debug)]
pub struct GetCategories;

#[async_trait]
impl ToolHandler for GetCategories {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_categories",
            "List product categories (fruits, vegetables, dairy, ...) for browsing.",
        )
    }

    async fn call(&self, ctx: &ToolContext, _params: Params) -> Result<ResponseEnvelope> {
        let data = ctx.client.get_categories().await?;
        let count = data
            .get("categories")
            .and_then(Value::as_array)
            .map(Vec::len);
        let message = match count {
            Some(n) => format!("Found {}.", count_of(n, "category", "categories")),
            None => "Categories retrieved.".to_string(),
        };
        Ok(ResponseEnvelope::success(message).with_data(data))
    }
}

// =============================================================================
// get_products_by_category
// =============================================================================

#[derive(Debug)]
pub struct GetProductsByCategory;

#[derive(Debug, Deserialize)]
struct CategoryParams {
    category_id: String,
    page: i64,
    limit: i64,
    #[serde(default)]
    show_images: bool,
}

#[async_trait]
impl ToolHandler for GetProductsByCategory {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_products_by_category",
            "List products in a category. Use a category_id from get_categories.",
        )
        .param(ParamDef::required("category_id", ParamType::String, "Category ID"))
        .param(page_param())
        .param(limit_param(10))
        .param(show_images_param())
    }

    async fn call(&self, ctx: &ToolContext, params: Params) -> Result<ResponseEnvelope> {
        let p: CategoryParams = params.parse()?;
        validate_id(&p.category_id, "category_id")?;
        let page = validate_positive(p.page, "page")?;
        let limit = validate_positive(p.limit, "limit")?;

        match ctx
            .client
            .get_products_by_category(&p.category_id, page, limit)
            .await
        {
            Ok(results) => {
                let images = listing_images(ctx, &results, p.show_images).await;
                Ok(listing(
                    results,
                    |n| format!("Found {} in this category.", count_of(n, "product", "products")),
                    "This category has no products right now.".to_string(),
                )
                .with_images(images))
            }
            Err(err) => {
                recover(
                    ctx,
                    err,
                    &format!(
                        "Category '{}' not found. Use get_categories to list valid categories.",
                        p.category_id
                    ),
                )
                .await
            }
        }
    }
}

// =============================================================================
// filter_products
// =============================================================================

#[derive(Debug)]
pub struct FilterProducts;

#[derive(Debug, Deserialize)]
struct FilterParams {
    category: Option<String>,
    min_price: Option<f64>,
    max_price: Option<f64>,
    dietary: Option<String>,
    brand: Option<String>,
    in_stock: bool,
    sort_by: String,
    page: i64,
    limit: i64,
    #[serde(default)]
    show_images: bool,
}

#[async_trait]
impl ToolHandler for FilterProducts {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "filter_products",
            "Filter products by category, price range, dietary preference and brand.",
        )
        .param(ParamDef::optional("category", ParamType::String, "Category ID"))
        .param(ParamDef::optional("min_price", ParamType::Float, "Minimum price in INR"))
        .param(ParamDef::optional("max_price", ParamType::Float, "Maximum price in INR"))
        .param(ParamDef::optional(
            "dietary",
            ParamType::one_of(DIETARY_OPTIONS),
            "Dietary preference",
        ))
        .param(ParamDef::optional("brand", ParamType::String, "Brand name"))
        .param(ParamDef::with_default(
            "in_stock",
            ParamType::Bool,
            "Only in-stock items",
            json!(true),
        ))
        .param(ParamDef::with_default(
            "sort_by",
            ParamType::one_of(SORT_OPTIONS),
            "Sort order",
            json!("rating"),
        ))
        .param(page_param())
        .param(limit_param(10))
        .param(show_images_param())
    }

    async fn call(&self, ctx: &ToolContext, params: Params) -> Result<ResponseEnvelope> {
        let p: FilterParams = params.parse()?;
        validate_price_range(p.min_price, p.max_price)?;
        let filter = ProductFilter {
            category: p.category.filter(|c| !c.is_empty()),
            min_price: p.min_price,
            max_price: p.max_price,
            dietary: p.dietary,
            brand: p.brand.filter(|b| !b.is_empty()),
            in_stock: p.in_stock,
            sort_by: p.sort_by,
            page: validate_positive(p.page, "page")?,
            limit: validate_positive(p.limit, "limit")?,
        };

        let results = ctx.client.filter_products(&filter).await?;
        let images = listing_images(ctx, &results, p.show_images).await;
        Ok(listing(
            results,
            |n| format!("Found {} matching the filters.", count_of(n, "product", "products")),
            "No products match these filters. Try relaxing the price range or brand.".to_string(),
        )
        .with_images(images))
    }
}

// =============================================================================
// get_product_details
// =============================================================================

#[derive(Debug)]
pub struct GetProductDetails;

#[derive(Debug, Deserialize)]
struct ProductIdParams {
    product_id: String,
}

#[derive(Debug, Deserialize)]
struct DetailsParams {
    product_id: String,
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
impl ToolHandler for GetProductDetails {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_product_details",
            "Get full details of one product. Show these before adding it to the cart.",
        )
        .param(ParamDef::required("product_id", ParamType::String, "Product ID"))
        .param(ParamDef::with_default(
            "show_image",
            ParamType::Bool,
            "Also show the product image",
            json!(false),
        ))
    }

    async fn call(&self, ctx: &ToolContext, params: Params) -> Result<ResponseEnvelope> {
        let p: DetailsParams = params.parse()?;
        validate_id(&p.product_id, "product_id")?;
        let product = match ctx.client.get_product(&p.product_id).await {
            Ok(product) => product,
            Err(err) => return recover(ctx, err, &product_not_found(&p.product_id)).await,
        };
        let images = if p.show_image {
            product_images(ctx, std::slice::from_ref(&product), 1).await
        } else {
            Vec::new()
        };
        Ok(ResponseEnvelope::success(format!(
            "{} costs ₹{} and arrives in ~{} minutes.",
            product.name,
            product.price,
            product.delivery_mins()
        ))
        .with_data(json!({
            "product": product,
            "summary": product_summary(&product),
        }))
        .with_images(images))
    }
}

// =============================================================================
// get_alternative_products
// =============================================================================

#[derive(Debug)]
pub struct GetAlternativeProducts;

#[async_trait]
impl ToolHandler for GetAlternativeProducts {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_alternative_products",
            "Get similar products, e.g. when an item is out of stock.",
        )
        .param(ParamDef::required("product_id", ParamType::String, "Product ID"))
    }

    async fn call(&self, ctx: &ToolContext, params: Params) -> Result<ResponseEnvelope> {
        let p: ProductIdParams = params.parse()?;
        validate_id(&p.product_id, "product_id")?;
        match ctx.client.get_alternatives(&p.product_id).await {
            Ok(data) => Ok(ResponseEnvelope::success("Alternatives retrieved.").with_data(data)),
            Err(err) => recover(ctx, err, &product_not_found(&p.product_id)).await,
        }
    }
}

// =============================================================================
// get_featured_products
// =============================================================================

#[derive(Debug)]
pub struct GetFeaturedProducts;

#[derive(Debug, Deserialize)]
struct FeaturedParams {
    limit: i64,
    #[serde(default)]
    show_images: bool,
}

#[async_trait]
impl ToolHandler for GetFeaturedProducts {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new("get_featured_products", "Get featured and popular products.")
            .param(limit_param(12))
            .param(show_images_param())
    }

    async fn call(&self, ctx: &ToolContext, params: Params) -> Result<ResponseEnvelope> {
        let p: FeaturedParams = params.parse()?;
        let limit = validate_positive(p.limit, "limit")?;
        let results = ctx.client.get_featured(limit).await?;
        let images = listing_images(ctx, &results, p.show_images).await;
        Ok(listing(
            results,
            |n| format!("Here are {}.", count_of(n, "featured product", "featured products")),
            "No featured products right now.".to_string(),
        )
        .with_images(images))
    }
}

// =============================================================================
// show_product_image
// =============================================================================

/// Shows one product's picture. Download problems are reported, never raised.
#[derive(Debug)]
pub struct ShowProductImage;

#[async_trait]
impl ToolHandler for ShowProductImage {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "show_product_image",
            "Show the user what a product looks like.",
        )
        .param(ParamDef::required("product_id", ParamType::String, "Product ID"))
    }

    async fn call(&self, ctx: &ToolContext, params: Params) -> Result<ResponseEnvelope> {
        let p: ProductIdParams = params.parse()?;
        validate_id(&p.product_id, "product_id")?;
        let product = match ctx.client.get_product(&p.product_id).await {
            Ok(product) => product,
            Err(err) => return recover(ctx, err, &product_not_found(&p.product_id)).await,
        };

        let Some(url) = product.image.as_deref().filter(|u| !u.trim().is_empty()) else {
            return Ok(ResponseEnvelope::failure(format!("{} has no image.", product.name))
                .with_data(json!({"product_id": p.product_id})));
        };
        let data = json!({
            "product_id": p.product_id,
            "name": product.name,
            "image_url": url,
        });
        match ctx.client.fetch_image(url).await {
            Ok(image) => Ok(ResponseEnvelope::success(format!("Showing {}.", product.name))
                .with_data(data)
                .with_images(vec![image])),
            Err(err) => {
                tracing::warn!(url = %url, error = %err, "product_image_failed");
                let mut data = data;
                data["error"] = json!(err.to_string());
                Ok(ResponseEnvelope::failure("Could not load product image.").with_data(data))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PendingAuthStore;
    use crate::client::{MockApiClient, Product};
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

    fn product(id: &str, price: f64, mrp: f64) -> Product {
        serde_json::from_value(json!({
            "_id": id, "name": "Amul Milk", "price": price, "mrp": mrp, "stock": 3
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_search_formats_products() {
        let mut mock = MockApiClient::new();
        mock.expect_search_products()
            .withf(|q, page, limit| q == "milk" && *page == 1 && *limit == 10)
            .returning(|_, _, _| {
                Ok(ProductPage {
                    products: vec![product("p1", 27.0, 30.0)],
                    pagination: None,
                })
            });

        let env = SearchProducts
            .call(&ctx(mock), Params::new(json!({"query": "milk", "page": 1, "limit": 10})))
            .await
            .unwrap();
        assert!(env.success);
        assert_eq!(env.message, "Found 1 product for 'milk'.");
        let data = env.data.unwrap();
        assert_eq!(data["count"], 1);
        assert_eq!(data["products"][0]["discount_percent"], 10);
    }

    #[tokio::test]
    async fn test_search_empty_is_still_success() {
        let mut mock = MockApiClient::new();
        mock.expect_search_products()
            .returning(|_, _, _| Ok(ProductPage::default()));

        let env = SearchProducts
            .call(&ctx(mock), Params::new(json!({"query": "caviar", "page": 1, "limit": 10})))
            .await
            .unwrap();
        assert!(env.success);
        assert!(env.message.starts_with("No products found"));
    }

    #[tokio::test]
    async fn test_product_details_not_found() {
        let mut mock = MockApiClient::new();
        mock.expect_get_product()
            .returning(|_| Err(Error::api(404, "Product not found")));

        let env = GetProductDetails
            .call(&ctx(mock), Params::new(json!({"product_id": "missing"})))
            .await
            .unwrap();
        assert!(!env.success);
        assert!(env.message.contains("search_products"));
    }

    fn pictured(id: &str, image: &str) -> Product {
        serde_json::from_value(json!({
            "_id": id, "name": "Amul Milk", "price": 27, "mrp": 30, "stock": 3, "image": image
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_search_attaches_images_when_asked() {
        let mut mock = MockApiClient::new();
        mock.expect_search_products().returning(|_, _, _| {
            Ok(ProductPage {
                products: vec![pictured("p1", "/img/p1.png"), product("p2", 10.0, 10.0)],
                pagination: None,
            })
        });
        mock.expect_fetch_image()
            .withf(|url| url == "/img/p1.png")
            .times(1)
            .returning(|_| Ok(ImageContent::new("iVBORw0=", "image/png")));

        let env = SearchProducts
            .call(
                &ctx(mock),
                Params::new(json!({"query": "milk", "page": 1, "limit": 10, "show_images": true})),
            )
            .await
            .unwrap();
        assert!(env.success);
        assert_eq!(env.images, vec![ImageContent::new("iVBORw0=", "image/png")]);
        assert_eq!(env.data.unwrap()["count"], 2);
    }

    #[tokio::test]
    async fn test_details_image_is_opt_in() {
        let mut mock = MockApiClient::new();
        mock.expect_get_product()
            .returning(|_| Ok(pictured("p1", "/img/p1.png")));
        mock.expect_fetch_image().never();

        let env = GetProductDetails
            .call(&ctx(mock), Params::new(json!({"product_id": "p1", "show_image": false})))
            .await
            .unwrap();
        assert!(env.success);
        assert!(env.images.is_empty());
    }

    #[tokio::test]
    async fn test_show_product_image() {
        let mut mock = MockApiClient::new();
        mock.expect_get_product()
            .withf(|id| id == "p1")
            .returning(|_| Ok(pictured("p1", "https://cdn.example.com/p1.jpg")));
        mock.expect_fetch_image()
            .withf(|url| url == "https://cdn.example.com/p1.jpg")
            .returning(|_| Ok(ImageContent::new("/9j/4AAQ", "image/jpeg")));

        let env = ShowProductImage
            .call(&ctx(mock), Params::new(json!({"product_id": "p1"})))
            .await
            .unwrap();
        assert!(env.success);
        assert_eq!(env.message, "Showing Amul Milk.");
        assert_eq!(env.images.len(), 1);
        assert_eq!(env.images[0].mime_type, "image/jpeg");
        assert_eq!(env.data.unwrap()["image_url"], "https://cdn.example.com/p1.jpg");
    }

    #[tokio::test]
    async fn test_show_product_image_download_failure_is_reported() {
        let mut mock = MockApiClient::new();
        mock.expect_get_product()
            .returning(|_| Ok(pictured("p1", "/img/p1.png")));
        mock.expect_fetch_image()
            .returning(|_| Err(Error::transport("image exceeds 1048576 bytes")));

        let env = ShowProductImage
            .call(&ctx(mock), Params::new(json!({"product_id": "p1"})))
            .await
            .unwrap();
        assert!(!env.success);
        assert_eq!(env.message, "Could not load product image.");
        assert!(env.images.is_empty());
        let data = env.data.unwrap();
        assert_eq!(data["image_url"], "/img/p1.png");
        assert!(data["error"].as_str().unwrap().contains("1048576"));
    }

    #[tokio::test]
    async fn test_show_product_image_without_image() {
        let mut mock = MockApiClient::new();
        mock.expect_get_product()
            .returning(|_| Ok(product("p1", 27.0, 30.0)));
        mock.expect_fetch_image().never();

        let env = ShowProductImage
            .call(&ctx(mock), Params::new(json!({"product_id": "p1"})))
            .await
            .unwrap();
        assert!(!env.success);
        assert_eq!(env.message, "Amul Milk has no image.");
    }

    #[tokio::test]
    async fn test_dot_segment_ids_are_rejected() {
        let mut mock = MockApiClient::new();
        mock.expect_get_products_by_category().never();
        mock.expect_get_alternatives().never();
        let ctx = ctx(mock);

        let err = GetProductsByCategory
            .call(&ctx, Params::new(json!({"category_id": "..", "page": 1, "limit": 10})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = GetAlternativeProducts
            .call(&ctx, Params::new(json!({"product_id": " "})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_filter_rejects_inverted_price_range() {
        let err = FilterProducts
            .call(
                &ctx(MockApiClient::new()),
                Params::new(json!({
                    "min_price": 200.0, "max_price": 100.0, "in_stock": true,
                    "sort_by": "rating", "page": 1, "limit": 10
                })),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_filter_passes_criteria() {
        let mut mock = MockApiClient::new();
        mock.expect_filter_products()
            .withf(|f| f.dietary.as_deref() == Some("vegan") && f.in_stock && f.sort_by == "price_low")
            .returning(|_| Ok(ProductPage::default()));

        let env = FilterProducts
            .call(
                &ctx(mock),
                Params::new(json!({
                    "dietary": "vegan", "in_stock": true, "sort_by": "price_low",
                    "page": 1, "limit": 10
                })),
            )
            .await
            .unwrap();
        assert!(env.success);
    }
}
