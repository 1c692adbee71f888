use async_trait::async_trait;
use uuid::Uuid;

use crate::error::CatalogResult;
use crate::models::{
    Coupon, CreateCategory, CreateCoupon, CreateProduct, CreateReview, Product, ProductCategory,
    ProductFilter, Review, UpdateCategory, UpdateCoupon, UpdateProduct, UpdateReview,
};

/// Repository trait for catalog persistence
///
/// Covers products, categories, coupons, and reviews, plus the two
/// aggregation primitives the rating recomputation relies on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    // Products
    async fn create_product(&self, input: CreateProduct) -> CatalogResult<Product>;
    async fn get_product(&self, id: Uuid) -> CatalogResult<Option<Product>>;
    async fn list_products(&self, filter: ProductFilter) -> CatalogResult<Vec<Product>>;
    async fn update_product(&self, id: Uuid, input: UpdateProduct) -> CatalogResult<Product>;
    async fn delete_product(&self, id: Uuid) -> CatalogResult<bool>;
    async fn product_slug_exists(&self, slug: &str) -> CatalogResult<bool>;

    /// Count reviews for a product that carry a rating
    async fn count_rated_reviews(&self, product_id: Uuid) -> CatalogResult<u64>;

    /// Overwrite a product's stored average rating
    async fn set_total_rating(&self, product_id: Uuid, rating: f64) -> CatalogResult<()>;

    // Categories
    async fn create_category(&self, input: CreateCategory) -> CatalogResult<ProductCategory>;
    async fn get_category(&self, id: Uuid) -> CatalogResult<Option<ProductCategory>>;
    async fn list_categories(&self) -> CatalogResult<Vec<ProductCategory>>;
    async fn update_category(
        &self,
        id: Uuid,
        input: UpdateCategory,
    ) -> CatalogResult<ProductCategory>;
    async fn delete_category(&self, id: Uuid) -> CatalogResult<bool>;
    async fn category_slug_exists(&self, slug: &str) -> CatalogResult<bool>;

    // Coupons
    async fn create_coupon(&self, input: CreateCoupon) -> CatalogResult<Coupon>;
    async fn get_coupon(&self, id: Uuid) -> CatalogResult<Option<Coupon>>;
    async fn list_coupons(&self) -> CatalogResult<Vec<Coupon>>;
    async fn update_coupon(&self, id: Uuid, input: UpdateCoupon) -> CatalogResult<Coupon>;
    async fn delete_coupon(&self, id: Uuid) -> CatalogResult<bool>;
    async fn coupon_code_exists(&self, code: &str) -> CatalogResult<bool>;

    // Reviews
    async fn create_review(&self, product_id: Uuid, input: CreateReview) -> CatalogResult<Review>;
    async fn get_review(&self, id: Uuid) -> CatalogResult<Option<Review>>;
    async fn list_reviews(&self, product_id: Uuid) -> CatalogResult<Vec<Review>>;
    async fn update_review(&self, id: Uuid, input: UpdateReview) -> CatalogResult<Review>;
    async fn delete_review(&self, id: Uuid) -> CatalogResult<bool>;
}
