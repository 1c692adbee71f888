//! Catalog service - business logic layer
//!
//! Owns the rating aggregation: whenever a review operation touches a
//! rating, the product's stored average is recomputed from the observed
//! rated-review count and the previous average.

use chrono::Utc;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::error::{CatalogError, CatalogResult};
use crate::models::{
    Coupon, CreateCategory, CreateCoupon, CreateProduct, CreateReview, Product, ProductCategory,
    ProductFilter, RatingChange, Review, UpdateCategory, UpdateCoupon, UpdateProduct, UpdateReview,
    slugify,
};
use crate::repository::CatalogRepository;

pub struct CatalogService<R: CatalogRepository> {
    repository: Arc<R>,
}

impl<R: CatalogRepository> CatalogService<R> {
    pub fn new(repository: R) -> Self {
        Self {
            repository: Arc::new(repository),
        }
    }

    // ---- Products ----

    #[instrument(skip(self, input), fields(product_title = %input.title))]
    pub async fn create_product(&self, input: CreateProduct) -> CatalogResult<Product> {
        input
            .validate()
            .map_err(|e| CatalogError::Validation(e.to_string()))?;

        if let Some(discount) = input.discount_price {
            if discount > input.price {
                return Err(CatalogError::Validation(
                    "discount_price must not exceed price".to_string(),
                ));
            }
        }

        let slug = slugify(&input.title);
        if self.repository.product_slug_exists(&slug).await? {
            return Err(CatalogError::DuplicateSlug(slug));
        }

        self.repository.create_product(input).await
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, id: Uuid) -> CatalogResult<Product> {
        self.repository
            .get_product(id)
            .await?
            .ok_or(CatalogError::ProductNotFound(id))
    }

    #[instrument(skip(self))]
    pub async fn list_products(&self, filter: ProductFilter) -> CatalogResult<Vec<Product>> {
        self.repository.list_products(filter).await
    }

    #[instrument(skip(self, input))]
    pub async fn update_product(&self, id: Uuid, input: UpdateProduct) -> CatalogResult<Product> {
        input
            .validate()
            .map_err(|e| CatalogError::Validation(e.to_string()))?;

        let existing = self
            .repository
            .get_product(id)
            .await?
            .ok_or(CatalogError::ProductNotFound(id))?;

        let price = input.price.unwrap_or(existing.price);
        let discount = input.discount_price.or(existing.discount_price);
        if let Some(discount) = discount {
            if discount > price {
                return Err(CatalogError::Validation(
                    "discount_price must not exceed price".to_string(),
                ));
            }
        }

        if let Some(ref new_title) = input.title {
            let new_slug = slugify(new_title);
            if new_slug != existing.slug && self.repository.product_slug_exists(&new_slug).await? {
                return Err(CatalogError::DuplicateSlug(new_slug));
            }
        }

        self.repository.update_product(id, input).await
    }

    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: Uuid) -> CatalogResult<()> {
        self.repository.delete_product(id).await?;
        Ok(())
    }

    // ---- Rating aggregation ----

    /// Recompute a product's stored average rating after a review change.
    ///
    /// `N` is the rated-review count observed now, after the triggering
    /// change has already been persisted. The effective divisor is
    /// `N + 1` for a create, `N` for an update, and `N - 1` for a delete;
    /// the new average is `(N * old_average + rating) / divisor` (the
    /// rating's contribution is subtracted for deletes). A divisor of
    /// zero or below resets the stored average to 0.0.
    #[instrument(skip(self))]
    pub async fn recompute_rating(
        &self,
        product_id: Uuid,
        change: RatingChange,
        rating: f64,
    ) -> CatalogResult<f64> {
        let product = self
            .repository
            .get_product(product_id)
            .await?
            .ok_or(CatalogError::ProductNotFound(product_id))?;

        let count = self.repository.count_rated_reviews(product_id).await? as f64;

        let (numerator, divisor) = match change {
            RatingChange::Create => (count * product.total_rating + rating, count + 1.0),
            RatingChange::Update => (count * product.total_rating + rating, count),
            RatingChange::Delete => (count * product.total_rating - rating, count - 1.0),
        };

        let next = if divisor <= 0.0 {
            0.0
        } else {
            numerator / divisor
        };

        self.repository.set_total_rating(product_id, next).await?;

        tracing::info!(product_id = %product_id, rating = next, "total rating recomputed");
        Ok(next)
    }

    // ---- Reviews ----

    #[instrument(skip(self, input))]
    pub async fn create_review(
        &self,
        product_id: Uuid,
        input: CreateReview,
    ) -> CatalogResult<Review> {
        input
            .validate()
            .map_err(|e| CatalogError::Validation(e.to_string()))?;

        self.repository
            .get_product(product_id)
            .await?
            .ok_or(CatalogError::ProductNotFound(product_id))?;

        let rating = input.rating;
        let review = self.repository.create_review(product_id, input).await?;

        if let Some(rating) = rating {
            self.recompute_rating(product_id, RatingChange::Create, rating)
                .await?;
        }

        Ok(review)
    }

    #[instrument(skip(self))]
    pub async fn get_review(&self, id: Uuid) -> CatalogResult<Review> {
        self.repository
            .get_review(id)
            .await?
            .ok_or(CatalogError::ReviewNotFound(id))
    }

    #[instrument(skip(self))]
    pub async fn list_reviews(&self, product_id: Uuid) -> CatalogResult<Vec<Review>> {
        self.repository.list_reviews(product_id).await
    }

    #[instrument(skip(self, input))]
    pub async fn update_review(&self, id: Uuid, input: UpdateReview) -> CatalogResult<Review> {
        input
            .validate()
            .map_err(|e| CatalogError::Validation(e.to_string()))?;

        self.repository
            .get_review(id)
            .await?
            .ok_or(CatalogError::ReviewNotFound(id))?;

        let rating = input.rating;
        let review = self.repository.update_review(id, input).await?;

        if let Some(rating) = rating {
            self.recompute_rating(review.product, RatingChange::Update, rating)
                .await?;
        }

        Ok(review)
    }

    #[instrument(skip(self))]
    pub async fn delete_review(&self, id: Uuid) -> CatalogResult<()> {
        let review = self
            .repository
            .get_review(id)
            .await?
            .ok_or(CatalogError::ReviewNotFound(id))?;

        self.repository.delete_review(id).await?;

        if let Some(rating) = review.rating {
            self.recompute_rating(review.product, RatingChange::Delete, rating)
                .await?;
        }

        Ok(())
    }

    // ---- Categories ----

    #[instrument(skip(self, input), fields(category_title = %input.title))]
    pub async fn create_category(&self, input: CreateCategory) -> CatalogResult<ProductCategory> {
        input
            .validate()
            .map_err(|e| CatalogError::Validation(e.to_string()))?;

        let slug = slugify(&input.title);
        if self.repository.category_slug_exists(&slug).await? {
            return Err(CatalogError::DuplicateSlug(slug));
        }

        self.repository.create_category(input).await
    }

    #[instrument(skip(self))]
    pub async fn get_category(&self, id: Uuid) -> CatalogResult<ProductCategory> {
        self.repository
            .get_category(id)
            .await?
            .ok_or(CatalogError::CategoryNotFound(id))
    }

    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> CatalogResult<Vec<ProductCategory>> {
        self.repository.list_categories().await
    }

    #[instrument(skip(self, input))]
    pub async fn update_category(
        &self,
        id: Uuid,
        input: UpdateCategory,
    ) -> CatalogResult<ProductCategory> {
        input
            .validate()
            .map_err(|e| CatalogError::Validation(e.to_string()))?;

        let existing = self
            .repository
            .get_category(id)
            .await?
            .ok_or(CatalogError::CategoryNotFound(id))?;

        if let Some(ref new_title) = input.title {
            let new_slug = slugify(new_title);
            if new_slug != existing.slug && self.repository.category_slug_exists(&new_slug).await? {
                return Err(CatalogError::DuplicateSlug(new_slug));
            }
        }

        self.repository.update_category(id, input).await
    }

    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: Uuid) -> CatalogResult<()> {
        self.repository.delete_category(id).await?;
        Ok(())
    }

    // ---- Coupons ----

    #[instrument(skip(self, input), fields(coupon_name = %input.name))]
    pub async fn create_coupon(&self, input: CreateCoupon) -> CatalogResult<Coupon> {
        input
            .validate()
            .map_err(|e| CatalogError::Validation(e.to_string()))?;

        if input.expiry <= Utc::now() {
            return Err(CatalogError::Validation(
                "expiry must be in the future".to_string(),
            ));
        }

        let code = input.code.to_uppercase();
        if self.repository.coupon_code_exists(&code).await? {
            return Err(CatalogError::DuplicateCode(code));
        }

        self.repository.create_coupon(input).await
    }

    #[instrument(skip(self))]
    pub async fn get_coupon(&self, id: Uuid) -> CatalogResult<Coupon> {
        self.repository
            .get_coupon(id)
            .await?
            .ok_or(CatalogError::CouponNotFound(id))
    }

    #[instrument(skip(self))]
    pub async fn list_coupons(&self) -> CatalogResult<Vec<Coupon>> {
        self.repository.list_coupons().await
    }

    #[instrument(skip(self, input))]
    pub async fn update_coupon(&self, id: Uuid, input: UpdateCoupon) -> CatalogResult<Coupon> {
        input
            .validate()
            .map_err(|e| CatalogError::Validation(e.to_string()))?;

        let existing = self
            .repository
            .get_coupon(id)
            .await?
            .ok_or(CatalogError::CouponNotFound(id))?;

        if let Some(ref new_code) = input.code {
            let new_code = new_code.to_uppercase();
            if new_code != existing.code && self.repository.coupon_code_exists(&new_code).await? {
                return Err(CatalogError::DuplicateCode(new_code));
            }
        }

        self.repository.update_coupon(id, input).await
    }

    #[instrument(skip(self))]
    pub async fn delete_coupon(&self, id: Uuid) -> CatalogResult<()> {
        self.repository.delete_coupon(id).await?;
        Ok(())
    }
}

impl<R: CatalogRepository> Clone for CatalogService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockCatalogRepository;
    use chrono::Duration;

    fn product_with_rating(id: Uuid, total_rating: f64) -> Product {
        let now = Utc::now();
        Product {
            id,
            title: "Widget".to_string(),
            slug: "widget".to_string(),
            brand: "Acme".to_string(),
            description: vec![],
            price: 10.0,
            discount_price: None,
            category: None,
            quantity: 5,
            sold_quantity: 0,
            primary_image: None,
            colors: vec![],
            total_rating,
            created_at: now,
            updated_at: now,
        }
    }

    fn expect_recompute(
        repo: &mut MockCatalogRepository,
        product_id: Uuid,
        current_avg: f64,
        rated_count: u64,
        expected: f64,
    ) {
        repo.expect_get_product()
            .withf(move |id| *id == product_id)
            .returning(move |id| Ok(Some(product_with_rating(id, current_avg))));
        repo.expect_count_rated_reviews()
            .returning(move |_| Ok(rated_count));
        repo.expect_set_total_rating()
            .withf(move |_, rating| (*rating - expected).abs() < 1e-9)
            .times(1)
            .returning(|_, _| Ok(()));
    }

    #[tokio::test]
    async fn create_mixes_new_rating_into_weighted_sum() {
        let product_id = Uuid::now_v7();
        let mut repo = MockCatalogRepository::new();
        // 4 rated reviews averaging 4.0, new rating 5.0: (4*4 + 5) / 5 = 4.2
        expect_recompute(&mut repo, product_id, 4.0, 4, 4.2);

        let service = CatalogService::new(repo);
        let result = service
            .recompute_rating(product_id, RatingChange::Create, 5.0)
            .await
            .unwrap();
        assert!((result - 4.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn update_keeps_the_divisor_at_the_observed_count() {
        let product_id = Uuid::now_v7();
        let mut repo = MockCatalogRepository::new();
        // 4 rated reviews averaging 3.0, changed rating 5.0: (4*3 + 5) / 4 = 4.25
        expect_recompute(&mut repo, product_id, 3.0, 4, 4.25);

        let service = CatalogService::new(repo);
        let result = service
            .recompute_rating(product_id, RatingChange::Update, 5.0)
            .await
            .unwrap();
        assert!((result - 4.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn delete_removes_the_rating_from_the_weighted_sum() {
        let product_id = Uuid::now_v7();
        let mut repo = MockCatalogRepository::new();
        // 3 rated reviews averaging 4.0, removed rating 5.0: (3*4 - 5) / 2 = 3.5
        expect_recompute(&mut repo, product_id, 4.0, 3, 3.5);

        let service = CatalogService::new(repo);
        let result = service
            .recompute_rating(product_id, RatingChange::Delete, 5.0)
            .await
            .unwrap();
        assert!((result - 3.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn deleting_the_last_rated_review_resets_the_average() {
        let product_id = Uuid::now_v7();
        let mut repo = MockCatalogRepository::new();
        // one rated review observed, divisor would be 0
        expect_recompute(&mut repo, product_id, 5.0, 1, 0.0);

        let service = CatalogService::new(repo);
        let result = service
            .recompute_rating(product_id, RatingChange::Delete, 5.0)
            .await
            .unwrap();
        assert_eq!(result, 0.0);
    }

    #[tokio::test]
    async fn update_with_zero_observed_count_resets_the_average() {
        let product_id = Uuid::now_v7();
        let mut repo = MockCatalogRepository::new();
        expect_recompute(&mut repo, product_id, 4.0, 0, 0.0);

        let service = CatalogService::new(repo);
        let result = service
            .recompute_rating(product_id, RatingChange::Update, 3.0)
            .await
            .unwrap();
        assert_eq!(result, 0.0);
    }

    #[tokio::test]
    async fn recompute_on_missing_product_writes_nothing() {
        let product_id = Uuid::now_v7();
        let mut repo = MockCatalogRepository::new();
        repo.expect_get_product().returning(|_| Ok(None));
        repo.expect_count_rated_reviews().times(0);
        repo.expect_set_total_rating().times(0);

        let service = CatalogService::new(repo);
        let err = service
            .recompute_rating(product_id, RatingChange::Create, 5.0)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::ProductNotFound(_)));
    }

    #[tokio::test]
    async fn unrated_review_creation_skips_recomputation() {
        let product_id = Uuid::now_v7();
        let mut repo = MockCatalogRepository::new();
        repo.expect_get_product()
            .returning(|id| Ok(Some(product_with_rating(id, 4.0))));
        repo.expect_create_review()
            .returning(|product_id, input| Ok(Review::new(product_id, input)));
        repo.expect_count_rated_reviews().times(0);
        repo.expect_set_total_rating().times(0);

        let service = CatalogService::new(repo);
        service
            .create_review(
                product_id,
                CreateReview {
                    author: Uuid::now_v7(),
                    body: "nice but unrated".to_string(),
                    rating: None,
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn rated_review_creation_triggers_recomputation() {
        let product_id = Uuid::now_v7();
        let mut repo = MockCatalogRepository::new();
        repo.expect_get_product()
            .returning(|id| Ok(Some(product_with_rating(id, 0.0))));
        repo.expect_create_review()
            .returning(|product_id, input| Ok(Review::new(product_id, input)));
        // first rating ever: count 1 observed post-persist, (1*0 + 5) / 2 = 2.5
        repo.expect_count_rated_reviews().returning(|_| Ok(1));
        repo.expect_set_total_rating()
            .withf(|_, rating| (*rating - 2.5).abs() < 1e-9)
            .times(1)
            .returning(|_, _| Ok(()));

        let service = CatalogService::new(repo);
        service
            .create_review(
                product_id,
                CreateReview {
                    author: Uuid::now_v7(),
                    body: "great".to_string(),
                    rating: Some(5.0),
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn deleting_a_rated_review_triggers_delete_recomputation() {
        let product_id = Uuid::now_v7();
        let review_id = Uuid::now_v7();
        let mut repo = MockCatalogRepository::new();

        let review = Review {
            id: review_id,
            product: product_id,
            author: Uuid::now_v7(),
            body: "meh".to_string(),
            rating: Some(2.0),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        repo.expect_get_review()
            .returning(move |_| Ok(Some(review.clone())));
        repo.expect_delete_review().returning(|_| Ok(true));
        repo.expect_get_product()
            .returning(|id| Ok(Some(product_with_rating(id, 3.0))));
        // 2 rated reviews remain observed: (2*3 - 2) / 1 = 4.0
        repo.expect_count_rated_reviews().returning(|_| Ok(2));
        repo.expect_set_total_rating()
            .withf(|_, rating| (*rating - 4.0).abs() < 1e-9)
            .times(1)
            .returning(|_, _| Ok(()));

        let service = CatalogService::new(repo);
        service.delete_review(review_id).await.unwrap();
    }

    #[tokio::test]
    async fn create_product_rejects_discount_above_price() {
        let repo = MockCatalogRepository::new();
        let service = CatalogService::new(repo);

        let err = service
            .create_product(CreateProduct {
                title: "Widget".to_string(),
                brand: "Acme".to_string(),
                description: vec![],
                price: 10.0,
                discount_price: Some(12.0),
                category: None,
                quantity: 0,
                primary_image: None,
                colors: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
    }

    #[tokio::test]
    async fn create_product_rejects_duplicate_slug() {
        let mut repo = MockCatalogRepository::new();
        repo.expect_product_slug_exists()
            .withf(|slug| slug == "widget")
            .returning(|_| Ok(true));

        let service = CatalogService::new(repo);
        let err = service
            .create_product(CreateProduct {
                title: "Widget".to_string(),
                brand: "Acme".to_string(),
                description: vec![],
                price: 10.0,
                discount_price: None,
                category: None,
                quantity: 0,
                primary_image: None,
                colors: vec![],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateSlug(_)));
    }

    #[tokio::test]
    async fn create_coupon_rejects_past_expiry() {
        let repo = MockCatalogRepository::new();
        let service = CatalogService::new(repo);

        let err = service
            .create_coupon(CreateCoupon {
                name: "Expired".to_string(),
                code: "OLD".to_string(),
                discount: 10.0,
                expiry: Utc::now() - Duration::days(1),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Validation(_)));
    }

    #[tokio::test]
    async fn create_coupon_checks_uppercased_code_for_duplicates() {
        let mut repo = MockCatalogRepository::new();
        repo.expect_coupon_code_exists()
            .withf(|code| code == "SUMMER20")
            .returning(|_| Ok(true));

        let service = CatalogService::new(repo);
        let err = service
            .create_coupon(CreateCoupon {
                name: "Summer".to_string(),
                code: "summer20".to_string(),
                discount: 20.0,
                expiry: Utc::now() + Duration::days(30),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateCode(_)));
    }
}
