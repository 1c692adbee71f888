//! MongoDB implementation of CatalogRepository

use async_trait::async_trait;
use mongodb::{
    Collection, Database,
    bson::{Bson, doc, to_bson},
};
use tracing::instrument;
use uuid::Uuid;

use crate::error::{CatalogError, CatalogResult};
use crate::models::{
    Coupon, CreateCategory, CreateCoupon, CreateProduct, CreateReview, Product, ProductCategory,
    ProductFilter, Review, UpdateCategory, UpdateCoupon, UpdateProduct, UpdateReview,
};
use crate::repository::CatalogRepository;

pub struct MongoCatalogRepository {
    products: Collection<Product>,
    categories: Collection<ProductCategory>,
    coupons: Collection<Coupon>,
    reviews: Collection<Review>,
}

impl MongoCatalogRepository {
    pub fn new(db: Database) -> Self {
        Self {
            products: db.collection::<Product>("products"),
            categories: db.collection::<ProductCategory>("product_categories"),
            coupons: db.collection::<Coupon>("coupons"),
            reviews: db.collection::<Review>("reviews"),
        }
    }

    fn id_filter(id: Uuid) -> mongodb::bson::Document {
        doc! { "_id": to_bson(&id).unwrap_or(Bson::Null) }
    }

    /// Build a MongoDB filter document from ProductFilter
    fn build_product_filter(filter: &ProductFilter) -> mongodb::bson::Document {
        let mut doc = doc! {};

        if let Some(ref brand) = filter.brand {
            doc.insert("brand", brand);
        }

        if let Some(ref category) = filter.category {
            doc.insert("category", category);
        }

        if let Some(ref search) = filter.search {
            doc.insert(
                "$or",
                vec![
                    doc! { "title": { "$regex": search, "$options": "i" } },
                    doc! { "description": { "$regex": search, "$options": "i" } },
                ],
            );
        }

        doc
    }
}

#[async_trait]
impl CatalogRepository for MongoCatalogRepository {
    #[instrument(skip(self, input), fields(product_title = %input.title))]
    async fn create_product(&self, input: CreateProduct) -> CatalogResult<Product> {
        let product = Product::new(input);
        self.products.insert_one(&product).await?;

        tracing::info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    #[instrument(skip(self))]
    async fn get_product(&self, id: Uuid) -> CatalogResult<Option<Product>> {
        let product = self.products.find_one(Self::id_filter(id)).await?;
        Ok(product)
    }

    #[instrument(skip(self))]
    async fn list_products(&self, filter: ProductFilter) -> CatalogResult<Vec<Product>> {
        use futures_util::TryStreamExt;

        let mongo_filter = Self::build_product_filter(&filter);

        let options = mongodb::options::FindOptions::builder()
            .limit(filter.limit)
            .skip(filter.offset)
            .sort(doc! { "created_at": -1 })
            .build();

        let cursor = self
            .products
            .find(mongo_filter)
            .with_options(options)
            .await?;
        let products: Vec<Product> = cursor.try_collect().await?;

        Ok(products)
    }

    #[instrument(skip(self, input))]
    async fn update_product(&self, id: Uuid, input: UpdateProduct) -> CatalogResult<Product> {
        let filter = Self::id_filter(id);
        let existing = self
            .products
            .find_one(filter.clone())
            .await?
            .ok_or(CatalogError::ProductNotFound(id))?;

        let mut updated = existing;
        updated.apply_update(input);

        self.products.replace_one(filter, &updated).await?;

        tracing::info!(product_id = %id, "Product updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn delete_product(&self, id: Uuid) -> CatalogResult<bool> {
        let result = self.products.delete_one(Self::id_filter(id)).await?;

        if result.deleted_count == 0 {
            return Err(CatalogError::ProductNotFound(id));
        }

        tracing::info!(product_id = %id, "Product deleted");
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn product_slug_exists(&self, slug: &str) -> CatalogResult<bool> {
        let count = self.products.count_documents(doc! { "slug": slug }).await?;
        Ok(count > 0)
    }

    #[instrument(skip(self))]
    async fn count_rated_reviews(&self, product_id: Uuid) -> CatalogResult<u64> {
        let filter = doc! {
            "product": to_bson(&product_id).unwrap_or(Bson::Null),
            "rating": { "$exists": true },
        };
        let count = self.reviews.count_documents(filter).await?;
        Ok(count)
    }

    #[instrument(skip(self))]
    async fn set_total_rating(&self, product_id: Uuid, rating: f64) -> CatalogResult<()> {
        let result = self
            .products
            .update_one(
                Self::id_filter(product_id),
                doc! { "$set": { "total_rating": rating } },
            )
            .await?;

        if result.matched_count == 0 {
            return Err(CatalogError::ProductNotFound(product_id));
        }

        Ok(())
    }

    #[instrument(skip(self, input), fields(category_title = %input.title))]
    async fn create_category(&self, input: CreateCategory) -> CatalogResult<ProductCategory> {
        let category = ProductCategory::new(input);
        self.categories.insert_one(&category).await?;

        tracing::info!(category_id = %category.id, "Category created");
        Ok(category)
    }

    #[instrument(skip(self))]
    async fn get_category(&self, id: Uuid) -> CatalogResult<Option<ProductCategory>> {
        let category = self.categories.find_one(Self::id_filter(id)).await?;
        Ok(category)
    }

    #[instrument(skip(self))]
    async fn list_categories(&self) -> CatalogResult<Vec<ProductCategory>> {
        use futures_util::TryStreamExt;

        let cursor = self.categories.find(doc! {}).await?;
        let categories: Vec<ProductCategory> = cursor.try_collect().await?;

        Ok(categories)
    }

    #[instrument(skip(self, input))]
    async fn update_category(
        &self,
        id: Uuid,
        input: UpdateCategory,
    ) -> CatalogResult<ProductCategory> {
        let filter = Self::id_filter(id);
        let existing = self
            .categories
            .find_one(filter.clone())
            .await?
            .ok_or(CatalogError::CategoryNotFound(id))?;

        let mut updated = existing;
        updated.apply_update(input);

        self.categories.replace_one(filter, &updated).await?;

        tracing::info!(category_id = %id, "Category updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn delete_category(&self, id: Uuid) -> CatalogResult<bool> {
        let result = self.categories.delete_one(Self::id_filter(id)).await?;

        if result.deleted_count == 0 {
            return Err(CatalogError::CategoryNotFound(id));
        }

        tracing::info!(category_id = %id, "Category deleted");
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn category_slug_exists(&self, slug: &str) -> CatalogResult<bool> {
        let count = self
            .categories
            .count_documents(doc! { "slug": slug })
            .await?;
        Ok(count > 0)
    }

    #[instrument(skip(self, input), fields(coupon_name = %input.name))]
    async fn create_coupon(&self, input: CreateCoupon) -> CatalogResult<Coupon> {
        let coupon = Coupon::new(input);
        self.coupons.insert_one(&coupon).await?;

        tracing::info!(coupon_id = %coupon.id, "Coupon created");
        Ok(coupon)
    }

    #[instrument(skip(self))]
    async fn get_coupon(&self, id: Uuid) -> CatalogResult<Option<Coupon>> {
        let coupon = self.coupons.find_one(Self::id_filter(id)).await?;
        Ok(coupon)
    }

    #[instrument(skip(self))]
    async fn list_coupons(&self) -> CatalogResult<Vec<Coupon>> {
        use futures_util::TryStreamExt;

        let cursor = self.coupons.find(doc! {}).await?;
        let coupons: Vec<Coupon> = cursor.try_collect().await?;

        Ok(coupons)
    }

    #[instrument(skip(self, input))]
    async fn update_coupon(&self, id: Uuid, input: UpdateCoupon) -> CatalogResult<Coupon> {
        let filter = Self::id_filter(id);
        let existing = self
            .coupons
            .find_one(filter.clone())
            .await?
            .ok_or(CatalogError::CouponNotFound(id))?;

        let mut updated = existing;
        updated.apply_update(input);

        self.coupons.replace_one(filter, &updated).await?;

        tracing::info!(coupon_id = %id, "Coupon updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn delete_coupon(&self, id: Uuid) -> CatalogResult<bool> {
        let result = self.coupons.delete_one(Self::id_filter(id)).await?;

        if result.deleted_count == 0 {
            return Err(CatalogError::CouponNotFound(id));
        }

        tracing::info!(coupon_id = %id, "Coupon deleted");
        Ok(true)
    }

    #[instrument(skip(self))]
    async fn coupon_code_exists(&self, code: &str) -> CatalogResult<bool> {
        let count = self.coupons.count_documents(doc! { "code": code }).await?;
        Ok(count > 0)
    }

    #[instrument(skip(self, input))]
    async fn create_review(&self, product_id: Uuid, input: CreateReview) -> CatalogResult<Review> {
        let review = Review::new(product_id, input);
        self.reviews.insert_one(&review).await?;

        tracing::info!(review_id = %review.id, product_id = %product_id, "Review created");
        Ok(review)
    }

    #[instrument(skip(self))]
    async fn get_review(&self, id: Uuid) -> CatalogResult<Option<Review>> {
        let review = self.reviews.find_one(Self::id_filter(id)).await?;
        Ok(review)
    }

    #[instrument(skip(self))]
    async fn list_reviews(&self, product_id: Uuid) -> CatalogResult<Vec<Review>> {
        use futures_util::TryStreamExt;

        let filter = doc! { "product": to_bson(&product_id).unwrap_or(Bson::Null) };
        let options = mongodb::options::FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();

        let cursor = self.reviews.find(filter).with_options(options).await?;
        let reviews: Vec<Review> = cursor.try_collect().await?;

        Ok(reviews)
    }

    #[instrument(skip(self, input))]
    async fn update_review(&self, id: Uuid, input: UpdateReview) -> CatalogResult<Review> {
        let filter = Self::id_filter(id);
        let existing = self
            .reviews
            .find_one(filter.clone())
            .await?
            .ok_or(CatalogError::ReviewNotFound(id))?;

        let mut updated = existing;
        updated.apply_update(input);

        self.reviews.replace_one(filter, &updated).await?;

        tracing::info!(review_id = %id, "Review updated");
        Ok(updated)
    }

    #[instrument(skip(self))]
    async fn delete_review(&self, id: Uuid) -> CatalogResult<bool> {
        let result = self.reviews.delete_one(Self::id_filter(id)).await?;

        if result.deleted_count == 0 {
            return Err(CatalogError::ReviewNotFound(id));
        }

        tracing::info!(review_id = %id, "Review deleted");
        Ok(true)
    }
}
