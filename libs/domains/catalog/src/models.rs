use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Why a rating recomputation was triggered
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RatingChange {
    /// A new rated review was added
    Create,
    /// An existing review's rating changed
    Update,
    /// A rated review was removed
    Delete,
}

/// A stored asset reference (CDN URL plus the provider id needed to delete it)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AssetRef {
    pub url: String,
    pub public_id: String,
}

/// Per-color product variant
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ColorVariant {
    pub color: String,
    #[serde(default)]
    pub quantity: i32,
    #[serde(default)]
    pub sold_quantity: i32,
    pub image: Option<AssetRef>,
}

/// Product entity
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Product {
    /// Unique identifier (stored as _id in MongoDB)
    #[serde(rename = "_id", alias = "id")]
    pub id: Uuid,
    pub title: String,
    /// URL-safe identifier derived from the title, unique per catalog
    pub slug: String,
    pub brand: String,
    /// Description paragraphs
    #[serde(default)]
    pub description: Vec<String>,
    pub price: f64,
    /// Must not exceed `price`
    pub discount_price: Option<f64>,
    /// Category slug
    pub category: Option<String>,
    #[serde(default)]
    pub quantity: i32,
    #[serde(default)]
    pub sold_quantity: i32,
    pub primary_image: Option<AssetRef>,
    #[serde(default)]
    pub colors: Vec<ColorVariant>,
    /// Running average of review ratings, maintained by the rating aggregator
    #[serde(default)]
    pub total_rating: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// DTO for creating a product
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateProduct {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 100))]
    pub brand: String,
    #[serde(default)]
    pub description: Vec<String>,
    #[validate(range(min = 0.0))]
    pub price: f64,
    #[validate(range(min = 0.0))]
    pub discount_price: Option<f64>,
    pub category: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub quantity: i32,
    pub primary_image: Option<AssetRef>,
    #[serde(default)]
    pub colors: Vec<ColorVariant>,
}

/// DTO for updating a product
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProduct {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub brand: Option<String>,
    pub description: Option<Vec<String>>,
    #[validate(range(min = 0.0))]
    pub price: Option<f64>,
    #[validate(range(min = 0.0))]
    pub discount_price: Option<f64>,
    pub category: Option<String>,
    #[validate(range(min = 0))]
    pub quantity: Option<i32>,
    pub primary_image: Option<AssetRef>,
    pub colors: Option<Vec<ColorVariant>>,
}

/// Query filters for listing products
#[derive(Debug, Clone, Default, Deserialize, ToSchema, IntoParams)]
pub struct ProductFilter {
    /// Filter by brand
    pub brand: Option<String>,
    /// Filter by category slug
    pub category: Option<String>,
    /// Search in title and description
    pub search: Option<String>,
    /// Maximum number of results
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Number of results to skip
    #[serde(default)]
    pub offset: u64,
}

fn default_limit() -> i64 {
    50
}

impl Product {
    pub fn new(input: CreateProduct) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            slug: slugify(&input.title),
            title: input.title,
            brand: input.brand,
            description: input.description,
            price: input.price,
            discount_price: input.discount_price,
            category: input.category,
            quantity: input.quantity,
            sold_quantity: 0,
            primary_image: input.primary_image,
            colors: input.colors,
            total_rating: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply updates from UpdateProduct DTO. A title change re-derives the slug.
    pub fn apply_update(&mut self, update: UpdateProduct) {
        if let Some(title) = update.title {
            self.slug = slugify(&title);
            self.title = title;
        }
        if let Some(brand) = update.brand {
            self.brand = brand;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(price) = update.price {
            self.price = price;
        }
        if let Some(discount_price) = update.discount_price {
            self.discount_price = Some(discount_price);
        }
        if let Some(category) = update.category {
            self.category = Some(category);
        }
        if let Some(quantity) = update.quantity {
            self.quantity = quantity;
        }
        if let Some(primary_image) = update.primary_image {
            self.primary_image = Some(primary_image);
        }
        if let Some(colors) = update.colors {
            self.colors = colors;
        }
        self.updated_at = Utc::now();
    }
}

/// Product category entity
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductCategory {
    #[serde(rename = "_id", alias = "id")]
    pub id: Uuid,
    /// Unique display title
    pub title: String,
    /// Unique URL-safe identifier derived from the title
    pub slug: String,
    pub image: Option<AssetRef>,
    pub icon: Option<String>,
    /// Brands sold under this category
    #[serde(default)]
    pub brands: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateCategory {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    pub image: Option<AssetRef>,
    pub icon: Option<String>,
    #[serde(default)]
    pub brands: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateCategory {
    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,
    pub image: Option<AssetRef>,
    pub icon: Option<String>,
    pub brands: Option<Vec<String>>,
}

impl ProductCategory {
    pub fn new(input: CreateCategory) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            slug: slugify(&input.title),
            title: input.title,
            image: input.image,
            icon: input.icon,
            brands: input.brands,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_update(&mut self, update: UpdateCategory) {
        if let Some(title) = update.title {
            self.slug = slugify(&title);
            self.title = title;
        }
        if let Some(image) = update.image {
            self.image = Some(image);
        }
        if let Some(icon) = update.icon {
            self.icon = Some(icon);
        }
        if let Some(brands) = update.brands {
            self.brands = brands;
        }
        self.updated_at = Utc::now();
    }
}

/// Discount coupon entity
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Coupon {
    #[serde(rename = "_id", alias = "id")]
    pub id: Uuid,
    /// Unique display name
    pub name: String,
    /// Unique redemption code, always stored uppercase
    pub code: String,
    /// Discount percentage
    pub discount: f64,
    /// When the coupon stops being redeemable
    pub expiry: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateCoupon {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 30))]
    pub code: String,
    #[validate(range(min = 0.0, max = 100.0))]
    pub discount: f64,
    pub expiry: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateCoupon {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 30))]
    pub code: Option<String>,
    #[validate(range(min = 0.0, max = 100.0))]
    pub discount: Option<f64>,
    pub expiry: Option<DateTime<Utc>>,
}

impl Coupon {
    pub fn new(input: CreateCoupon) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: input.name,
            code: input.code.to_uppercase(),
            discount: input.discount,
            expiry: input.expiry,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_update(&mut self, update: UpdateCoupon) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(code) = update.code {
            self.code = code.to_uppercase();
        }
        if let Some(discount) = update.discount {
            self.discount = discount;
        }
        if let Some(expiry) = update.expiry {
            self.expiry = expiry;
        }
        self.updated_at = Utc::now();
    }
}

/// Product review entity
///
/// `rating` is serialized only when present so rated reviews can be counted
/// with an `$exists` predicate.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Review {
    #[serde(rename = "_id", alias = "id")]
    pub id: Uuid,
    /// Product being reviewed
    pub product: Uuid,
    /// Authoring user
    pub author: Uuid,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateReview {
    pub author: Uuid,
    #[validate(length(min = 1, max = 2000))]
    pub body: String,
    #[validate(range(min = 1.0, max = 5.0))]
    pub rating: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateReview {
    #[validate(length(min = 1, max = 2000))]
    pub body: Option<String>,
    #[validate(range(min = 1.0, max = 5.0))]
    pub rating: Option<f64>,
}

impl Review {
    pub fn new(product: Uuid, input: CreateReview) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            product,
            author: input.author,
            body: input.body,
            rating: input.rating,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_update(&mut self, update: UpdateReview) {
        if let Some(body) = update.body {
            self.body = body;
        }
        if let Some(rating) = update.rating {
            self.rating = Some(rating);
        }
        self.updated_at = Utc::now();
    }
}

/// Derive a URL-safe slug: lowercase, alphanumeric runs joined by hyphens
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut last_was_hyphen = true;
    for c in input.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }
    if slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_lowercases_and_hyphenates() {
        assert_eq!(slugify("MacBook Pro 16"), "macbook-pro-16");
        assert_eq!(slugify("  spaced   out  "), "spaced-out");
        assert_eq!(slugify("Déjà Vu"), "déjà-vu");
        assert_eq!(slugify(""), "");
    }

    #[test]
    fn coupon_code_is_uppercased() {
        let coupon = Coupon::new(CreateCoupon {
            name: "Summer Sale".to_string(),
            code: "summer20".to_string(),
            discount: 20.0,
            expiry: Utc::now(),
        });
        assert_eq!(coupon.code, "SUMMER20");
    }

    #[test]
    fn product_title_update_rederives_slug() {
        let mut product = Product::new(CreateProduct {
            title: "Old Title".to_string(),
            brand: "Acme".to_string(),
            description: vec![],
            price: 10.0,
            discount_price: None,
            category: None,
            quantity: 0,
            primary_image: None,
            colors: vec![],
        });
        assert_eq!(product.slug, "old-title");

        product.apply_update(UpdateProduct {
            title: Some("New Title".to_string()),
            ..Default::default()
        });
        assert_eq!(product.slug, "new-title");
        assert_eq!(product.title, "New Title");
    }

    #[test]
    fn review_without_rating_omits_the_field() {
        let review = Review::new(
            Uuid::now_v7(),
            CreateReview {
                author: Uuid::now_v7(),
                body: "decent".to_string(),
                rating: None,
            },
        );
        let json = serde_json::to_value(&review).unwrap();
        assert!(json.get("rating").is_none());
    }

    #[test]
    fn unknown_rating_change_fails_deserialization() {
        assert!(serde_json::from_str::<RatingChange>("\"create\"").is_ok());
        assert!(serde_json::from_str::<RatingChange>("\"destroy\"").is_err());
    }
}
