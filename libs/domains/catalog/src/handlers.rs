use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use axum_helpers::{
    UuidPath, ValidatedJson,
    errors::responses::{
        BadRequestUuidResponse, BadRequestValidationResponse, ConflictResponse,
        InternalServerErrorResponse, NotFoundResponse,
    },
};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::error::CatalogResult;
use crate::models::{
    Coupon, CreateCategory, CreateCoupon, CreateProduct, CreateReview, Product, ProductCategory,
    ProductFilter, Review, UpdateCategory, UpdateCoupon, UpdateProduct, UpdateReview,
};
use crate::repository::CatalogRepository;
use crate::service::CatalogService;

/// OpenAPI documentation for the catalog API
#[derive(OpenApi)]
#[openapi(
    paths(
        list_products,
        create_product,
        get_product,
        update_product,
        delete_product,
        list_reviews,
        create_review,
        update_review,
        delete_review,
        list_categories,
        create_category,
        get_category,
        update_category,
        delete_category,
        list_coupons,
        create_coupon,
        get_coupon,
        update_coupon,
        delete_coupon,
    ),
    components(
        schemas(
            Product,
            CreateProduct,
            UpdateProduct,
            ProductFilter,
            ProductCategory,
            CreateCategory,
            UpdateCategory,
            Coupon,
            CreateCoupon,
            UpdateCoupon,
            Review,
            CreateReview,
            UpdateReview
        ),
        responses(
            NotFoundResponse,
            BadRequestValidationResponse,
            BadRequestUuidResponse,
            ConflictResponse,
            InternalServerErrorResponse
        )
    ),
    tags(
        (name = "Catalog", description = "Products, categories, coupons, and reviews")
    )
)]
pub struct ApiDoc;

/// Create the catalog router with all HTTP endpoints
pub fn router<R: CatalogRepository + 'static>(service: CatalogService<R>) -> Router {
    let shared_service = Arc::new(service);

    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route(
            "/products/{id}/reviews",
            get(list_reviews).post(create_review),
        )
        .route("/reviews/{id}", put(update_review).delete(delete_review))
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/{id}",
            get(get_category).put(update_category).delete(delete_category),
        )
        .route("/coupons", get(list_coupons).post(create_coupon))
        .route(
            "/coupons/{id}",
            get(get_coupon).put(update_coupon).delete(delete_coupon),
        )
        .with_state(shared_service)
}

/// List products with optional filters
#[utoipa::path(
    get,
    path = "/products",
    tag = "Catalog",
    params(ProductFilter),
    responses(
        (status = 200, description = "List of products", body = Vec<Product>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_products<R: CatalogRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    Query(filter): Query<ProductFilter>,
) -> CatalogResult<Json<Vec<Product>>> {
    let products = service.list_products(filter).await?;
    Ok(Json(products))
}

/// Create a new product
#[utoipa::path(
    post,
    path = "/products",
    tag = "Catalog",
    request_body = CreateProduct,
    responses(
        (status = 201, description = "Product created", body = Product),
        (status = 400, response = BadRequestValidationResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_product<R: CatalogRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    ValidatedJson(input): ValidatedJson<CreateProduct>,
) -> CatalogResult<impl IntoResponse> {
    let product = service.create_product(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// Get a product by ID
#[utoipa::path(
    get,
    path = "/products/{id}",
    tag = "Catalog",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Product found", body = Product),
        (status = 400, response = BadRequestUuidResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_product<R: CatalogRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    UuidPath(id): UuidPath,
) -> CatalogResult<Json<Product>> {
    let product = service.get_product(id).await?;
    Ok(Json(product))
}

/// Update a product
#[utoipa::path(
    put,
    path = "/products/{id}",
    tag = "Catalog",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body = UpdateProduct,
    responses(
        (status = 200, description = "Product updated", body = Product),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_product<R: CatalogRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    UuidPath(id): UuidPath,
    ValidatedJson(input): ValidatedJson<UpdateProduct>,
) -> CatalogResult<Json<Product>> {
    let product = service.update_product(id, input).await?;
    Ok(Json(product))
}

/// Delete a product
#[utoipa::path(
    delete,
    path = "/products/{id}",
    tag = "Catalog",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 204, description = "Product deleted"),
        (status = 400, response = BadRequestUuidResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_product<R: CatalogRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    UuidPath(id): UuidPath,
) -> CatalogResult<impl IntoResponse> {
    service.delete_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List reviews for a product
#[utoipa::path(
    get,
    path = "/products/{id}/reviews",
    tag = "Catalog",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Reviews for the product", body = Vec<Review>),
        (status = 400, response = BadRequestUuidResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_reviews<R: CatalogRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    UuidPath(id): UuidPath,
) -> CatalogResult<Json<Vec<Review>>> {
    let reviews = service.list_reviews(id).await?;
    Ok(Json(reviews))
}

/// Create a review for a product
///
/// A rated review triggers recomputation of the product's average rating.
#[utoipa::path(
    post,
    path = "/products/{id}/reviews",
    tag = "Catalog",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body = CreateReview,
    responses(
        (status = 201, description = "Review created", body = Review),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_review<R: CatalogRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    UuidPath(id): UuidPath,
    ValidatedJson(input): ValidatedJson<CreateReview>,
) -> CatalogResult<impl IntoResponse> {
    let review = service.create_review(id, input).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// Update a review
#[utoipa::path(
    put,
    path = "/reviews/{id}",
    tag = "Catalog",
    params(
        ("id" = Uuid, Path, description = "Review ID")
    ),
    request_body = UpdateReview,
    responses(
        (status = 200, description = "Review updated", body = Review),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_review<R: CatalogRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    UuidPath(id): UuidPath,
    ValidatedJson(input): ValidatedJson<UpdateReview>,
) -> CatalogResult<Json<Review>> {
    let review = service.update_review(id, input).await?;
    Ok(Json(review))
}

/// Delete a review
#[utoipa::path(
    delete,
    path = "/reviews/{id}",
    tag = "Catalog",
    params(
        ("id" = Uuid, Path, description = "Review ID")
    ),
    responses(
        (status = 204, description = "Review deleted"),
        (status = 400, response = BadRequestUuidResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_review<R: CatalogRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    UuidPath(id): UuidPath,
) -> CatalogResult<impl IntoResponse> {
    service.delete_review(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List all categories
#[utoipa::path(
    get,
    path = "/categories",
    tag = "Catalog",
    responses(
        (status = 200, description = "List of categories", body = Vec<ProductCategory>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_categories<R: CatalogRepository>(
    State(service): State<Arc<CatalogService<R>>>,
) -> CatalogResult<Json<Vec<ProductCategory>>> {
    let categories = service.list_categories().await?;
    Ok(Json(categories))
}

/// Create a new category
#[utoipa::path(
    post,
    path = "/categories",
    tag = "Catalog",
    request_body = CreateCategory,
    responses(
        (status = 201, description = "Category created", body = ProductCategory),
        (status = 400, response = BadRequestValidationResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_category<R: CatalogRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    ValidatedJson(input): ValidatedJson<CreateCategory>,
) -> CatalogResult<impl IntoResponse> {
    let category = service.create_category(input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// Get a category by ID
#[utoipa::path(
    get,
    path = "/categories/{id}",
    tag = "Catalog",
    params(
        ("id" = Uuid, Path, description = "Category ID")
    ),
    responses(
        (status = 200, description = "Category found", body = ProductCategory),
        (status = 400, response = BadRequestUuidResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_category<R: CatalogRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    UuidPath(id): UuidPath,
) -> CatalogResult<Json<ProductCategory>> {
    let category = service.get_category(id).await?;
    Ok(Json(category))
}

/// Update a category
#[utoipa::path(
    put,
    path = "/categories/{id}",
    tag = "Catalog",
    params(
        ("id" = Uuid, Path, description = "Category ID")
    ),
    request_body = UpdateCategory,
    responses(
        (status = 200, description = "Category updated", body = ProductCategory),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_category<R: CatalogRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    UuidPath(id): UuidPath,
    ValidatedJson(input): ValidatedJson<UpdateCategory>,
) -> CatalogResult<Json<ProductCategory>> {
    let category = service.update_category(id, input).await?;
    Ok(Json(category))
}

/// Delete a category
#[utoipa::path(
    delete,
    path = "/categories/{id}",
    tag = "Catalog",
    params(
        ("id" = Uuid, Path, description = "Category ID")
    ),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 400, response = BadRequestUuidResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_category<R: CatalogRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    UuidPath(id): UuidPath,
) -> CatalogResult<impl IntoResponse> {
    service.delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List all coupons
#[utoipa::path(
    get,
    path = "/coupons",
    tag = "Catalog",
    responses(
        (status = 200, description = "List of coupons", body = Vec<Coupon>),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_coupons<R: CatalogRepository>(
    State(service): State<Arc<CatalogService<R>>>,
) -> CatalogResult<Json<Vec<Coupon>>> {
    let coupons = service.list_coupons().await?;
    Ok(Json(coupons))
}

/// Create a new coupon
#[utoipa::path(
    post,
    path = "/coupons",
    tag = "Catalog",
    request_body = CreateCoupon,
    responses(
        (status = 201, description = "Coupon created", body = Coupon),
        (status = 400, response = BadRequestValidationResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn create_coupon<R: CatalogRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    ValidatedJson(input): ValidatedJson<CreateCoupon>,
) -> CatalogResult<impl IntoResponse> {
    let coupon = service.create_coupon(input).await?;
    Ok((StatusCode::CREATED, Json(coupon)))
}

/// Get a coupon by ID
#[utoipa::path(
    get,
    path = "/coupons/{id}",
    tag = "Catalog",
    params(
        ("id" = Uuid, Path, description = "Coupon ID")
    ),
    responses(
        (status = 200, description = "Coupon found", body = Coupon),
        (status = 400, response = BadRequestUuidResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_coupon<R: CatalogRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    UuidPath(id): UuidPath,
) -> CatalogResult<Json<Coupon>> {
    let coupon = service.get_coupon(id).await?;
    Ok(Json(coupon))
}

/// Update a coupon
#[utoipa::path(
    put,
    path = "/coupons/{id}",
    tag = "Catalog",
    params(
        ("id" = Uuid, Path, description = "Coupon ID")
    ),
    request_body = UpdateCoupon,
    responses(
        (status = 200, description = "Coupon updated", body = Coupon),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_coupon<R: CatalogRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    UuidPath(id): UuidPath,
    ValidatedJson(input): ValidatedJson<UpdateCoupon>,
) -> CatalogResult<Json<Coupon>> {
    let coupon = service.update_coupon(id, input).await?;
    Ok(Json(coupon))
}

/// Delete a coupon
#[utoipa::path(
    delete,
    path = "/coupons/{id}",
    tag = "Catalog",
    params(
        ("id" = Uuid, Path, description = "Coupon ID")
    ),
    responses(
        (status = 204, description = "Coupon deleted"),
        (status = 400, response = BadRequestUuidResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_coupon<R: CatalogRepository>(
    State(service): State<Arc<CatalogService<R>>>,
    UuidPath(id): UuidPath,
) -> CatalogResult<impl IntoResponse> {
    service.delete_coupon(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockCatalogRepository;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::Utc;
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;
    use uuid::Uuid;

    fn app(repo: MockCatalogRepository) -> Router {
        router(CatalogService::new(repo))
    }

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

    fn post_review(product_id: Uuid, payload: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(format!("/products/{product_id}/reviews"))
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap()
    }

    async fn json_body<T: serde::de::DeserializeOwned>(body: Body) -> T {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn rated_review_post_recomputes_the_product_average() {
        let product_id = Uuid::now_v7();
        let author = Uuid::now_v7();
        let mut repo = MockCatalogRepository::new();
        // First fetch guards review creation, second feeds the recompute
        repo.expect_get_product()
            .times(2)
            .returning(|id| Ok(Some(product_with_rating(id, 0.0))));
        repo.expect_create_review()
            .times(1)
            .returning(move |product, input| {
                let now = Utc::now();
                Ok(Review {
                    id: Uuid::now_v7(),
                    product,
                    author: input.author,
                    body: input.body,
                    rating: input.rating,
                    created_at: now,
                    updated_at: now,
                })
            });
        repo.expect_count_rated_reviews().returning(|_| Ok(1));
        // Average over the count plus the incoming rating: (1 * 0 + 5) / 2
        repo.expect_set_total_rating()
            .withf(|_, rating| (*rating - 2.5).abs() < 1e-9)
            .times(1)
            .returning(|_, _| Ok(()));

        let request = post_review(
            product_id,
            json!({ "author": author, "body": "Sturdy and well made.", "rating": 5.0 }),
        );
        let response = app(repo).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        let review: Review = json_body(response.into_body()).await;
        assert_eq!(review.product, product_id);
        assert_eq!(review.rating, Some(5.0));
    }

    #[tokio::test]
    async fn out_of_range_rating_is_rejected_before_persistence() {
        let mut repo = MockCatalogRepository::new();
        repo.expect_create_review().times(0);
        repo.expect_set_total_rating().times(0);

        let request = post_review(
            Uuid::now_v7(),
            json!({ "author": Uuid::now_v7(), "body": "Too good.", "rating": 6.0 }),
        );
        let response = app(repo).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn review_payload_missing_the_body_is_a_client_error() {
        let mut repo = MockCatalogRepository::new();
        repo.expect_get_product().times(0);
        repo.expect_create_review().times(0);

        let request = post_review(Uuid::now_v7(), json!({ "author": Uuid::now_v7() }));
        let response = app(repo).oneshot(request).await.unwrap();

        assert!(response.status().is_client_error());
    }
}
