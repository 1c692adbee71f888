//! OpenAPI documentation configuration

use utoipa::OpenApi;

/// Combined OpenAPI documentation for all APIs
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Bazaar API",
        version = "0.1.0",
        description = "MongoDB-based e-commerce REST API: users, auth, catalog, and carts",
        license(name = "MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server")
    ),
    nest(
        (path = "/api/users", api = domain_users::ApiDoc),
        (path = "/api/catalog", api = domain_catalog::ApiDoc)
    ),
    tags(
        (name = "Users", description = "Authentication, profiles, addresses, and carts"),
        (name = "Catalog", description = "Products, categories, coupons, and reviews")
    )
)]
pub struct ApiDoc;
