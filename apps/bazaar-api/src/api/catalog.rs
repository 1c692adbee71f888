//! Catalog API routes

use axum::Router;
use domain_catalog::{handlers, mongodb::MongoCatalogRepository, service::CatalogService};

use crate::state::AppState;

/// Create catalog router
pub fn router(state: &AppState) -> Router {
    let repository = MongoCatalogRepository::new(state.db.clone());
    let service = CatalogService::new(repository);

    handlers::router(service)
}
