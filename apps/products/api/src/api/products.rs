//! Products API routes

use axum::Router;
use domain_products::{PgProductRepository, ProductService, handlers};

use crate::state::{AppState, Backend};

/// Create products router over the configured backend
pub fn router(state: &AppState) -> Router {
    match &state.backend {
        Backend::Postgres(db) => {
            let repository = PgProductRepository::new(db.clone());
            handlers::router(ProductService::new(repository))
        }
        Backend::Memory(repository) => handlers::router(ProductService::new(repository.clone())),
    }
}
