use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use sea_orm::DbErr;
use thiserror::Error;
use validator::ValidationErrors;

#[derive(Debug, Error)]
pub enum ProductError {
    #[error("Product with id {0} already exists")]
    DuplicateId(i32),

    /// Another transaction changed the same product between staging and commit
    #[error("Product {0} was modified by a concurrent transaction")]
    Conflict(i32),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type ProductResult<T> = Result<T, ProductError>;

/// Convert ProductError to AppError for standardized error responses
impl From<ProductError> for AppError {
    fn from(err: ProductError) -> Self {
        match err {
            ProductError::DuplicateId(id) => {
                AppError::Conflict(format!("Product with id {} already exists", id))
            }
            ProductError::Conflict(id) => AppError::Conflict(format!(
                "Product {} was modified concurrently, retry the request",
                id
            )),
            ProductError::Validation(errors) => AppError::ValidationError(errors),
            ProductError::Database(e) => AppError::Database(e),
            ProductError::Transaction(msg) => AppError::Transaction(msg),
            ProductError::Internal(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for ProductError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}
