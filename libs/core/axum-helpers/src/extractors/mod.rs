//! Custom extractors for Axum handlers.
//!
//! Every rejection is an [`AppError`](crate::errors::AppError), so malformed
//! input leaves the API as the standard `ErrorResponse` body.

pub mod id_path;
pub mod optional_json;
pub mod validated_query;

pub use id_path::IdPath;
pub use optional_json::OptionalJson;
pub use validated_query::ValidatedQuery;
