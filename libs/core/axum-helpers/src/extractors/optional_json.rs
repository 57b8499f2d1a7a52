//! JSON body extractor that tolerates an absent body.

use crate::errors::AppError;
use axum::{
    Json,
    body::Bytes,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;

/// Like `Json<T>`, but an empty body or a literal `null` yields `None`.
///
/// Handlers use it where "nothing sent" is a valid request with its own
/// response, e.g. answering 204 instead of rejecting with 400/415.
#[derive(Debug)]
pub struct OptionalJson<T>(pub Option<T>);

impl<T, S> FromRequest<S> for OptionalJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(OptionalJson(None));
        }

        let Json(value) = Json::<Option<T>>::from_bytes(&bytes)?;
        Ok(OptionalJson(value))
    }
}
