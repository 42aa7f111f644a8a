pub mod healthcheck;
pub mod movie;

use std::time::Duration;

use axum::{
    error_handling::HandleErrorLayer,
    extract::{DefaultBodyLimit, FromRequestParts, Path},
    routing::{get, post},
    BoxError, Router,
};
use http::{request::Parts, Method};
use tower::{timeout::error::Elapsed, timeout::TimeoutLayer, ServiceBuilder};

use crate::{error::ApiError, json::MAX_BODY_BYTES, state::AppState};

/// Record id taken from the `{id}` path segment.
///
/// Anything that is not a positive 64-bit integer is treated as a missing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordId(pub i64);

impl RecordId {
    pub fn parse(raw: &str) -> Option<Self> {
        raw.parse::<i64>().ok().filter(|id| *id >= 1).map(RecordId)
    }
}

impl<S> FromRequestParts<S> for RecordId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::NotFound)?;
        RecordId::parse(&raw).ok_or(ApiError::NotFound)
    }
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method)
}

pub fn router(state: AppState) -> Router<()> {
    Router::new()
        .route("/v1/healthcheck", get(healthcheck::healthcheck))
        .route("/v1/movies", post(movie::create_movie))
        .route(
            "/v1/movies/{id}",
            get(movie::show_movie)
                .put(movie::replace_movie)
                .patch(movie::patch_movie)
                .delete(movie::delete_movie),
        )
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Limits the time spent on each request, late requests get the 408 error envelope.
pub fn with_request_timeout(router: Router<()>, timeout: Duration) -> Router<()> {
    router.layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(request_timeout_error))
            .layer(TimeoutLayer::new(timeout)),
    )
}

async fn request_timeout_error(err: BoxError) -> ApiError {
    if err.is::<Elapsed>() {
        ApiError::RequestTimeout
    } else {
        ApiError::Internal(anyhow::anyhow!(err))
    }
}
