use axum::response::{IntoResponse, Response};
use greenlight_types::FieldErrors;
use http::{HeaderMap, Method, StatusCode};
use tracing::error;

use crate::json::{write_json, Envelope};

pub type ApiResult<T> = std::result::Result<T, ApiError>;

const SERVER_ERROR_MESSAGE: &str =
    "the server encountered a problem and could not process your request";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("the requested resource could not be found")]
    NotFound,
    #[error("the {0} method is not supported for this resource")]
    MethodNotAllowed(Method),
    #[error("unable to update the record due to an edit conflict, please try again")]
    EditConflict,
    #[error("the request could not be completed in time, please try again")]
    RequestTimeout,
    #[error("failed validation")]
    FailedValidation(FieldErrors),
    #[error("the server encountered a problem and could not process your request")]
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::EditConflict => StatusCode::CONFLICT,
            ApiError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::FailedValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<greenlight_dal::Error> for ApiError {
    fn from(value: greenlight_dal::Error) -> Self {
        match value {
            greenlight_dal::Error::RecordNotFound(_) => ApiError::NotFound,
            greenlight_dal::Error::EditConflict { .. } => ApiError::EditConflict,
            other => ApiError::Internal(other.into()),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::Internal(value.into())
    }
}

impl From<http::header::InvalidHeaderValue> for ApiError {
    fn from(value: http::header::InvalidHeaderValue) -> Self {
        ApiError::Internal(value.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let envelope = match self {
            ApiError::FailedValidation(errors) => Envelope::new().with("message", errors),
            ApiError::Internal(e) => {
                error!("Internal error: {e:#}");
                Envelope::new().with("message", SERVER_ERROR_MESSAGE)
            }
            other => Envelope::new().with("message", other.to_string()),
        };

        match envelope.and_then(|envelope| write_json(status, &envelope, HeaderMap::new())) {
            Ok(response) => response,
            Err(e) => {
                error!("Cannot write error response: {e}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_error_envelopes() {
        let response = ApiError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            body_of(response).await,
            serde_json::json!({"message": "the requested resource could not be found"})
        );

        let response = ApiError::MethodNotAllowed(Method::PATCH).into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            body_of(response).await["message"],
            "the PATCH method is not supported for this resource"
        );

        let mut errors = FieldErrors::new();
        errors.insert("title".into(), "must be provided".into());
        let response = ApiError::FailedValidation(errors).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body_of(response).await,
            serde_json::json!({"message": {"title": "must be provided"}})
        );
    }

    #[tokio::test]
    async fn test_internal_error_is_not_leaked() {
        let err: ApiError = greenlight_dal::Error::DatabaseError(sqlx_like_error()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_of(response).await["message"], SERVER_ERROR_MESSAGE);
    }

    fn sqlx_like_error() -> greenlight_dal::SqlxError {
        greenlight_dal::SqlxError::Protocol("connection reset by test".to_string())
    }

    #[test]
    fn test_dal_error_mapping() {
        let err: ApiError = greenlight_dal::Error::RecordNotFound("Movie".into()).into();
        assert!(matches!(err, ApiError::NotFound));
        let err: ApiError = greenlight_dal::Error::EditConflict { id: 1, version: 3 }.into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }
}
