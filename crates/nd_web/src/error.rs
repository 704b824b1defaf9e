use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use nd_core::{Error, ErrorKind};
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    /// Server-side failure reported with a fixed message
    Internal(&'static str),
    Core(Error),
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        ApiError::Core(error)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) | ApiError::Core(Error::RunNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Core(error) => match error.kind() {
                ErrorKind::Configuration => StatusCode::BAD_REQUEST,
                ErrorKind::Fetch | ErrorKind::InferenceUnavailable | ErrorKind::MalformedResponse | ErrorKind::Delivery => {
                    StatusCode::BAD_GATEWAY
                }
                ErrorKind::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
                ErrorKind::Storage | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::NotFound(what) => json!({ "error": format!("{} not found", what), "kind": "NotFound" }),
            ApiError::Internal(message) => json!({ "error": message, "kind": "InternalError" }),
            ApiError::Core(error) => {
                if status.is_server_error() {
                    tracing::error!(error = %error, "Request failed");
                }
                json!({ "error": error.to_string(), "kind": error.kind().to_string() })
            }
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
