use crate::error::Error;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Wraps [`Error`] with the HTTP status and the closed set of wire tags the
/// API promises in its `{"error": "<tag>"}` bodies.
pub(crate) struct ApiError(Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let (status, tag) = match &err {
            Error::MalformedJson | Error::JsonExtractorRejection(_) => {
                (StatusCode::BAD_REQUEST, "malformed_json_payload".to_string())
            }
            Error::InvalidAllowFrom
            | Error::BadSubdomain
            | Error::BadTxt
            | Error::BadA
            | Error::BadAaaa => (StatusCode::BAD_REQUEST, err.to_string()),
            Error::Unauthorized => (StatusCode::UNAUTHORIZED, err.to_string()),
            Error::Forbidden => (StatusCode::FORBIDDEN, err.to_string()),
            Error::Db(_) => (StatusCode::INTERNAL_SERVER_ERROR, "db_error".to_string()),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        };
        let body = Json(json!({ "error": tag }));
        (status, body).into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
