//! Mapping from core and auth errors to HTTP responses.
//!
//! Response bodies carry a fixed, user-safe message. The underlying error, which may mention
//! internal identifiers or storage details, is only logged.

use api_shared::{AuthError, ErrorRes};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use hms_core::RecordError;

#[derive(Debug)]
pub enum ApiError {
    Auth(AuthError),
    Record(RecordError),
    BadRequest(&'static str),
    Internal(String),
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        Self::Auth(e)
    }
}

impl From<RecordError> for ApiError {
    fn from(e: RecordError) -> Self {
        Self::Record(e)
    }
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Auth(AuthError::Forbidden(capability)) => (
                StatusCode::FORBIDDEN,
                format!("Requires the {capability} capability"),
            ),
            Self::Auth(_) => (StatusCode::UNAUTHORIZED, "Unauthorized".into()),
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, (*message).into()),
            Self::Record(e) => match e {
                RecordError::Validation(message) => (StatusCode::BAD_REQUEST, message.clone()),
                RecordError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "Invalid input".into()),
                RecordError::NotFound(_) => {
                    (StatusCode::NOT_FOUND, "Medical record not found".into())
                }
                RecordError::NotAssignedDoctor => (
                    StatusCode::FORBIDDEN,
                    "Only the assigned doctor may amend these notes".into(),
                ),
                RecordError::Conflict(_) => (
                    StatusCode::CONFLICT,
                    "The record was changed concurrently; please retry".into(),
                ),
                RecordError::StorageUnavailable(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Clinical notes storage is unavailable".into(),
                ),
                RecordError::Database(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
                }
            },
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            tracing::error!("request failed with {}: {:?}", status, self);
        } else {
            tracing::warn!("request rejected with {}: {:?}", status, self);
        }
        (status, Json(ErrorRes::new(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(e: ApiError) -> StatusCode {
        e.status_and_message().0
    }

    #[test]
    fn maps_error_taxonomy_to_statuses() {
        assert_eq!(
            status(RecordError::Validation("notes".into()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(AuthError::MissingIdentity.into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(AuthError::Forbidden("doctor").into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(status(RecordError::NotFound(1).into()), StatusCode::NOT_FOUND);
        assert_eq!(
            status(RecordError::NotAssignedDoctor.into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status(RecordError::Conflict("busy".into()).into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(RecordError::StorageUnavailable("gone".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn server_errors_do_not_leak_details() {
        let (_, message) =
            ApiError::from(RecordError::StorageUnavailable("/var/lib/hms.db".into()))
                .status_and_message();
        assert!(!message.contains("/var/lib"));

        let (_, message) = ApiError::from(RecordError::NotFound(42)).status_and_message();
        assert!(!message.contains("42"));
    }
}
