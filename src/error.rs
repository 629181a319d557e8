use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use validator::{ValidationErrors, ValidationErrorsKind};

use crate::{dao::storage::StorageError, state::registry::RegistryError};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed or missing input, one message per problem.
    #[error("invalid input: {}", .0.join("; "))]
    Validation(Vec<String>),
    /// The actor lacks the required relationship to the resource.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// A member status change is not allowed from the current status.
    #[error("{0}")]
    InvalidTransition(String),
    /// The party changed concurrently; the caller should retry.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Unknown party or user.
    #[error("not found: {0}")]
    NotFound(String),
    /// The durable store rejected or failed the operation.
    #[error("persistence failure")]
    Persistence(#[source] StorageError),
    /// The durable store did not answer in time.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Persistence(err)
    }
}

impl From<RegistryError> for ServiceError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(_) => ServiceError::NotFound(err.to_string()),
            RegistryError::Unauthorized(message) => ServiceError::Unauthorized(message),
            RegistryError::InvalidTransition(invalid) => {
                ServiceError::InvalidTransition(invalid.to_string())
            }
            RegistryError::Conflict(_) => ServiceError::Conflict(err.to_string()),
            RegistryError::Persistence(source) => ServiceError::Persistence(source),
            RegistryError::Unavailable(_) | RegistryError::Interrupted => {
                ServiceError::Unavailable(err.to_string())
            }
        }
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::Validation(flatten_validation_errors(&err, None))
    }
}

/// One readable message per field error, nested structs prefixed with their field name.
fn flatten_validation_errors(errors: &ValidationErrors, prefix: Option<&str>) -> Vec<String> {
    let mut messages = Vec::new();
    for (field, kind) in errors.errors() {
        let path = match prefix {
            Some(prefix) => format!("{prefix}.{field}"),
            None => field.to_string(),
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                messages.extend(field_errors.iter().map(|error| match &error.message {
                    Some(message) => format!("{path}: {message}"),
                    None => format!("{path}: {}", error.code),
                }));
            }
            ValidationErrorsKind::Struct(nested) => {
                messages.extend(flatten_validation_errors(nested, Some(&path)));
            }
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    messages.extend(flatten_validation_errors(
                        nested,
                        Some(&format!("{path}[{index}]")),
                    ));
                }
            }
        }
    }
    messages.sort();
    messages
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request")]
    BadRequest(Vec<String>),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Storage did not answer in time.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(messages) => AppError::BadRequest(messages),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidTransition(message) => AppError::Conflict(message),
            ServiceError::Conflict(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Persistence(source) => AppError::Internal(source.to_string()),
            ServiceError::Unavailable(message) => AppError::ServiceUnavailable(message),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::from(err).into()
    }
}

impl From<JsonRejection> for AppError {
    fn from(err: JsonRejection) -> Self {
        AppError::BadRequest(vec![err.body_text()])
    }
}

impl From<QueryRejection> for AppError {
    fn from(err: QueryRejection) -> Self {
        AppError::BadRequest(vec![err.body_text()])
    }
}

impl From<PathRejection> for AppError {
    fn from(err: PathRejection) -> Self {
        AppError::BadRequest(vec![err.body_text()])
    }
}

/// Body of every failed request.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Always `false`.
    pub success: bool,
    /// Human-readable error messages.
    pub errors: Vec<String>,
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn into_messages(self) -> Vec<String> {
        match self {
            AppError::BadRequest(messages) => messages,
            AppError::Unauthorized(message)
            | AppError::NotFound(message)
            | AppError::Conflict(message)
            | AppError::ServiceUnavailable(message)
            | AppError::Internal(message) => vec![message],
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let payload = Json(ErrorBody {
            success: false,
            errors: self.into_messages(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::state::player_status::{PlayerStatus, check_transition};

    #[test]
    fn registry_errors_map_onto_http_statuses() {
        let party_id = Uuid::new_v4();
        let cases = [
            (RegistryError::NotFound(party_id), StatusCode::NOT_FOUND),
            (
                RegistryError::Unauthorized("nope".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (
                check_transition("u2", Some(PlayerStatus::Joined), PlayerStatus::Joined)
                    .unwrap_err()
                    .into(),
                StatusCode::CONFLICT,
            ),
            (RegistryError::Conflict(party_id), StatusCode::CONFLICT),
            (
                RegistryError::Unavailable(std::time::Duration::from_secs(1)),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (err, expected) in cases {
            let app: AppError = ServiceError::from(err).into();
            assert_eq!(app.status(), expected);
        }
    }

    #[test]
    fn transition_errors_keep_their_message() {
        let err: RegistryError =
            check_transition("u2", Some(PlayerStatus::Accepted), PlayerStatus::Accepted)
                .unwrap_err()
                .into();
        let app: AppError = ServiceError::from(err).into();
        assert_eq!(
            app.into_messages(),
            vec!["player u2 has current status: accepted. cannot update to accepted"]
        );
    }
}
