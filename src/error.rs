use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Postgres SQLSTATE for a unique-constraint violation.
const UNIQUE_VIOLATION: &str = "23505";
/// Postgres SQLSTATE for a foreign-key violation.
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{field} is already taken")]
    Duplicate { field: &'static str },

    /// Opaque by design: never reveals whether the email exists.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthenticated(&'static str),

    #[error("you are not allowed to modify this resource")]
    Forbidden,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("cannot follow yourself")]
    SelfFollow,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Duplicate { .. } => StatusCode::CONFLICT,
            ApiError::InvalidCredentials | ApiError::Unauthenticated(_) => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::SelfFollow => StatusCode::BAD_REQUEST,
            ApiError::Database(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Database(e) => {
                tracing::error!(error = %e, "database error");
                "internal server error".to_string()
            }
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Maps a unique-index violation onto the field that collided, so a lost
/// insert race surfaces the same `Duplicate` error the pre-insert check
/// would have reported. Any other error passes through untouched.
pub fn map_unique_violation(
    e: sqlx::Error,
    constraints: &[(&str, &'static str)],
) -> ApiError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            if let Some(name) = db.constraint() {
                for (constraint, field) in constraints {
                    if *constraint == name {
                        return ApiError::Duplicate { field };
                    }
                }
            }
        }
    }
    ApiError::Database(e)
}

/// Maps a foreign-key violation onto `NotFound` for the referenced entity:
/// a row deleted between the existence check and the insert surfaces the
/// same way the check itself would have. Any other error passes through
/// untouched.
pub fn map_fk_violation(e: sqlx::Error, entity: &'static str) -> ApiError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) {
            return ApiError::NotFound(entity);
        }
    }
    ApiError::Database(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_status(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn duplicate_returns_409() {
        assert_eq!(
            response_status(ApiError::Duplicate { field: "email" }),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn invalid_credentials_returns_401() {
        assert_eq!(
            response_status(ApiError::InvalidCredentials),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn unauthenticated_returns_401() {
        assert_eq!(
            response_status(ApiError::Unauthenticated("authentication required")),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn forbidden_returns_403() {
        assert_eq!(response_status(ApiError::Forbidden), StatusCode::FORBIDDEN);
    }

    #[test]
    fn not_found_returns_404() {
        assert_eq!(
            response_status(ApiError::NotFound("post")),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn validation_returns_422() {
        assert_eq!(
            response_status(ApiError::Validation("bad input".into())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn self_follow_returns_400() {
        assert_eq!(response_status(ApiError::SelfFollow), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn database_errors_are_opaque_500s() {
        assert_eq!(
            response_status(ApiError::Database(sqlx::Error::RowNotFound)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn duplicate_message_names_the_field() {
        let err = ApiError::Duplicate { field: "username" };
        assert_eq!(err.to_string(), "username is already taken");
    }

    #[test]
    fn non_unique_violations_pass_through() {
        let mapped = map_unique_violation(
            sqlx::Error::RowNotFound,
            &[("users_email_key", "email")],
        );
        assert!(matches!(mapped, ApiError::Database(_)));
    }

    #[test]
    fn non_fk_violations_pass_through() {
        let mapped = map_fk_violation(sqlx::Error::RowNotFound, "post");
        assert!(matches!(mapped, ApiError::Database(_)));
    }
}
