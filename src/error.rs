//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use crate::case::to_camel_case;
use crate::crypto::CryptoError;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// PostgreSQL SQLSTATE codes surfaced as constraint errors.
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const CHECK_VIOLATION: &str = "23514";
const NOT_NULL_VIOLATION: &str = "23502";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

/// Errors returned by the data-access layer.
#[derive(Error, Debug)]
pub enum DaoError {
    #[error("model: {entity} not found")]
    NotFound { entity: &'static str },
    #[error("model: {entity} not singular")]
    NotSingular { entity: &'static str },
    #[error("model: {edge} edge was not loaded")]
    NotLoaded { edge: &'static str },
    #[error("model: validator failed for field \"{field}\": {message}")]
    Validation { field: String, message: String },
    #[error("model: constraint failed: {message}")]
    Constraint {
        message: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("model: transaction has already been committed or rolled back")]
    TxFinished,
    #[error("model: cannot start a transaction within a transaction")]
    NestedTx,
    #[error("model: {source}; rollback also failed: {rollback}")]
    Rollback {
        source: Box<DaoError>,
        rollback: Box<DaoError>,
    },
    #[error("model: {0}")]
    Crypto(#[from] CryptoError),
    #[error("database: {0}")]
    Db(sqlx::Error),
}

impl DaoError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        DaoError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DaoError::NotFound { .. })
    }

    pub fn is_not_singular(&self) -> bool {
        matches!(self, DaoError::NotSingular { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, DaoError::Validation { .. })
    }

    pub fn is_constraint(&self) -> bool {
        matches!(self, DaoError::Constraint { .. })
    }
}

impl From<sqlx::Error> for DaoError {
    fn from(err: sqlx::Error) -> Self {
        let code = err
            .as_database_error()
            .and_then(|d| d.code())
            .map(|c| c.into_owned());
        match code.as_deref() {
            Some(
                UNIQUE_VIOLATION | FOREIGN_KEY_VIOLATION | CHECK_VIOLATION | NOT_NULL_VIOLATION,
            ) => {
                let message = err
                    .as_database_error()
                    .map(|d| d.message().to_string())
                    .unwrap_or_default();
                DaoError::Constraint { message, source: err }
            }
            _ => DaoError::Db(err),
        }
    }
}

/// Turns a not-found error into `Ok(None)`.
pub fn mask_not_found<T>(res: Result<T, DaoError>) -> Result<Option<T>, DaoError> {
    match res {
        Ok(v) => Ok(Some(v)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Dao(#[from] DaoError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("method not allowed: {0}")]
    NotAllowed(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Dao(err.into())
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::NotAllowed(_) => (StatusCode::METHOD_NOT_ALLOWED, "not_allowed"),
            AppError::Dao(e) => match e {
                DaoError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
                DaoError::NotSingular { .. } => (StatusCode::CONFLICT, "not_singular"),
                DaoError::Validation { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "validation_error")
                }
                DaoError::Constraint { .. } => (StatusCode::CONFLICT, "conflict"),
                DaoError::Db(sqlx::Error::RowNotFound) => (StatusCode::NOT_FOUND, "not_found"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let details = match &self {
            AppError::Dao(DaoError::Validation { field, .. }) => {
                Some(json!({ "field": to_camel_case(field) }))
            }
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dao_errors_map_to_http_status() {
        let cases = [
            (AppError::Dao(DaoError::NotFound { entity: "project" }), StatusCode::NOT_FOUND),
            (AppError::Dao(DaoError::NotSingular { entity: "project" }), StatusCode::CONFLICT),
            (
                AppError::Dao(DaoError::validation("name", "blank")),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (AppError::Dao(DaoError::TxFinished), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
        ];
        for (err, want) in cases {
            assert_eq!(err.status_and_code().0, want, "{err}");
        }
    }

    #[test]
    fn mask_not_found_hides_only_not_found() {
        let missing: Result<u8, DaoError> = Err(DaoError::NotFound { entity: "role" });
        assert!(mask_not_found(missing).unwrap().is_none());

        let other: Result<u8, DaoError> = Err(DaoError::NotSingular { entity: "role" });
        assert!(mask_not_found(other).unwrap_err().is_not_singular());

        assert_eq!(mask_not_found(Ok::<_, DaoError>(3)).unwrap(), Some(3));
    }

    #[test]
    fn row_not_found_from_driver_is_not_a_constraint() {
        let err: DaoError = sqlx::Error::RowNotFound.into();
        assert!(!err.is_constraint());
        assert!(matches!(err, DaoError::Db(sqlx::Error::RowNotFound)));
    }

    #[tokio::test]
    async fn validation_errors_report_the_api_field() {
        let resp = AppError::Dao(DaoError::validation("config_version", "must not be empty"))
            .into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "validation_error");
        assert_eq!(body["error"]["details"]["field"], "configVersion");
    }

    #[test]
    fn validation_message_names_the_field() {
        let err = DaoError::validation("name", "must not be empty");
        assert_eq!(
            err.to_string(),
            "model: validator failed for field \"name\": must not be empty"
        );
    }
}
