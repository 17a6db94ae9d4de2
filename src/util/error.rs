use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

/// A single field-level validation failure, usable both by the funnel wizard
/// and the intake endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        FieldError {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug)]
pub enum HandlerErrorKind {
    BadRequest,
    PayloadTooLarge,
    NotFound,
    Internal,
    BadGateway,
}

/// Error returned to HTTP clients. Serializes as `{ok: false, message}` with
/// an optional `debug` payload; internals never leak beyond `message`.
#[derive(Debug)]
pub struct HandlerError {
    pub kind: HandlerErrorKind,
    pub message: String,
    pub debug: Option<serde_json::Value>,
}

impl HandlerError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        HandlerError {
            kind: HandlerErrorKind::BadRequest,
            message: message.into(),
            debug: None,
        }
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        HandlerError {
            kind: HandlerErrorKind::PayloadTooLarge,
            message: message.into(),
            debug: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        HandlerError {
            kind: HandlerErrorKind::NotFound,
            message: message.into(),
            debug: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        HandlerError {
            kind: HandlerErrorKind::Internal,
            message: message.into(),
            debug: None,
        }
    }

    pub fn bad_gateway(message: impl Into<String>, debug: Option<serde_json::Value>) -> Self {
        HandlerError {
            kind: HandlerErrorKind::BadGateway,
            message: message.into(),
            debug,
        }
    }
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for HandlerError {}

impl IntoResponse for HandlerError {
    fn into_response(self) -> Response {
        let status = match self.kind {
            HandlerErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            HandlerErrorKind::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            HandlerErrorKind::NotFound => StatusCode::NOT_FOUND,
            HandlerErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            HandlerErrorKind::BadGateway => StatusCode::BAD_GATEWAY,
        };
        let mut body = json!({ "ok": false, "message": self.message });
        if let Some(debug) = self.debug {
            body["debug"] = debug;
        }
        (status, Json(body)).into_response()
    }
}

/// Errors surfaced by the intake/admin services.
#[derive(Debug, Clone)]
pub enum ServiceError {
    /// User-correctable input failure; no data was persisted.
    Validation(Vec<FieldError>),
    /// Aggregate photo payload over budget; rejected before persistence.
    PayloadTooLarge(String),
    NotFound(String),
    /// Persistence insert failed, or another fatal internal error.
    InternalError(String),
    /// The owner-notification email could not be sent. The quote row already
    /// exists; the request still fails because an unnotified lead is a lost
    /// lead.
    OwnerEmailFailed(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::Validation(errors) => {
                let msg = errors
                    .first()
                    .map(|e| e.message.as_str())
                    .unwrap_or("Invalid input");
                write!(f, "Validation: {}", msg)
            }
            ServiceError::PayloadTooLarge(msg) => write!(f, "Payload Too Large: {}", msg),
            ServiceError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ServiceError::InternalError(msg) => write!(f, "Internal Error: {}", msg),
            ServiceError::OwnerEmailFailed(msg) => write!(f, "Owner Email Failed: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<crate::repository::repository_error::RepositoryError> for ServiceError {
    fn from(err: crate::repository::repository_error::RepositoryError) -> Self {
        use crate::repository::repository_error::RepositoryError;
        match err {
            RepositoryError::NotFound(msg) => ServiceError::NotFound(msg),
            RepositoryError::ValidationError(msg) => {
                ServiceError::Validation(vec![FieldError::new("", msg)])
            }
            RepositoryError::DatabaseError(msg)
            | RepositoryError::ConnectionError(msg)
            | RepositoryError::SerializationError(msg) => ServiceError::InternalError(msg),
            RepositoryError::Generic(e) => ServiceError::InternalError(e.to_string()),
        }
    }
}

impl From<ServiceError> for HandlerError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(errors) => {
                let message = errors
                    .first()
                    .map(|e| e.message.clone())
                    .unwrap_or_else(|| "Requête invalide".to_string());
                HandlerError::bad_request(message)
            }
            ServiceError::PayloadTooLarge(msg) => HandlerError::payload_too_large(msg),
            ServiceError::NotFound(msg) => HandlerError::not_found(msg),
            ServiceError::InternalError(_) => HandlerError::internal(
                "Une erreur est survenue, réessayez ou appelez-nous.",
            ),
            ServiceError::OwnerEmailFailed(detail) => HandlerError::bad_gateway(
                "Votre demande n'a pas pu être transmise, réessayez ou appelez-nous.",
                Some(json!({ "reason": detail })),
            ),
        }
    }
}
