//! HTTP-surface error kinds
//!
//! Every pipeline step returns `Result<_, HttpError>`; the axum layer turns
//! the error into the mapped status code. Internal failures are logged with
//! their cause and surface with a redacted message.

use crate::constraint::ConstraintViolation;
use crate::services::ServiceError;
use crate::vocab::ldp;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

/// Request-processing errors and the non-2xx outcomes that flow like them.
#[derive(Error, Debug)]
pub enum HttpError {
    /// 404: missing resource, or ACL requested where none exists
    #[error("Not Found")]
    NotFound,

    /// 410: the resource was deleted
    #[error("Gone")]
    Gone,

    /// 405 with the methods that are allowed
    #[error("Method Not Allowed")]
    MethodNotAllowed(Vec<&'static str>),

    /// 400 with a plain-text reason
    #[error("Bad Request: {0}")]
    BadRequest(String),

    /// 406: no acceptable media type
    #[error("Not Acceptable")]
    NotAcceptable,

    /// 415: unsupported entity media type
    #[error("Unsupported Media Type")]
    UnsupportedMediaType,

    /// 409 with a plain-text reason
    #[error("Conflict: {0}")]
    Conflict(String),

    /// 409 carrying constrainedBy links
    #[error("Conflict: constraint violation")]
    ConstraintViolation(Vec<ConstraintViolation>),

    /// 412
    #[error("Precondition Failed")]
    PreconditionFailed,

    /// 304, optionally carrying the current ETag
    #[error("Not Modified")]
    NotModified(Option<String>),

    /// 428 in strict precondition mode
    #[error("Precondition Required")]
    PreconditionRequired,

    /// 500; the message is logged, not surfaced
    #[error("Internal Server Error")]
    Internal(String),
}

impl From<ServiceError> for HttpError {
    fn from(e: ServiceError) -> Self {
        HttpError::Internal(e.to_string())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        match self {
            HttpError::NotFound => (StatusCode::NOT_FOUND, "Not Found").into_response(),
            HttpError::Gone => (StatusCode::GONE, "Gone").into_response(),
            HttpError::MethodNotAllowed(allow) => (
                StatusCode::METHOD_NOT_ALLOWED,
                [(header::ALLOW, allow.join(","))],
                "Method Not Allowed",
            )
                .into_response(),
            HttpError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, reason).into_response()
            }
            HttpError::NotAcceptable => {
                (StatusCode::NOT_ACCEPTABLE, "Not Acceptable").into_response()
            }
            HttpError::UnsupportedMediaType => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Unsupported Media Type").into_response()
            }
            HttpError::Conflict(reason) => (StatusCode::CONFLICT, reason).into_response(),
            HttpError::ConstraintViolation(violations) => {
                let links: Vec<(header::HeaderName, String)> = violations
                    .iter()
                    .map(|v| {
                        (
                            header::LINK,
                            format!("<{}>; rel=\"{}\"", v.rule.as_str(), ldp::CONSTRAINED_BY),
                        )
                    })
                    .collect();
                let mut response =
                    (StatusCode::CONFLICT, "Constraint violation").into_response();
                for (name, value) in links {
                    if let Ok(value) = value.parse() {
                        response.headers_mut().append(name, value);
                    }
                }
                response
            }
            HttpError::PreconditionFailed => {
                (StatusCode::PRECONDITION_FAILED, "Precondition Failed").into_response()
            }
            HttpError::NotModified(etag) => {
                let mut response = StatusCode::NOT_MODIFIED.into_response();
                if let Some(etag) = etag {
                    if let Ok(value) = etag.parse() {
                        response.headers_mut().insert(header::ETAG, value);
                    }
                }
                response
            }
            HttpError::PreconditionRequired => {
                (StatusCode::PRECONDITION_REQUIRED, "Precondition Required").into_response()
            }
            HttpError::Internal(cause) => {
                error!("internal error: {}", cause);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}
