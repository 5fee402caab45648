// Boardroom
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Error handling for the governance API
//! Implements RFC 7807 Problem Details format

use crate::store::StoreError;
use http_body_util::Full;
use hyper::{Response, StatusCode, body::Bytes};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::error;

/// Domain errors raised by the access-control and voting core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("ballot is not open for voting")]
    BallotNotActive,

    #[error("principal is not eligible to vote on this ballot")]
    NotEligible,

    #[error("a vote has already been recorded for this ballot")]
    DuplicateVote,

    #[error("ballot options are frozen once voting has started")]
    OptionsFrozen,

    #[error("{0}")]
    Validation(String),

    #[error("cannot move {entity} from {from} to {to}")]
    InvalidTransition { entity: &'static str, from: String, to: String },

    #[error("not authorized")]
    Forbidden,

    #[error("authentication required")]
    Unauthorized,

    #[error("{resource} not found")]
    NotFound { resource: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        CoreError::NotFound { resource: resource.into() }
    }

    /// An optimistic write of version `to` lost the race against a concurrent writer
    pub fn stale_write(entity: &'static str, from: u64, to: u64) -> Self {
        CoreError::InvalidTransition {
            entity,
            from: format!("version {}", from),
            to: format!("version {}", to),
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::BallotNotActive => "BallotNotActive",
            CoreError::NotEligible => "NotEligible",
            CoreError::DuplicateVote => "DuplicateVote",
            CoreError::OptionsFrozen => "OptionsFrozen",
            CoreError::Validation(_) => "ValidationFailed",
            CoreError::InvalidTransition { .. } => "InvalidTransition",
            CoreError::Forbidden => "Forbidden",
            CoreError::Unauthorized => "Unauthorized",
            CoreError::NotFound { .. } => "NotFound",
            CoreError::Store(StoreError::Conflict(_)) => "Conflict",
            CoreError::Store(_) => "StoreError",
            CoreError::InvariantViolation(_) => "InvariantViolation",
        }
    }

    /// Whether this is a user-facing validation rejection
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            CoreError::BallotNotActive | CoreError::NotEligible | CoreError::DuplicateVote | CoreError::OptionsFrozen | CoreError::Validation(_) | CoreError::InvalidTransition { .. }
        )
    }
}

/// API error types following REST conventions
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("{message}")]
    Rejected { status: StatusCode, code: &'static str, message: String },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Method not allowed: {message}")]
    MethodNotAllowed { message: String },

    #[error("Payload too large: {message}")]
    PayloadTooLarge { message: String },

    #[error("Internal server error: {message}")]
    InternalServerError { message: String },

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    #[error("Gateway timeout: {message}")]
    GatewayTimeout { message: String },

    #[error("Serde JSON error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("Hyper error: {0}")]
    HyperError(#[from] hyper::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Router error: {0}")]
    RouterError(String),
}

impl ApiError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::Rejected { status, .. } => *status,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::GatewayTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::BadRequest { .. } => "bad_request",
            ApiError::Rejected { .. } => "rejected",
            ApiError::Unauthorized { .. } => "unauthorized",
            ApiError::Forbidden { .. } => "forbidden",
            ApiError::NotFound { .. } => "not_found",
            ApiError::MethodNotAllowed { .. } => "method_not_allowed",
            ApiError::PayloadTooLarge { .. } => "payload_too_large",
            ApiError::InternalServerError { .. } => "internal_server_error",
            ApiError::ServiceUnavailable { .. } => "service_unavailable",
            ApiError::GatewayTimeout { .. } => "gateway_timeout",
            ApiError::SerdeJsonError(_) => "json_error",
            ApiError::HyperError(_) => "http_error",
            ApiError::IoError(_) => "io_error",
            ApiError::HttpError(_) => "http_error",
            ApiError::RouterError(_) => "router_error",
        }
    }

    /// Validation code carried by rejections
    pub fn code(&self) -> Option<&'static str> {
        match self {
            ApiError::Rejected { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Render this error as a problem+json response
    pub fn into_response(self, instance: &str) -> Response<Full<Bytes>> {
        let status_code = self.status_code();
        let mut problem_details = ProblemDetails::new(&self, instance.to_string());
        if let Some(code) = self.code() {
            problem_details = problem_details.with_extension("code".to_string(), serde_json::Value::String(code.to_string()));
        }

        if status_code.is_server_error() {
            error!("API Error: {} - {}", status_code, self);
        }

        let json = match serde_json::to_string(&problem_details) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize error response: {}", e);
                r#"{"type":"https://api.boardroom.dev/problems/internal_server_error","title":"Internal Server Error","status":500,"detail":"An internal error occurred","instance":"/"}"#.to_string()
            }
        };

        let mut response = Response::new(Full::new(Bytes::from(json)));
        *response.status_mut() = status_code;
        let headers = response.headers_mut();
        headers.insert(hyper::header::CONTENT_TYPE, hyper::header::HeaderValue::from_static("application/problem+json"));
        headers.insert(hyper::header::CACHE_CONTROL, hyper::header::HeaderValue::from_static("no-cache"));
        response
    }
}

/// RFC 7807 Problem Details response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ProblemDetails {
    /// A URI reference that identifies the problem type
    #[serde(rename = "type")]
    pub problem_type: String,

    /// A short, human-readable summary of the problem type
    pub title: String,

    /// The HTTP status code generated by the origin server
    pub status: u16,

    /// A human-readable explanation specific to this occurrence
    pub detail: String,

    /// A URI reference that identifies the specific occurrence
    pub instance: String,

    /// Additional extension members
    #[serde(flatten)]
    pub extensions: HashMap<String, serde_json::Value>,
}

impl ProblemDetails {
    /// Create a new problem details response
    pub fn new(error: &ApiError, instance: String) -> Self {
        let status_code = error.status_code();
        let error_type = error.error_type();

        // Server-side failures never leak internals to the client
        let detail = if status_code.is_server_error() && !matches!(error, ApiError::ServiceUnavailable { .. } | ApiError::GatewayTimeout { .. }) {
            "An internal error occurred".to_string()
        } else {
            error.to_string()
        };

        Self {
            problem_type: format!("https://api.boardroom.dev/problems/{}", error_type),
            title: Self::status_to_title(status_code),
            status: status_code.as_u16(),
            detail,
            instance,
            extensions: HashMap::new(),
        }
    }

    /// Add extension data to the problem details
    pub fn with_extension(mut self, key: String, value: serde_json::Value) -> Self {
        self.extensions.insert(key, value);
        self
    }

    /// Convert status code to human-readable title
    fn status_to_title(status: StatusCode) -> String {
        status.canonical_reason().unwrap_or("Unknown Error").to_string()
    }
}

/// Convert ApiError to HTTP response
impl From<ApiError> for Response<Full<Bytes>> {
    fn from(error: ApiError) -> Self {
        error.into_response("/")
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::BallotNotActive | CoreError::NotEligible | CoreError::DuplicateVote | CoreError::Validation(_) => ApiError::Rejected {
                status: StatusCode::BAD_REQUEST,
                code: err.code(),
                message: err.to_string(),
            },
            CoreError::OptionsFrozen | CoreError::InvalidTransition { .. } => ApiError::Rejected {
                status: StatusCode::CONFLICT,
                code: err.code(),
                message: err.to_string(),
            },
            CoreError::Forbidden => ApiError::Forbidden {
                message: "not authorized".to_string(),
            },
            CoreError::Unauthorized => ApiError::Unauthorized {
                message: "authentication required".to_string(),
            },
            CoreError::NotFound { resource } => ApiError::NotFound {
                message: format!("{} not found", resource),
            },
            CoreError::Store(StoreError::Conflict(detail)) => ApiError::Rejected {
                status: StatusCode::CONFLICT,
                code: "Conflict",
                message: format!("conflicting write: {}", detail),
            },
            CoreError::Store(store_err) if store_err.is_transient() => ApiError::ServiceUnavailable {
                message: "storage temporarily unavailable, retry later".to_string(),
            },
            CoreError::Store(store_err) => ApiError::InternalServerError { message: store_err.to_string() },
            CoreError::InvariantViolation(message) => ApiError::InternalServerError { message },
        }
    }
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// From implementations for common errors
impl From<hyper::http::Error> for ApiError {
    fn from(err: hyper::http::Error) -> Self {
        ApiError::HttpError(err.to_string())
    }
}

impl From<matchit::InsertError> for ApiError {
    fn from(err: matchit::InsertError) -> Self {
        ApiError::RouterError(err.to_string())
    }
}
