//! Mapping of service failures to HTTP responses.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use reviewer_core::{DomainError, ErrorCode};

use crate::service::ServiceError;

const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
const CONFLICT: &str = "CONFLICT";

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

/// An error ready to be sent as `{"error": {"code", "message"}}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: INTERNAL_ERROR,
            message: "internal server error".to_string(),
        }
    }
}

fn domain_status(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::PrExists
        | ErrorCode::PrMerged
        | ErrorCode::NotAssigned
        | ErrorCode::NoCandidate => StatusCode::CONFLICT,
        ErrorCode::InvalidData => StatusCode::BAD_REQUEST,
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        let code = err.code();
        Self {
            status: domain_status(code),
            code: code.as_str(),
            message: err.to_string(),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Domain(e) => e.into(),
            ServiceError::Conflict(what) => {
                warn!("Concurrent update rejected: {}", what);
                Self {
                    status: StatusCode::CONFLICT,
                    code: CONFLICT,
                    message: "pull request was modified concurrently, retry".to_string(),
                }
            }
            ServiceError::Integrity(what) => {
                error!("Integrity error: {}", what);
                Self::internal()
            }
            ServiceError::Repository(e) => {
                error!("Repository error: {}", e);
                Self::internal()
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        debug!("Rejected request body: {}", rejection.body_text());
        DomainError::invalid("invalid request body").into()
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        debug!("Rejected query string: {}", rejection.body_text());
        DomainError::invalid("invalid query string").into()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
