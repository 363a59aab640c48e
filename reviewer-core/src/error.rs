//! Typed failures of the pull request lifecycle.
//!
//! Each variant maps to exactly one [`ErrorCode`], which is what callers use
//! to pick a response status without inspecting the message text.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::model::{PullRequestId, UserId};

/// The kind of entity a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    User,
    Team,
    PullRequest,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Team => write!(f, "team"),
            Self::PullRequest => write!(f, "pull request"),
        }
    }
}

/// Stable machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    #[serde(rename = "PR_EXISTS")]
    PrExists,
    #[serde(rename = "PR_MERGED")]
    PrMerged,
    NotAssigned,
    NoCandidate,
    InvalidData,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::PrExists => "PR_EXISTS",
            Self::PrMerged => "PR_MERGED",
            Self::NotAssigned => "NOT_ASSIGNED",
            Self::NoCandidate => "NO_CANDIDATE",
            Self::InvalidData => "INVALID_DATA",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A referenced user, team, or pull request does not exist.
    #[error("{resource} {id} not found")]
    NotFound { resource: Resource, id: String },

    /// A pull request with this id already exists.
    #[error("pull request {id} already exists")]
    AlreadyExists { id: PullRequestId },

    /// A mutation was attempted on a merged pull request.
    #[error("cannot reassign on merged pull request {id}")]
    AlreadyMerged { id: PullRequestId },

    /// The reassignment target is not a current reviewer.
    #[error("reviewer {reviewer_id} is not assigned to pull request {pr_id}")]
    NotAssigned {
        pr_id: PullRequestId,
        reviewer_id: UserId,
    },

    /// Nobody in the author's team is eligible to take over the review.
    #[error("no active replacement candidate in team for pull request {pr_id}")]
    NoCandidate { pr_id: PullRequestId },

    /// Malformed input rejected before reaching the lifecycle.
    #[error("{message}")]
    InvalidData { message: String },
}

impl DomainError {
    pub fn not_found(resource: Resource, id: impl fmt::Display) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::AlreadyExists { .. } => ErrorCode::PrExists,
            Self::AlreadyMerged { .. } => ErrorCode::PrMerged,
            Self::NotAssigned { .. } => ErrorCode::NotAssigned,
            Self::NoCandidate { .. } => ErrorCode::NoCandidate,
            Self::InvalidData { .. } => ErrorCode::InvalidData,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_serialize_to_wire_names() {
        let codes = [
            (ErrorCode::NotFound, "NOT_FOUND"),
            (ErrorCode::PrExists, "PR_EXISTS"),
            (ErrorCode::PrMerged, "PR_MERGED"),
            (ErrorCode::NotAssigned, "NOT_ASSIGNED"),
            (ErrorCode::NoCandidate, "NO_CANDIDATE"),
            (ErrorCode::InvalidData, "INVALID_DATA"),
        ];
        for (code, expected) in codes {
            assert_eq!(code.as_str(), expected);
            assert_eq!(
                serde_json::to_value(code).unwrap(),
                serde_json::Value::String(expected.to_string())
            );
        }
    }

    #[test]
    fn test_not_found_message_names_resource() {
        let err = DomainError::not_found(Resource::Team, "backend");
        assert_eq!(err.to_string(), "team backend not found");
        assert_eq!(err.code(), ErrorCode::NotFound);
    }
}
