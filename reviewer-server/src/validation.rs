//! Request validation.
//!
//! Every check produces [`DomainError::InvalidData`] naming the offending
//! field, so the handlers can reject a request before any service runs.

use std::collections::HashSet;

use reviewer_core::DomainError;

use crate::api::types::{
    CreatePullRequestRequest, CreateTeamRequest, MergePullRequestRequest,
    ReassignReviewerRequest, SetUserActiveRequest,
};

/// Longest accepted identifier, in bytes.
pub const MAX_ID_LEN: usize = 255;

/// Shape checks for incoming requests.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    max_id_len: usize,
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestValidator {
    pub fn new() -> Self {
        Self {
            max_id_len: MAX_ID_LEN,
        }
    }

    pub fn with_max_id_len(max_id_len: usize) -> Self {
        Self { max_id_len }
    }

    /// The value must contain something other than whitespace.
    pub fn required(&self, field: &str, value: &str) -> Result<(), DomainError> {
        if value.trim().is_empty() {
            return Err(DomainError::invalid(format!("{} is required", field)));
        }
        Ok(())
    }

    /// A required identifier no longer than the configured limit.
    pub fn id(&self, field: &str, value: &str) -> Result<(), DomainError> {
        self.required(field, value)?;
        if value.len() > self.max_id_len {
            return Err(DomainError::invalid(format!(
                "{} must be at most {} characters",
                field, self.max_id_len
            )));
        }
        Ok(())
    }

    /// A required identifier passed as a query parameter. Returns the value.
    pub fn id_param<'a>(
        &self,
        field: &str,
        value: Option<&'a str>,
    ) -> Result<&'a str, DomainError> {
        let value = value.unwrap_or_default();
        self.id(field, value)?;
        Ok(value)
    }

    pub fn create_team(&self, req: &CreateTeamRequest) -> Result<(), DomainError> {
        self.id("team_name", &req.team_name)?;
        if req.members.is_empty() {
            return Err(DomainError::invalid("members are required"));
        }

        let mut seen = HashSet::new();
        for member in &req.members {
            self.id("members.user_id", &member.user_id)?;
            self.required("members.username", &member.username)?;
            if !seen.insert(member.user_id.as_str()) {
                return Err(DomainError::invalid(format!(
                    "duplicate user_id {} in members",
                    member.user_id
                )));
            }
        }
        Ok(())
    }

    pub fn set_user_active(&self, req: &SetUserActiveRequest) -> Result<bool, DomainError> {
        self.id("user_id", &req.user_id)?;
        req.is_active
            .ok_or_else(|| DomainError::invalid("is_active is required"))
    }

    pub fn create_pull_request(&self, req: &CreatePullRequestRequest) -> Result<(), DomainError> {
        self.id("pull_request_id", &req.pull_request_id)?;
        self.required("pull_request_name", &req.pull_request_name)?;
        self.id("author_id", &req.author_id)
    }

    pub fn merge_pull_request(&self, req: &MergePullRequestRequest) -> Result<(), DomainError> {
        self.id("pull_request_id", &req.pull_request_id)
    }

    pub fn reassign_reviewer(&self, req: &ReassignReviewerRequest) -> Result<(), DomainError> {
        self.id("pull_request_id", &req.pull_request_id)?;
        self.id("old_reviewer_id", &req.old_reviewer_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::types::TeamMemberRequest;

    fn message(err: DomainError) -> String {
        match err {
            DomainError::InvalidData { message } => message,
            other => panic!("expected InvalidData, got {:?}", other),
        }
    }

    fn member(id: &str) -> TeamMemberRequest {
        TeamMemberRequest {
            user_id: id.to_string(),
            username: format!("name-{}", id),
            is_active: true,
        }
    }

    #[test]
    fn test_blank_is_missing() {
        let v = RequestValidator::new();
        assert_eq!(message(v.required("author_id", "   ").unwrap_err()), "author_id is required");
        assert!(v.required("author_id", "u1").is_ok());
    }

    #[test]
    fn test_id_length_limit() {
        let v = RequestValidator::with_max_id_len(4);
        assert!(v.id("user_id", "abcd").is_ok());
        assert_eq!(
            message(v.id("user_id", "abcde").unwrap_err()),
            "user_id must be at most 4 characters"
        );
    }

    #[test]
    fn test_id_param_missing() {
        let v = RequestValidator::new();
        assert_eq!(
            message(v.id_param("team_name", None).unwrap_err()),
            "team_name is required"
        );
        assert_eq!(v.id_param("team_name", Some("qa")).unwrap(), "qa");
    }

    #[test]
    fn test_create_pull_request_names_first_missing_field() {
        let v = RequestValidator::new();
        let req = CreatePullRequestRequest {
            pull_request_id: "pr-1".to_string(),
            pull_request_name: "Add search".to_string(),
            author_id: String::new(),
        };
        assert_eq!(
            message(v.create_pull_request(&req).unwrap_err()),
            "author_id is required"
        );

        let req = CreatePullRequestRequest {
            pull_request_id: String::new(),
            ..req
        };
        assert_eq!(
            message(v.create_pull_request(&req).unwrap_err()),
            "pull_request_id is required"
        );
    }

    #[test]
    fn test_create_team_rules() {
        let v = RequestValidator::new();

        let empty = CreateTeamRequest {
            team_name: "qa".to_string(),
            members: vec![],
        };
        assert_eq!(message(v.create_team(&empty).unwrap_err()), "members are required");

        let dup = CreateTeamRequest {
            team_name: "qa".to_string(),
            members: vec![member("u1"), member("u2"), member("u1")],
        };
        assert_eq!(
            message(v.create_team(&dup).unwrap_err()),
            "duplicate user_id u1 in members"
        );

        let ok = CreateTeamRequest {
            team_name: "qa".to_string(),
            members: vec![member("u1"), member("u2")],
        };
        assert!(v.create_team(&ok).is_ok());
    }

    #[test]
    fn test_set_user_active_requires_flag() {
        let v = RequestValidator::new();
        let req = SetUserActiveRequest {
            user_id: "u1".to_string(),
            is_active: None,
        };
        assert_eq!(
            message(v.set_user_active(&req).unwrap_err()),
            "is_active is required"
        );

        let req = SetUserActiveRequest {
            is_active: Some(false),
            ..req
        };
        assert!(!v.set_user_active(&req).unwrap());
    }
}
