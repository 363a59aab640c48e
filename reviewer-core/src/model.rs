//! Domain types for teams, users, and pull requests.
//!
//! Identifiers are newtypes so a user id can never be passed where a pull
//! request id is expected. All of them are opaque strings chosen by the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier of a user.
    UserId
);

string_id!(
    /// Unique name of a team. Acts as the team's primary key.
    TeamName
);

string_id!(
    /// Identifier of a pull request. Immutable and globally unique.
    PullRequestId
);

/// A person who can author pull requests and review them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub is_active: bool,
    pub team_name: TeamName,
}

impl User {
    pub fn new(
        id: impl Into<UserId>,
        username: impl Into<String>,
        is_active: bool,
        team_name: impl Into<TeamName>,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            is_active,
            team_name: team_name.into(),
        }
    }
}

/// A named group of users. Reviewers for a pull request are always drawn
/// from the author's team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub name: TeamName,
    pub members: Vec<User>,
}

impl Team {
    pub fn new(name: impl Into<TeamName>, members: Vec<User>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }

    pub fn member(&self, id: &UserId) -> Option<&User> {
        self.members.iter().find(|u| &u.id == id)
    }
}

/// Lifecycle status of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrStatus {
    Open,
    Merged,
}

impl PrStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Merged => "MERGED",
        }
    }

    /// Parse the stored/wire representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(Self::Open),
            "MERGED" => Some(Self::Merged),
            _ => None,
        }
    }
}

impl fmt::Display for PrStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pull request and its current reviewer assignment.
///
/// Reviewers are kept in assignment order. Reassignment replaces a reviewer
/// in its slot, so the position of the remaining reviewers never shifts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub id: PullRequestId,
    pub name: String,
    pub author_id: UserId,
    pub status: PrStatus,
    pub reviewers: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
}

impl PullRequest {
    pub fn is_open(&self) -> bool {
        self.status == PrStatus::Open
    }

    pub fn has_reviewer(&self, id: &UserId) -> bool {
        self.reviewers.iter().any(|r| r == id)
    }
}
