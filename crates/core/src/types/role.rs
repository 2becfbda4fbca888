//! Capability tags stored on user profiles.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when a role tag is not recognized.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid role: {0}. Valid roles: admin, author, tutor, student, coordinator")]
pub struct RoleError(pub String);

/// A capability tag in a profile's `role` list.
///
/// Profiles carry a list of these tags; the admin tools always make sure the
/// list contains [`Role::Admin`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full platform administration.
    Admin,
    /// Course authoring.
    Author,
    /// Tutoring on assigned courses.
    Tutor,
    /// Enrolled learner.
    Student,
    /// Cohort coordination.
    Coordinator,
}

impl Role {
    /// The wire tag for this role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Author => "author",
            Self::Tutor => "tutor",
            Self::Student => "student",
            Self::Coordinator => "coordinator",
        }
    }

    /// Parse a comma-separated list of role tags (e.g. `"admin,author"`).
    ///
    /// Empty segments are ignored and duplicates are dropped, keeping the
    /// first occurrence.
    ///
    /// # Errors
    ///
    /// Returns [`RoleError`] for the first unrecognized tag.
    pub fn parse_list(s: &str) -> Result<Vec<Self>, RoleError> {
        let mut roles = Vec::new();
        for tag in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let role: Self = tag.parse()?;
            if !roles.contains(&role) {
                roles.push(role);
            }
        }
        Ok(roles)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "author" => Ok(Self::Author),
            "tutor" => Ok(Self::Tutor),
            "student" => Ok(Self::Student),
            "coordinator" => Ok(Self::Coordinator),
            _ => Err(RoleError(s.to_owned())),
        }
    }
}
