//! Role model and approval routes
//!
//! Roles form a closed set: the approver roles of the canonical route plus
//! the roles that may only originate letters.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Roles recognized by the approval system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "SRC")]
    Src,
    #[serde(rename = "Faculty")]
    Faculty,
    #[serde(rename = "HOD")]
    Hod,
    #[serde(rename = "Dean")]
    Dean,
    #[serde(rename = "Students Affairs Officer")]
    StudentsAffairsOfficer,
    #[serde(rename = "Dean of Student Affairs")]
    DeanOfStudentAffairs,
    #[serde(rename = "Vice Chancellor")]
    ViceChancellor,
    #[serde(rename = "Faculty Association")]
    FacultyAssociation,
    #[serde(rename = "Student")]
    Student,
    #[serde(rename = "Staff")]
    Staff,
}

impl Role {
    /// Every recognized role
    pub const ALL: [Role; 10] = [
        Role::Src,
        Role::Faculty,
        Role::Hod,
        Role::Dean,
        Role::StudentsAffairsOfficer,
        Role::DeanOfStudentAffairs,
        Role::ViceChancellor,
        Role::FacultyAssociation,
        Role::Student,
        Role::Staff,
    ];

    /// The canonical approval chain, in order
    pub const CANONICAL_ROUTE: [Role; 7] = [
        Role::Src,
        Role::Faculty,
        Role::Hod,
        Role::Dean,
        Role::StudentsAffairsOfficer,
        Role::DeanOfStudentAffairs,
        Role::ViceChancellor,
    ];

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Src => "SRC",
            Role::Faculty => "Faculty",
            Role::Hod => "HOD",
            Role::Dean => "Dean",
            Role::StudentsAffairsOfficer => "Students Affairs Officer",
            Role::DeanOfStudentAffairs => "Dean of Student Affairs",
            Role::ViceChancellor => "Vice Chancellor",
            Role::FacultyAssociation => "Faculty Association",
            Role::Student => "Student",
            Role::Staff => "Staff",
        }
    }

    /// Lowest-privilege submitter role; may send letters but not comment
    pub fn is_submitter_only(&self) -> bool {
        matches!(self, Role::Student)
    }

    pub fn can_comment(&self) -> bool {
        !self.is_submitter_only()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Role::ALL
            .iter()
            .copied()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| AppError::InvalidRole(s.to_string()))
    }
}

/// A non-empty, ordered list of roles a letter must pass through
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Route {
    roles: Vec<Role>,
}

impl Route {
    /// Create a route; fails with `EmptyRoute` for an empty list
    pub fn new(roles: impl Into<Vec<Role>>) -> Result<Self> {
        let roles = roles.into();
        if roles.is_empty() {
            return Err(AppError::EmptyRoute);
        }
        Ok(Self { roles })
    }

    /// Parse role names, failing on the first unrecognized one
    pub fn parse<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let roles = names
            .iter()
            .map(|name| name.as_ref().parse())
            .collect::<Result<Vec<Role>>>()?;
        Self::new(roles)
    }

    pub fn roles(&self) -> &[Role] {
        &self.roles
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

impl Default for Route {
    fn default() -> Self {
        Self {
            roles: Role::CANONICAL_ROUTE.to_vec(),
        }
    }
}
