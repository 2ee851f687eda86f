//! Role resolution from user identifiers.
//!
//! Roles are never stored. They are derived from the prefix of the user ID
//! every time they are needed, with a fixed precedence:
//!
//! | prefix (case-insensitive) | role |
//! |---|---|
//! | `ADMIN` | [`Role::Admin`] |
//! | `DR` | [`Role::Psychiatrist`] |
//! | `T` | [`Role::Therapist`] |
//! | anything else | [`Role::Patient`] |
//!
//! The prefixes are tested in table order and the first match wins. Both the
//! post-login redirect ([`route_for_role`]) and the dashboard gate
//! ([`authorize`](crate::authorize)) go through [`resolve_role`], so they
//! cannot disagree about the same ID.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Path of the login entry point. Every denied gate redirects here.
pub const LOGIN_ROUTE: &str = "/login";

/// Coarse access category derived from a user ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// System administrator (`ADMIN…`).
    Admin,
    /// Psychiatrist (`DR…`).
    Psychiatrist,
    /// Therapist (`T…`).
    Therapist,
    /// Everyone else.
    Patient,
}

/// Prefix table in precedence order.
const PREFIX_PRECEDENCE: [(&str, Role); 3] = [
    ("ADMIN", Role::Admin),
    ("DR", Role::Psychiatrist),
    ("T", Role::Therapist),
];

/// Resolve the role for a user ID.
///
/// Total over all strings: the empty string resolves to [`Role::Patient`].
///
/// ```
/// use mindwatch_core::{Role, resolve_role};
///
/// assert_eq!(resolve_role("ADMIN123"), Role::Admin);
/// assert_eq!(resolve_role("dr-smith"), Role::Psychiatrist);
/// assert_eq!(resolve_role("t-jones"), Role::Therapist);
/// assert_eq!(resolve_role("p-001"), Role::Patient);
/// assert_eq!(resolve_role(""), Role::Patient);
/// ```
#[must_use]
pub fn resolve_role(user_id: &str) -> Role {
    let upper = user_id.to_uppercase();
    PREFIX_PRECEDENCE
        .iter()
        .find(|(prefix, _)| upper.starts_with(prefix))
        .map_or(Role::Patient, |&(_, role)| role)
}

/// Dashboard path a freshly logged-in session is sent to.
#[must_use]
pub const fn route_for_role(role: Role) -> &'static str {
    match role {
        Role::Admin => "/dashboard/admin",
        Role::Psychiatrist => "/dashboard/psychiatrist",
        Role::Therapist => "/dashboard/therapist",
        Role::Patient => "/dashboard/patient",
    }
}

impl Role {
    /// All roles, in prefix precedence order.
    pub const ALL: [Self; 4] = [
        Self::Admin,
        Self::Psychiatrist,
        Self::Therapist,
        Self::Patient,
    ];

    /// Final path segment of this role's dashboard.
    #[must_use]
    pub const fn dashboard_segment(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Psychiatrist => "psychiatrist",
            Self::Therapist => "therapist",
            Self::Patient => "patient",
        }
    }

    /// Full dashboard route for this role.
    #[must_use]
    pub const fn route(self) -> &'static str {
        route_for_role(self)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dashboard_segment())
    }
}

/// Error returned when a role name is not recognised.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RoleParseError {
    /// The input names none of the four roles.
    #[error("invalid role: {0}")]
    Unknown(String),
}

impl std::str::FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "psychiatrist" => Ok(Self::Psychiatrist),
            "therapist" => Ok(Self::Therapist),
            "patient" => Ok(Self::Patient),
            _ => Err(RoleParseError::Unknown(s.to_owned())),
        }
    }
}
