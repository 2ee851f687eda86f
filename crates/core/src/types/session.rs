//! Logged-in session.
//!
//! A session is the pair of the user profile returned by `/login` and the
//! bearer token that authenticates follow-up calls. The two are only ever
//! valid together: a profile without a token (or the reverse) is treated as
//! logged out by whoever persists them.

use core::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::id::UserId;
use super::role::{Role, resolve_role};

/// Profile of the logged-in user, as returned in the login response.
///
/// Only `id` and `name` are interpreted. Remaining profile fields (age,
/// gender, status, ...) are preserved untouched so that the stored profile
/// round-trips exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: UserId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(flatten)]
    pub profile: serde_json::Map<String, serde_json::Value>,
}

impl SessionUser {
    /// Create a profile with only an ID and a name.
    #[must_use]
    pub fn new(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            profile: serde_json::Map::new(),
        }
    }

    /// Display name, falling back to the ID.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.id.as_str())
    }
}

/// An authenticated session: profile plus bearer token.
#[derive(Clone)]
pub struct Session {
    user: SessionUser,
    token: SecretString,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.user)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

impl Session {
    /// Pair a profile with its bearer token.
    #[must_use]
    pub const fn new(user: SessionUser, token: SecretString) -> Self {
        Self { user, token }
    }

    /// The logged-in user's ID.
    #[must_use]
    pub const fn id(&self) -> &UserId {
        &self.user.id
    }

    /// The logged-in user's profile.
    #[must_use]
    pub const fn user(&self) -> &SessionUser {
        &self.user
    }

    /// Bearer token for authenticated calls.
    #[must_use]
    pub const fn token(&self) -> &SecretString {
        &self.token
    }

    /// Role derived from the session's user ID.
    #[must_use]
    pub fn role(&self) -> Role {
        resolve_role(self.user.id.as_str())
    }

    /// Whether the token is empty, which no backend issues.
    #[must_use]
    pub fn has_blank_token(&self) -> bool {
        self.token.expose_secret().trim().is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_session_user_keeps_extra_fields() {
        let json = r#"{"id": "T-01", "name": "Nok", "age": 30, "status": "GREEN"}"#;
        let user: SessionUser = serde_json::from_str(json).unwrap();
        assert_eq!(user.profile.get("age"), Some(&serde_json::json!(30)));

        let back = serde_json::to_value(&user).unwrap();
        assert_eq!(back, serde_json::from_str::<serde_json::Value>(json).unwrap());
    }

    #[test]
    fn test_display_name_falls_back_to_id() {
        let mut user = SessionUser::new("P-001", "");
        assert_eq!(user.display_name(), "P-001");
        user.name = Some("Ploy".to_string());
        assert_eq!(user.display_name(), "Ploy");
    }

    #[test]
    fn test_session_role_and_redacted_debug() {
        let session = Session::new(
            SessionUser::new("dr-smith", "Dr Smith"),
            SecretString::from("eyJhbGciOi.secret"),
        );
        assert_eq!(session.role(), Role::Psychiatrist);
        let debug = format!("{session:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("eyJhbGciOi"));
    }
}
