//! Client-side dashboard gate.
//!
//! The gate runs before any dashboard state is built. It only looks at the
//! prefix of the session's user ID (see [`resolve_role`]), so it is a
//! routing aid, not a security boundary: the backend must still enforce
//! access on every request.
//!
//! A missing session and a session with the wrong role produce the same
//! outcome, a redirect to [`LOGIN_ROUTE`]. There is no separate
//! "forbidden" state.

use crate::types::{LOGIN_ROUTE, Role, Session, resolve_role};

/// Result of checking a session against a dashboard's required role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allowed,
    /// Send the user to the login entry point.
    Denied,
}

impl Access {
    /// Whether access was granted.
    #[must_use]
    pub const fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Check whether `session` may open the dashboard for `required`.
#[must_use]
pub fn authorize(required: Role, session: Option<&Session>) -> Access {
    match session {
        Some(session) if resolve_role(session.id().as_str()) == required => Access::Allowed,
        _ => Access::Denied,
    }
}

/// Redirect issued by a denied gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redirect {
    to: &'static str,
}

impl Redirect {
    /// Redirect to the login entry point.
    #[must_use]
    pub const fn to_login() -> Self {
        Self { to: LOGIN_ROUTE }
    }

    /// Target path.
    #[must_use]
    pub const fn target(&self) -> &'static str {
        self.to
    }
}

/// Proof that a session passed the gate for a given role.
///
/// This can only be obtained from [`admit`], so anything that takes an
/// `Admitted` cannot be built for a session that failed the gate.
#[derive(Debug, Clone)]
pub struct Admitted {
    session: Session,
    role: Role,
}

impl Admitted {
    /// The admitted session.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// The role the session was admitted as.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Consume and return the session.
    #[must_use]
    pub fn into_session(self) -> Session {
        self.session
    }
}

/// Run the gate and keep the session on success.
///
/// # Errors
///
/// Returns a login [`Redirect`] when the session is absent or its role does
/// not match `required`.
pub fn admit(required: Role, session: Option<Session>) -> Result<Admitted, Redirect> {
    match authorize(required, session.as_ref()) {
        Access::Allowed => session
            .map(|session| Admitted {
                session,
                role: required,
            })
            .ok_or_else(Redirect::to_login),
        Access::Denied => Err(Redirect::to_login()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::types::{SessionUser, route_for_role};

    fn session(id: &str) -> Session {
        Session::new(SessionUser::new(id, "Test"), SecretString::from("tok"))
    }

    #[test]
    fn test_authorize_examples() {
        assert_eq!(authorize(Role::Admin, None), Access::Denied);
        assert_eq!(
            authorize(Role::Admin, Some(&session("p-001"))),
            Access::Denied
        );
        assert_eq!(
            authorize(Role::Patient, Some(&session("p-001"))),
            Access::Allowed
        );
    }

    #[test]
    fn test_authorize_wrong_role_is_same_as_logged_out() {
        let wrong = admit(Role::Psychiatrist, Some(session("t-jones"))).unwrap_err();
        let absent = admit(Role::Psychiatrist, None).unwrap_err();
        assert_eq!(wrong, absent);
        assert_eq!(wrong.target(), "/login");
    }

    #[test]
    fn test_login_redirect_always_passes_gate() {
        let ids = [
            "", "ADMIN", "admin-2", "dr-smith", "DRT", "t-jones", "Tom", "p-001", "guest",
        ];
        for id in ids {
            let s = session(id);
            let route = route_for_role(s.role());
            let role = Role::ALL
                .into_iter()
                .find(|r| r.route() == route)
                .unwrap();
            assert!(
                authorize(role, Some(&s)).is_allowed(),
                "login redirect for {id:?} lands on a dashboard that rejects it"
            );
        }
    }

    #[test]
    fn test_admit_keeps_session() {
        let admitted = admit(Role::Admin, Some(session("ADMIN123"))).unwrap();
        assert_eq!(admitted.role(), Role::Admin);
        assert_eq!(admitted.session().id().as_str(), "ADMIN123");
    }
}
