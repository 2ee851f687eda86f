//! Session lifecycle: login, registration, logout and gate checks.
//!
//! The session store is the only shared mutable state across dashboards.
//! It is written here (login, registration, logout) and read by
//! [`AuthService::gate`] on every dashboard entry.

use mindwatch_core::{Admitted, Role, Session, UserId, admit, route_for_role};
use secrecy::SecretString;
use tracing::{info, instrument, warn};

use crate::api::{ApiClient, Registration};
use crate::error::ConsoleError;
use crate::session::SessionStore;

/// Authentication service.
pub struct AuthService<'a> {
    api: &'a ApiClient,
    store: &'a dyn SessionStore,
}

impl<'a> AuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(api: &'a ApiClient, store: &'a dyn SessionStore) -> Self {
        Self { api, store }
    }

    /// Log in, persist the session and return the dashboard route for it.
    ///
    /// # Errors
    ///
    /// Returns error if the credentials are rejected or the session cannot
    /// be stored. Nothing is persisted on failure.
    #[instrument(skip(self, password), fields(user_id = %user_id))]
    pub async fn login(
        &self,
        user_id: &UserId,
        password: &SecretString,
    ) -> Result<&'static str, ConsoleError> {
        let session = self.api.login(user_id, password).await?;
        self.store.save(&session)?;

        let role = session.role();
        info!(%role, "Logged in");
        Ok(route_for_role(role))
    }

    /// Register an account without logging in.
    ///
    /// The registration is borrowed so the caller keeps the input for
    /// correction when the backend rejects it.
    ///
    /// # Errors
    ///
    /// Returns a validation error when the backend rejects the data.
    #[instrument(skip(self, registration), fields(user_id = %registration.user_id))]
    pub async fn register(&self, registration: &Registration) -> Result<(), ConsoleError> {
        self.api.register(registration).await.map_err(|e| {
            warn!(error = %e, "Registration rejected");
            ConsoleError::from(e)
        })?;
        info!("Registered");
        Ok(())
    }

    /// Register, then log in with the same credentials.
    ///
    /// # Errors
    ///
    /// Returns error if either step fails.
    pub async fn register_and_login(
        &self,
        registration: &Registration,
    ) -> Result<&'static str, ConsoleError> {
        self.register(registration).await?;
        self.login(&registration.user_id, &registration.password)
            .await
    }

    /// Remove both session keys.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be written.
    pub fn logout(&self) -> Result<(), ConsoleError> {
        self.store.clear()?;
        info!("Logged out");
        Ok(())
    }

    /// The stored session, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the store cannot be read.
    pub fn current(&self) -> Result<Option<Session>, ConsoleError> {
        Ok(self.store.load()?)
    }

    /// Run the dashboard gate for `role` against the stored session.
    ///
    /// # Errors
    ///
    /// Returns [`ConsoleError::AuthRequired`] when there is no session or
    /// its role does not match.
    pub fn gate(&self, role: Role) -> Result<Admitted, ConsoleError> {
        let session = self.store.load()?;
        Ok(admit(role, session)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use mindwatch_core::SessionUser;
    use url::Url;

    use super::*;
    use crate::error::ErrorKind;
    use crate::session::MemorySessionStore;

    fn api() -> ApiClient {
        ApiClient::new(
            Url::parse("http://127.0.0.1:9/api").unwrap(),
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn test_gate_without_session_requires_login() {
        let api = api();
        let store = MemorySessionStore::new();
        let auth = AuthService::new(&api, &store);
        let err = auth.gate(Role::Patient).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthRequired);
    }

    #[test]
    fn test_gate_matches_role() {
        let api = api();
        let store = MemorySessionStore::new();
        store
            .save(&Session::new(
                SessionUser::new("DR-7", "Dr. Pim"),
                SecretString::from("t"),
            ))
            .unwrap();
        let auth = AuthService::new(&api, &store);

        assert_eq!(auth.gate(Role::Psychiatrist).unwrap().role(), Role::Psychiatrist);
        assert!(auth.gate(Role::Admin).is_err());
    }

    #[test]
    fn test_logout_clears_session() {
        let api = api();
        let store = MemorySessionStore::new();
        store
            .save(&Session::new(SessionUser::new("T-1", "Nok"), SecretString::from("t")))
            .unwrap();
        let auth = AuthService::new(&api, &store);

        auth.logout().unwrap();
        assert!(auth.current().unwrap().is_none());
        assert!(auth.gate(Role::Therapist).is_err());
    }
}
