//! Command implementations.
//!
//! Every command runs against a [`Context`] built once from
//! [`ConsoleConfig`]: the API client, the dashboard settings and the
//! on-disk session store.

pub mod auth;
pub mod feed;
pub mod manage;
pub mod watch;

use mindwatch_console::api::{ApiError, PatientProfile};
use mindwatch_console::dashboards::DashboardContext;
use mindwatch_console::feed::SubmitError;
use mindwatch_console::services::AuthService;
use mindwatch_console::{ConsoleConfig, ConsoleError, FileSessionStore};
use mindwatch_core::{Admitted, Role, UserId};

/// Shared state for a single command run.
pub struct Context {
    pub dashboards: DashboardContext,
    pub store: FileSessionStore,
}

impl Context {
    /// Build the context from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn from_config(config: ConsoleConfig) -> Result<Self, ConsoleError> {
        Ok(Self {
            dashboards: DashboardContext::from_config(&config)?,
            store: FileSessionStore::new(config.session_file),
        })
    }

    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(&self.dashboards.api, &self.store)
    }

    /// Run the gate for `role` against the stored session.
    pub fn gate(&self, role: Role) -> Result<Admitted, ConsoleError> {
        self.auth().gate(role)
    }
}

/// Account fields typed in for `register` and `patients add`.
pub struct Account {
    pub user_id: String,
    pub profile: PatientProfile,
}

/// Validate a user ID typed on the command line.
pub fn parse_user_id(raw: &str) -> Result<UserId, CommandError> {
    UserId::parse(raw).map_err(|e| CommandError::InvalidUserId(raw.to_owned(), e.to_string()))
}

/// Errors raised by argument handling before any request is made.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("Invalid user ID {0:?}: {1}")]
    InvalidUserId(String, String),

    #[error("Nothing to analyze: pass --message and/or --image")]
    NothingToAnalyze,

    #[error("The {0} dashboard cannot analyze this content")]
    CannotAnalyze(Role),

    #[error(transparent)]
    Console(#[from] ConsoleError),
}

impl From<ApiError> for CommandError {
    fn from(e: ApiError) -> Self {
        Self::Console(e.into())
    }
}

impl From<SubmitError> for CommandError {
    fn from(e: SubmitError) -> Self {
        Self::Console(e.into())
    }
}
