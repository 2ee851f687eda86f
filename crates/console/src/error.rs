//! Unified error handling for the console.
//!
//! Every layer has its own error type. [`ConsoleError`] wraps them and
//! classifies each failure into one of the four user-facing [`ErrorKind`]s.

use thiserror::Error;

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::feed::SubmitError;
use crate::session::SessionStoreError;

/// How a failure is surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No session or an invalid one. Always resolved by going to login.
    AuthRequired,
    /// Transport failure, unexpected status or undecodable body.
    NetworkFailure,
    /// The submission was rejected; keep the input for correction.
    ValidationFailure,
    /// Some resources of a sync group failed while others succeeded.
    PartialFailure,
}

/// Console-level error type.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Backend call failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Persisted session could not be read or written.
    #[error("Session store error: {0}")]
    SessionStore(#[from] SessionStoreError),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Post submission was rejected locally.
    #[error("Submit error: {0}")]
    Submit(#[from] SubmitError),

    /// Dashboard gate refused the session.
    #[error("Login required")]
    AuthRequired,

    /// Resources that failed in a sync round while others applied.
    #[error("Partial failure: {failed} of {total} resources failed")]
    PartialFailure { failed: usize, total: usize },
}

impl ConsoleError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Api(err) => api_kind(err),
            Self::AuthRequired => ErrorKind::AuthRequired,
            Self::Submit(_) | Self::Config(_) => ErrorKind::ValidationFailure,
            Self::SessionStore(_) => ErrorKind::NetworkFailure,
            Self::PartialFailure { .. } => ErrorKind::PartialFailure,
        }
    }
}

impl From<mindwatch_core::Redirect> for ConsoleError {
    fn from(_: mindwatch_core::Redirect) -> Self {
        Self::AuthRequired
    }
}

const fn api_kind(err: &ApiError) -> ErrorKind {
    match err {
        ApiError::Unauthorized(_) | ApiError::MissingSession => ErrorKind::AuthRequired,
        ApiError::Validation { .. } => ErrorKind::ValidationFailure,
        ApiError::Http(_)
        | ApiError::NotFound(_)
        | ApiError::RateLimited(_)
        | ApiError::Api { .. }
        | ApiError::Decode(_)
        | ApiError::InvalidUrl(_) => ErrorKind::NetworkFailure,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_kinds() {
        let cases = [
            (ApiError::MissingSession, ErrorKind::AuthRequired),
            (ApiError::Unauthorized("x".into()), ErrorKind::AuthRequired),
            (
                ApiError::Validation {
                    status: 400,
                    message: "User ID already exists".into(),
                },
                ErrorKind::ValidationFailure,
            ),
            (ApiError::NotFound("x".into()), ErrorKind::NetworkFailure),
            (ApiError::Decode("x".into()), ErrorKind::NetworkFailure),
            (
                ApiError::Api {
                    status: 500,
                    message: "boom".into(),
                },
                ErrorKind::NetworkFailure,
            ),
        ];
        for (err, kind) in cases {
            assert_eq!(ConsoleError::from(err).kind(), kind);
        }
    }

    #[test]
    fn test_redirect_is_auth_required() {
        let err = ConsoleError::from(mindwatch_core::Redirect::to_login());
        assert_eq!(err.kind(), ErrorKind::AuthRequired);
    }

    #[test]
    fn test_empty_submission_is_validation() {
        let err = ConsoleError::from(SubmitError::Empty);
        assert_eq!(err.kind(), ErrorKind::ValidationFailure);
    }

    #[test]
    fn test_partial_failure_kind() {
        let err = ConsoleError::PartialFailure { failed: 1, total: 3 };
        assert_eq!(err.kind(), ErrorKind::PartialFailure);
        assert_eq!(err.to_string(), "Partial failure: 1 of 3 resources failed");
    }
}
