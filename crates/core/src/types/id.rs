//! Newtype IDs for type-safe entity references.
//!
//! Backend-issued numeric IDs use the `define_id!` macro. User identifiers
//! are free-form strings chosen at registration (e.g. `P-001`, `DR-SMITH`),
//! and feed posts carry a client-generated UUID.

use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to define a type-safe numeric ID wrapper.
///
/// Creates a newtype wrapper around `i64` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`
/// - Conversion methods: `new()`, `as_i64()`
/// - `From<i64>` and `Into<i64>` implementations
///
/// # Example
///
/// ```rust
/// # use mindwatch_core::define_id;
/// define_id!(AlertId);
/// define_id!(ReportId);
///
/// let alert_id = AlertId::new(1);
/// let report_id = ReportId::new(1);
///
/// // These are different types, so this won't compile:
/// // let _: AlertId = report_id;
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Create a new ID from an i64 value.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Get the underlying i64 value.
            #[must_use]
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(NotificationId);
define_id!(AnalysisId);

/// Errors that can occur when parsing a [`UserId`] from user input.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UserIdError {
    /// The input is empty or only whitespace.
    #[error("user ID cannot be empty")]
    Empty,
    /// The input is too long for the backend's ID column.
    #[error("user ID must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains whitespace.
    #[error("user ID cannot contain whitespace")]
    ContainsWhitespace,
}

/// A backend user identifier.
///
/// The identifier doubles as the source of the user's [`Role`](crate::Role):
/// its prefix decides which dashboard the user may open. Values received
/// from the backend are accepted as-is; [`UserId::parse`] validates values
/// typed in by a person before they are sent to `/register` or `/patients`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Maximum length accepted by the backend.
    pub const MAX_LENGTH: usize = 50;

    /// Wrap an identifier without validation.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse a user-entered identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, longer than
    /// [`Self::MAX_LENGTH`], or contains whitespace.
    pub fn parse(s: &str) -> Result<Self, UserIdError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(UserIdError::Empty);
        }
        if trimmed.chars().count() > Self::MAX_LENGTH {
            return Err(UserIdError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(UserIdError::ContainsWhitespace);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `UserId` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = UserIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Client-generated identifier for a feed post.
///
/// Posts exist locally before the backend has seen them, so the ID is
/// minted on the client and used to match the analysis verdict back to
/// the post it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(Uuid);

impl PostId {
    /// Generate a fresh random post ID.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
