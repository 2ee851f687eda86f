//! Core types for Mindwatch.
//!
//! This module provides type-safe wrappers for the domain concepts shared by
//! every dashboard: identifiers, roles, risk statuses, backend records and
//! the logged-in session.

pub mod id;
pub mod records;
pub mod role;
pub mod session;
pub mod status;

pub use id::*;
pub use records::*;
pub use role::*;
pub use session::{Session, SessionUser};
pub use status::*;
