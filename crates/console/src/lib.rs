//! Mindwatch console - client runtime for the monitoring dashboards.
//!
//! This crate talks to the monitoring backend and keeps per-role dashboard
//! state fresh:
//!
//! - [`api`] - REST client for the backend
//! - [`session`] - Persisted login session (`token` + `user`)
//! - [`services`] - Login, registration and logout flows
//! - [`sync`] - Polling synchronizer shared by every dashboard
//! - [`dashboards`] - View models for the admin, therapist, psychiatrist and patient dashboards
//! - [`feed`] - Patient post feed and analysis submission
//!
//! Dashboards are only constructible from an
//! [`Admitted`](mindwatch_core::Admitted) session, so the role gate always
//! runs before any dashboard state exists.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod dashboards;
pub mod error;
pub mod feed;
pub mod services;
pub mod session;
pub mod sync;

pub use api::{ApiClient, ApiError};
pub use config::{ConfigError, ConsoleConfig};
pub use error::{ConsoleError, ErrorKind};
pub use session::{FileSessionStore, MemorySessionStore, SessionStore, SessionStoreError};
pub use sync::{Resource, ResourcePayload, SyncHandle, SyncIntervals};
