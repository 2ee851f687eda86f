//! Session lifecycle services.
//!
//! # Services
//!
//! - `auth` - Login, registration, logout and the dashboard gate

pub mod auth;

pub use auth::AuthService;
