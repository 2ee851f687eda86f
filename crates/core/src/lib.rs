//! Mindwatch Core - Shared types library.
//!
//! This crate provides the pieces every Mindwatch front end agrees on:
//! - `console` - Dashboard view models, API client and live synchronizer
//! - `cli` - Terminal front end built on the console
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no timers. This keeps role resolution and statistics trivially
//! testable and usable from any front end.
//!
//! # Modules
//!
//! - [`types`] - IDs, roles, risk statuses, backend records and sessions
//! - [`auth`] - The client-side dashboard gate
//! - [`stats`] - Counts, averages, search and display windows over cached records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod auth;
pub mod stats;
pub mod types;

pub use auth::{Access, Admitted, Redirect, admit, authorize};
pub use types::*;
