//! # logtap Admin Interface
//!
//! Read-only HTTP endpoints an operator-facing health monitor polls for the
//! Running/Degraded status of every input.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

/// REST API
pub mod api;

pub use api::{serve, status_router};
