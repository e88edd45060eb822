//! Warden API Library
//!
//! Session and credential lifecycle: login with a single live session per
//! principal, logout, single-use password-reset tokens, anti-forgery tokens and an
//! administrative session inventory.

pub mod audit_constants;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod email;
pub mod error;
pub mod routes;
pub mod security;
pub mod state;
pub mod sweeper;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use state::{AppState, Collaborators};
