//! # API Shared
//!
//! Shared utilities and definitions for the HMS APIs.
//!
//! Contains:
//! - Request/response types (`dto` module) with OpenAPI schemas
//! - Caller identity and capability checks (`auth` module)
//! - Health reporting (`HealthService`)
//!
//! Used by `api-rest`; nothing here depends on a particular HTTP framework.

pub mod auth;
pub mod dto;
pub mod health;

pub use auth::{Actor, AuthError};
pub use dto::*;
pub use health::HealthService;
