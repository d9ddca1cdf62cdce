//! HTTP request handlers shared by every Arena service.

pub mod health;

pub use health::{health_check, readiness_check};
