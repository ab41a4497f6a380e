//! HTTP request handlers.

pub mod access_requests;
pub mod health;

pub use health::health_check;
