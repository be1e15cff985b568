//! Data models and DTOs (Data Transfer Objects)
//!
//! Contains the persisted entities and the request structures used by the API.

pub mod role;
pub mod user;

// Re-export commonly used types
pub use role::*;
pub use user::*;
