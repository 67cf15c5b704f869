//! Shared types for Product Porter
//!
//! Catalog models, the package record schema, the unified error system and
//! text normalisation helpers used by the server and any client.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use axum::{Json, body};
pub use http;
pub use serde::{Deserialize, Serialize};
