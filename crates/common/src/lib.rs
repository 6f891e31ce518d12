//! Shared error definitions and small helpers used across all graphbox crates.

pub mod error;
pub mod secret;

pub use error::{Error, FromMessage, Result};
