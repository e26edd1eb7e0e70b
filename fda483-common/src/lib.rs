//! # fda483 Common Library
//!
//! Shared code for the FDA 483 classification tools:
//! - Error type and `Result` alias
//! - TOML configuration loading and config path resolution
//! - Progress event types and the broadcast `EventBus`

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
