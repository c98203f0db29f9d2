//! motiongate Common Utilities
//!
//! Shared infrastructure for all motiongate crates:
//! - Error types and result aliases
//! - Monotonic clock capability used for hysteresis timing
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
