//! # harness-types
//!
//! Shared types for the ANN harness.
//!
//! - Settings: layered configuration for index build and query runs
//! - HarnessError: configuration and input errors
//!
//! ## Usage
//!
//! ```rust
//! use harness_types::Settings;
//!
//! let settings = Settings::default();
//! assert_eq!(settings.dimension, 128);
//! ```

pub mod error;
pub mod settings;

pub use error::HarnessError;
pub use settings::Settings;
