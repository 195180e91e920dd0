//! # virald Common
//!
//! Shared utilities for the virald components.
//!
//! ## Logging
//!
//! ```rust,no_run
//! // Human-readable output, RUST_LOG overrides the level
//! virald_common::init_logging("info").unwrap();
//! ```

pub mod logging;

pub use logging::{build_filter, init_logging, init_logging_json};
