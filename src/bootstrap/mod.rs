//! Bootstrap layer: modules that run before the runner is built.
//!
//! - **logger**: tracing-subscriber initialisation.

pub mod logger;
