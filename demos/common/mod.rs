//! Shared message and service types for the demos.
//!
//! Define wire types once, in a module (or crate) that both sides depend
//! on, so the type identifiers can never drift apart.
#![allow(dead_code)]

mod types;

pub use types::*;

pub fn init_logging() {
    // ---
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
