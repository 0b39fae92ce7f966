//! Tracing setup for binaries that own a session manager.
//!
//! # Design
//! One fmt subscriber per process, filtered by `RUST_LOG` when set. Library
//! code only emits events through `tracing` and never installs a subscriber.

use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, thiserror::Error)]
#[error("failed to install tracing subscriber: {0}")]
pub struct LoggingError(String);

/// Initialize logging/tracing for the process that owns the session manager.
pub fn init(service_name: &str) -> Result<(), LoggingError> {
    // Default: info for our crates, warn for everything else.
    // Can be overridden with `RUST_LOG`.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let service = service_name.replace('-', "_");
        EnvFilter::new(format!("warn,habitica_core=info,{service}=info"))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| LoggingError(e.to_string()))
}
