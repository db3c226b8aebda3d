//! Tracing subscriber setup for binaries and tests embedding the engine

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{PermsError, Result};

/// Installs a global `fmt` subscriber
///
/// `RUST_LOG` takes precedence over `default_filter`, e.g.
/// `"permresolve=debug"`.
///
/// # Errors
///
/// Returns `PermsError::InvalidConfig` for an unparseable filter and
/// `PermsError::Internal` if a global subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .map_err(|e| PermsError::InvalidConfig(format!("invalid log filter: {}", e)))?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| PermsError::Internal(e.to_string()))
}
