//! Initialization of the global tracing subscriber.
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::{SubscriberInitExt as _, TryInitError};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,h2=error,hyper=error,reqwest=warn,tower=error,tower_http=info";

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TracingError {
    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Installs the global subscriber.
///
/// Logs are written as JSON lines, or human readable with `APP_ENV=local`.
/// `RUST_LOG` overrides [`DEFAULT_FILTER`].
///
/// # Errors
/// - a global subscriber is already installed
pub fn init_tracing(service_name: &'static str) -> Result<(), TracingError> {
    let registry = tracing_subscriber::registry().with(env_filter());

    if std::env::var("APP_ENV").unwrap_or_default() == "local" {
        registry.with(tracing_subscriber::fmt::layer()).try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init()?;
    }

    tracing::info!(service = service_name, "tracing initialized");
    Ok(())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        let got = EnvFilter::try_new(DEFAULT_FILTER);

        assert!(got.is_ok(), "{got:?}");
    }
}
