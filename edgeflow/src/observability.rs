//! Logging setup.

use crate::errors::EdgeflowError;
use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber.
///
/// `level` seeds the filter when `RUST_LOG` is unset. Fails when a
/// subscriber is already installed.
pub fn init_logging(service_key: &str, level: &str) -> Result<(), EdgeflowError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|err| {
            EdgeflowError::Initialization(format!(
                "failed to install logging for {service_key}: {err}"
            ))
        })?;
    tracing::info!(service = %service_key, "logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        // whichever call comes second must report an initialization error
        let first = init_logging("test-service", "info");
        let second = init_logging("test-service", "info");
        assert!(first.is_ok() || matches!(first, Err(EdgeflowError::Initialization(_))));
        assert!(matches!(second, Err(EdgeflowError::Initialization(_))));
    }
}
