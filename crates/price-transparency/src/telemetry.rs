use crate::config::TelemetryConfig;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("log filter '{directives}' is not a valid EnvFilter")]
    Filter {
        directives: String,
        source: ParseError,
    },
    #[error("a global tracing subscriber is already installed: {0}")]
    AlreadyInstalled(Box<dyn std::error::Error + Send + Sync>),
}

/// Installs the global subscriber for a cleaning run. `RUST_LOG` wins over the configured level.
///
/// Events go to stderr; stdout carries only the run summary printed by the CLI.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => run_filter(&config.log_level)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::AlreadyInstalled)
}

fn run_filter(directives: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(directives).map_err(|source| TelemetryError::Filter {
        directives: directives.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_levels_and_crate_directives() {
        assert!(run_filter("debug").is_ok());
        assert!(run_filter("price_transparency=trace,info").is_ok());
    }

    #[test]
    fn rejects_unknown_levels() {
        let error = run_filter("price_transparency=verbose").expect_err("filter rejected");
        assert!(matches!(error, TelemetryError::Filter { .. }));
        assert!(error.to_string().contains("price_transparency=verbose"));
    }
}
