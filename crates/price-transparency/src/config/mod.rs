use crate::cleaning::DEFAULT_BATCH_SIZE;
use std::env;
use std::fmt;
use std::path::PathBuf;

/// Distinguishes runtime behavior for different stages of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for a cleaning run.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub cleaning: CleaningConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let base_dir = env::var("CLEAN_BASE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));
        let batch_size = match env::var("CLEAN_BATCH_SIZE") {
            Ok(raw) => parse_batch_size(&raw)?,
            Err(_) => DEFAULT_BATCH_SIZE,
        };

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            cleaning: CleaningConfig {
                base_dir,
                batch_size,
            },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

/// Where outputs land and how many rows are held in memory at once.
#[derive(Debug, Clone)]
pub struct CleaningConfig {
    pub base_dir: PathBuf,
    pub batch_size: usize,
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

fn parse_batch_size(raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(size) if size > 0 => Ok(size),
        _ => Err(ConfigError::InvalidBatchSize {
            value: raw.to_string(),
        }),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidBatchSize { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidBatchSize { value } => write!(
                f,
                "CLEAN_BATCH_SIZE must be a positive integer, got '{}'",
                value
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("CLEAN_BASE_DIR");
        env::remove_var("CLEAN_BATCH_SIZE");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.cleaning.base_dir, PathBuf::from("."));
        assert_eq!(config.cleaning.batch_size, 100_000);
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn reads_overrides_from_env() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_ENV", "prod");
        env::set_var("CLEAN_BASE_DIR", "/srv/clearcare");
        env::set_var("CLEAN_BATCH_SIZE", " 5000 ");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.environment, AppEnvironment::Production);
        assert_eq!(config.cleaning.base_dir, PathBuf::from("/srv/clearcare"));
        assert_eq!(config.cleaning.batch_size, 5000);
        reset_env();
    }

    #[test]
    fn rejects_zero_and_non_numeric_batch_sizes() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        for raw in ["0", "lots"] {
            env::set_var("CLEAN_BATCH_SIZE", raw);
            let error = AppConfig::load().expect_err("batch size rejected");
            assert!(error.to_string().contains("CLEAN_BATCH_SIZE"));
        }
        reset_env();
    }
}
