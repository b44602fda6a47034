//! Configuration management for the Scallop Planning backend
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with SCALLOP__ prefix
//!
//! The conchitas-per-kg factor has no default: it must come from a file or
//! the environment.

use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use shared::UnitConverter;

use crate::error::{AppError, AppResult};

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Quantity conversion factors
    pub conversions: ConversionsConfig,

    /// Harvest planning settings
    pub planning: PlanningConfig,

    /// Log output settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConversionsConfig {
    /// Conchitas in one kilogram of harvested shellfish
    pub conchitas_per_kg: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlanningConfig {
    /// Days ahead covered by the upcoming-harvests query
    pub upcoming_window_days: u32,

    /// Currency of cost and revenue figures
    pub currency: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Filter directive used when RUST_LOG is not set
    pub filter: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "scallop_planning=debug".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let environment =
            std::env::var("SCALLOP_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = Self::defaults(&environment)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (SCALLOP__ prefix)
            .add_source(
                Environment::with_prefix("SCALLOP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from TOML text on top of the defaults
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Self::defaults("development")?
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    fn defaults(environment: &str) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let logging = LoggingConfig::default();
        config::Config::builder()
            .set_default("environment", environment)?
            .set_default("planning.upcoming_window_days", 30)?
            .set_default("planning.currency", "PEN")?
            .set_default("logging.filter", logging.filter)?
            .set_default("logging.json", logging.json)
    }

    /// Unit converter bound to the configured kg factor
    pub fn converter(&self) -> AppResult<UnitConverter> {
        UnitConverter::new(self.conversions.conchitas_per_kg)
            .map_err(|e| AppError::Configuration(format!("conversions.conchitas_per_kg: {}", e)))
    }
}
