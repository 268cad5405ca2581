mod app_config;
mod config;
mod products;

use thiserror::Error;

pub use app_config::{AppConfig, DomSelectors, EmptyCatalogPolicy, HydrationConfig};
pub use config::{load_app_config, load_app_config_from_env};
pub use products::{ProductRecord, StrategyKind, CATALOG_COLUMNS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
