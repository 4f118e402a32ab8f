pub mod config;
pub mod logging;
pub mod paths;
pub mod secrets;

pub use config::{Config, ConfigError, LogLevel, LoggingConfig, ServerConfig, ValidationError};
pub use logging::{init_logging, LoggingError, LoggingGuard};
pub use paths::{AppDirs, DirsError};
pub use secrets::{CredentialStore, SecretsError, SecretsResult};

pub const APP_NAME: &str = "pmpd";
pub const APP_AUTHOR: &str = "Pmpd";
pub const APP_QUALIFIER: &str = "io";
