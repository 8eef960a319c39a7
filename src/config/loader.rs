//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: defaults, then the optional TOML file, then the
/// process environment, then validation.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    load_with_env(path, |var| std::env::var(var).ok())
}

/// Same as [`load_config`] with an injectable environment lookup.
pub fn load_with_env<F>(path: Option<&Path>, env: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => AppConfig::default(),
    };

    apply_env(&mut config, env)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Overlay recognized environment variables onto `config`.
pub fn apply_env<F>(config: &mut AppConfig, env: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = env("MONGO_URL") {
        config.database.url = url;
    }
    if let Some(name) = env("DB_NAME") {
        config.database.name = name;
    }
    if let Some(secret) = env("JWT_SECRET") {
        config.security.cookie_secret = secret;
    }
    if let Some(host) = env("HOST") {
        config.server.host = host;
    }
    if let Some(port) = env("PORT") {
        config.server.port = parse_var("PORT", port)?;
    }
    if let Some(hops) = env("TRUST_PROXY") {
        config.server.trust_proxy_hops = parse_var("TRUST_PROXY", hops)?;
    }
    if let Some(origins) = env("CORS_ORIGIN") {
        config.cors.allowed_origins = origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(String::from)
            .collect();
    }
    if let Some(dir) = env("PUBLIC_DIR") {
        config.assets.public_dir = PathBuf::from(dir);
    }
    if let Some(max) = env("RATE_LIMIT_MAX") {
        config.rate_limit.max_requests = parse_var("RATE_LIMIT_MAX", max)?;
    }
    if let Some(window) = env("RATE_LIMIT_WINDOW_SECS") {
        config.rate_limit.window_secs = parse_var("RATE_LIMIT_WINDOW_SECS", window)?;
    }
    if let Some(level) = env("LOG_LEVEL") {
        config.observability.log_level = level;
    }
    if let Some(addr) = env("METRICS_ADDRESS") {
        config.observability.metrics_address = Some(addr);
    }
    Ok(())
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Env { var, value })
}
