//! Server configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::auth::DEFAULT_JWT_SECRET;
use crate::documents::common::get_static_dir;
use crate::editor::{DEFAULT_DEBOUNCE, MAX_LIST_ITEMS};

const DEFAULT_ORIGINS: [&str; 3] = [
    "http://localhost:5173",
    "http://localhost:3000",
    "http://127.0.0.1:8080",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be a non-negative integer, got '{value}'")]
    InvalidNumber { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_address: String,
    pub port: u16,
    pub jwt_secret: String,
    pub preview_debounce: Duration,
    pub template_dir: PathBuf,
    pub typst_bin: PathBuf,
    pub session_idle: Duration,
    pub max_list_items: usize,
    pub allowed_origins: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            preview_debounce: DEFAULT_DEBOUNCE,
            template_dir: get_static_dir().join("templates"),
            typst_bin: PathBuf::from("typst"),
            session_idle: Duration::from_secs(30 * 60),
            max_list_items: MAX_LIST_ITEMS,
            allowed_origins: DEFAULT_ORIGINS.iter().map(|o| o.to_string()).collect(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable lookup; unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(address) = lookup("BIND_ADDRESS") {
            config.bind_address = address;
        }
        if let Some(port) = lookup("PORT") {
            config.port = parse_number("PORT", &port)?;
        }
        match lookup("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => config.jwt_secret = secret,
            _ => log::warn!("JWT_SECRET not set, using default secret. SET THIS IN PRODUCTION!"),
        }
        if let Some(ms) = lookup("PREVIEW_DEBOUNCE_MS") {
            config.preview_debounce =
                Duration::from_millis(parse_number("PREVIEW_DEBOUNCE_MS", &ms)?);
        }
        if let Some(dir) = lookup("TEMPLATE_DIR") {
            config.template_dir = PathBuf::from(dir);
        }
        if let Some(bin) = lookup("TYPST_BIN") {
            config.typst_bin = PathBuf::from(bin);
        }
        if let Some(secs) = lookup("SESSION_IDLE_SECS") {
            config.session_idle = Duration::from_secs(parse_number("SESSION_IDLE_SECS", &secs)?);
        }
        if let Some(max) = lookup("MAX_LIST_ITEMS") {
            config.max_list_items = parse_number("MAX_LIST_ITEMS", &max)?;
        }
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            config.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
        }

        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        name,
        value: value.to_string(),
    })
}
