//! Runtime configuration read from the environment
//!
//! `main` loads an optional `.env` file with dotenvy first, so every key can
//! come from either source.
//!
//! - `PORT` - Server port number (default: 8080)
//! - `DATABASE_URL` - Path to the document file (default: "database.json")
//! - `STORE_BACKEND` - `json` (default) or `redb`
//! - `JWT_SECRET` - HMAC secret for access tokens (required)
//! - `POLKA_KEY` - API key expected from the billing webhook (required)
//! - `STATIC_DIR` - Directory served under `/app` (default: "public"). Keep the
//!   document file outside of it.

use std::env;
use std::path::PathBuf;

use thiserror::Error;

use crate::database::BackendKind;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: PathBuf,
    pub backend: BackendKind,
    pub jwt_secret: String,
    pub polka_key: String,
    pub static_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup, e.g. a map in tests.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("PORT") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid { key: "PORT", value })?,
            None => 8080,
        };

        let backend = match lookup("STORE_BACKEND").as_deref() {
            None | Some("json") => BackendKind::Json,
            Some("redb") => BackendKind::Redb,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let required = |key: &'static str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        Ok(Self {
            port,
            database_path: lookup("DATABASE_URL")
                .unwrap_or_else(|| "database.json".to_string())
                .into(),
            backend,
            jwt_secret: required("JWT_SECRET")?,
            polka_key: required("POLKA_KEY")?,
            static_dir: lookup("STATIC_DIR").unwrap_or_else(|| "public".to_string()).into(),
        })
    }
}
