//! Admin client configuration.
//!
//! Values come from the environment (a `.env` file is loaded first if
//! present). Only `API_BASE_URL` is required.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AdminError, Result};

pub const DEFAULT_API_PREFIX: &str = "/api/v1";
pub const DEFAULT_DATABASE_URL: &str = "sqlite:./ctadmin.db?mode=rwc";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration for talking to the platform backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Backend origin, e.g. `https://api.example.com`
    pub api_base_url: String,

    /// Path prefix of the versioned API
    pub api_prefix: String,

    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,

    /// Local SQLite store for the session and action journal
    pub database_url: String,

    /// Bearer token that overrides the stored session
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000".to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            api_token: None,
        }
    }
}

impl AdminConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        // A missing .env file is fine; the environment may already be set.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_base_url = non_empty("API_BASE_URL")
            .ok_or_else(|| AdminError::Config("API_BASE_URL not set".to_string()))?;

        let request_timeout_secs = match non_empty("ADMIN_REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                AdminError::Config(format!("Invalid ADMIN_REQUEST_TIMEOUT_SECS: {}", raw))
            })?,
            None => defaults.request_timeout_secs,
        };

        Ok(Self {
            api_base_url,
            api_prefix: non_empty("API_PREFIX").unwrap_or(defaults.api_prefix),
            request_timeout_secs,
            database_url: non_empty("ADMIN_DATABASE_URL").unwrap_or(defaults.database_url),
            api_token: non_empty("ADMIN_API_TOKEN"),
        })
    }

    /// Base URL all endpoint paths are appended to.
    pub fn api_root(&self) -> String {
        let base = self.api_base_url.trim_end_matches('/');
        let prefix = self.api_prefix.trim_matches('/');
        if prefix.is_empty() {
            base.to_string()
        } else {
            format!("{}/{}", base, prefix)
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_base_url_required() {
        let err = AdminConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, AdminError::Config("API_BASE_URL not set".to_string()));
    }

    #[test]
    fn test_defaults_applied() {
        let config =
            AdminConfig::from_lookup(lookup(&[("API_BASE_URL", "https://api.example.com/")]))
                .unwrap();

        assert_eq!(config.api_root(), "https://api.example.com/api/v1");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert!(config.api_token.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = AdminConfig::from_lookup(lookup(&[
            ("API_BASE_URL", "http://localhost:8080"),
            ("API_PREFIX", "/"),
            ("ADMIN_REQUEST_TIMEOUT_SECS", "5"),
            ("ADMIN_API_TOKEN", "tok"),
        ]))
        .unwrap();

        assert_eq!(config.api_root(), "http://localhost:8080");
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.api_token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_invalid_timeout() {
        let result = AdminConfig::from_lookup(lookup(&[
            ("API_BASE_URL", "http://localhost:8080"),
            ("ADMIN_REQUEST_TIMEOUT_SECS", "soon"),
        ]));
        assert!(matches!(result, Err(AdminError::Config(_))));
    }
}
