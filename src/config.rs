/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: src/config.rs
 *
 * Environment-variable configuration, assembled with the same plain
 * `std::env::var(...).unwrap_or_else(...)` style used elsewhere for
 * resolving endpoint addresses. `Settings::load` is the one function
 * allowed to fail fatally at startup (ConfigError).
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use crate::error::Error;

#[derive(Clone, Debug)]
pub struct Settings {
    pub namespace: String,
    pub alert_store_capacity: usize,
    pub auth_mode: String,
    pub auth_username: Option<String>,
    pub auth_password: Option<String>,
    pub auth_bearer_token: Option<String>,
    pub http_addr: String,
    pub read_timeout_secs: u64,
    pub write_timeout_secs: u64,
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl Settings {
    pub fn load() -> Result<Self, Error> {
        let alert_store_capacity = env_or("OPENFERO_ALERTSTORE_CAPACITY", "1000")
            .parse::<usize>()
            .map_err(|e| Error::Config(format!("invalid OPENFERO_ALERTSTORE_CAPACITY: {e}")))?;
        let read_timeout_secs = env_or("OPENFERO_READ_TIMEOUT_SECS", "5")
            .parse::<u64>()
            .map_err(|e| Error::Config(format!("invalid OPENFERO_READ_TIMEOUT_SECS: {e}")))?;
        let write_timeout_secs = env_or("OPENFERO_WRITE_TIMEOUT_SECS", "10")
            .parse::<u64>()
            .map_err(|e| Error::Config(format!("invalid OPENFERO_WRITE_TIMEOUT_SECS: {e}")))?;

        let log_level = env_or("OPENFERO_LOG_LEVEL", "info");
        validate_log_level(&log_level)?;

        let log_format = match env_or("OPENFERO_LOG_FORMAT", "json").as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            other => {
                return Err(Error::Config(format!(
                    "invalid OPENFERO_LOG_FORMAT '{other}', expected 'json' or 'pretty'"
                )))
            }
        };

        Ok(Self {
            namespace: env_or("OPENFERO_NAMESPACE", "openfero"),
            alert_store_capacity,
            auth_mode: env_or("OPENFERO_AUTH_MODE", "none"),
            auth_username: std::env::var("OPENFERO_AUTH_USERNAME").ok(),
            auth_password: std::env::var("OPENFERO_AUTH_PASSWORD").ok(),
            auth_bearer_token: std::env::var("OPENFERO_AUTH_TOKEN").ok(),
            http_addr: env_or("OPENFERO_HTTP_ADDR", "0.0.0.0:8080"),
            read_timeout_secs,
            write_timeout_secs,
            log_level,
            log_format,
        })
    }

    #[cfg(test)]
    pub fn defaults_for_test() -> Self {
        Self {
            namespace: "openfero".to_string(),
            alert_store_capacity: 1000,
            auth_mode: "none".to_string(),
            auth_username: None,
            auth_password: None,
            auth_bearer_token: None,
            http_addr: "0.0.0.0:8080".to_string(),
            read_timeout_secs: 5,
            write_timeout_secs: 10,
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn validate_log_level(level: &str) -> Result<(), Error> {
    const VALID: &[&str] = &["trace", "debug", "info", "warn", "error"];
    if VALID.contains(&level) {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "invalid OPENFERO_LOG_LEVEL '{level}', expected one of {VALID:?}"
        )))
    }
}
