/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: src/error.rs
 *
 * The error taxonomy for the remediation engine: ConfigError is the only
 * fatal, startup-only variant. Everything else is a per-request fault the
 * orchestrator logs and continues past.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Fatal, startup-only: missing auth secret, unknown auth mode, invalid
    /// log level, unreachable cluster client.
    #[error("configuration error: {0}")]
    Config(String),

    /// No Operarius matches the incoming hook. Not an error from the
    /// client's perspective.
    #[error("no rule matches alert '{alertname}' with status '{status}'")]
    NoMatch { alertname: String, status: String },

    /// Template parse/execute failure while building a Job.
    #[error("failed to build job (field '{field}'): {cause}")]
    Build { field: String, cause: String },

    /// Transient cluster API failure.
    #[error("cluster error: {0}")]
    Cluster(String),

    /// Status patch failed; logged-and-dropped by callers, never fatal.
    #[error("status update error: {0}")]
    StatusUpdate(String),
}

impl From<kube::Error> for Error {
    fn from(e: kube::Error) -> Self {
        Error::Cluster(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
