/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: src/lib.rs
 *
 * OpenFero core remediation engine library. The binary in `src/main.rs`
 * wires these modules into a running service: Kubernetes client, watch
 * caches, the remediation pipeline, and the embedded webhook server.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

pub mod alert_store;
pub mod auth;
pub mod config;
pub mod crds;
pub mod dedup;
pub mod error;
pub mod gateway;
pub mod http;
pub mod job_builder;
pub mod job_watcher;
pub mod live_hub;
pub mod matcher;
pub mod orchestrator;
pub mod rule_cache;
pub mod template;
pub mod types;

pub use error::{Error, Result};
