/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: src/main.rs
 *
 * Entry point for the OpenFero remediation engine: initialize telemetry,
 * initialize the Kubernetes client, build the shared context, then run
 * every long-lived task concurrently. This binary is deliberately thin —
 * it only wires library pieces together; the logic lives in `openfero::*`.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::service::make_service_fn;
use kube::Client;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use openfero::alert_store::AlertStore;
use openfero::auth::WebhookAuth;
use openfero::config::{LogFormat, Settings};
use openfero::gateway::{ClusterGateway, KubeGateway};
use openfero::http::{self, AppState};
use openfero::job_watcher::JobWatcher;
use openfero::live_hub::LiveUpdateHub;
use openfero::orchestrator::RemediationOrchestrator;
use openfero::rule_cache::RuleCache;

fn init_telemetry(settings: &Settings) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(&settings.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match settings.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init()?,
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer().pretty()).try_init()?,
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_telemetry(&settings)?;
    info!("telemetry initialized");

    let auth = Arc::new(WebhookAuth::from_settings(&settings)?);

    let client = Client::try_default().await?;
    let gateway: Arc<dyn ClusterGateway> = Arc::new(KubeGateway::new(client));

    let cancel = CancellationToken::new();

    let rule_cache = Arc::new(
        RuleCache::initialize(gateway.clone(), settings.namespace.clone(), cancel.clone()).await,
    );
    info!(namespace = %settings.namespace, "rule cache synced");

    let alert_store = Arc::new(AlertStore::new(settings.alert_store_capacity));
    let live_hub = Arc::new(LiveUpdateHub::new());

    let orchestrator = Arc::new(RemediationOrchestrator::new(
        settings.namespace.clone(),
        gateway.clone(),
        rule_cache.clone(),
        alert_store.clone(),
        live_hub.clone(),
    ));

    let job_watcher = JobWatcher::new(
        settings.namespace.clone(),
        gateway.clone(),
        rule_cache.clone(),
        live_hub.clone(),
    );

    let state = Arc::new(AppState {
        orchestrator,
        alert_store: alert_store.clone(),
        rule_cache: rule_cache.clone(),
        live_hub: live_hub.clone(),
        gateway: gateway.clone(),
        auth,
        read_timeout: Duration::from_secs(settings.read_timeout_secs),
    });

    let addr: SocketAddr = settings
        .http_addr
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid OPENFERO_HTTP_ADDR '{}': {e}", settings.http_addr))?;

    // warp's own `serve(...).run(addr)` has no timeout knobs at all, so the
    // filter chain is driven as a plain tower::Service instead, wrapped in a
    // TimeoutLayer enforcing the configured write deadline across every
    // route (the read deadline is enforced further down, around the ingest
    // body specifically; see http.rs).
    let warp_service = warp::service(http::routes(state));
    let service = ServiceBuilder::new()
        .layer(TimeoutLayer::new(Duration::from_secs(
            settings.write_timeout_secs,
        )))
        .service(warp_service);
    let make_service = make_service_fn(move |_conn| {
        let service = service.clone();
        async move { Ok::<_, Infallible>(service) }
    });

    info!(%addr, "starting http server");
    let server = hyper::Server::bind(&addr).serve(make_service);

    tokio::select! {
        result = server => {
            if let Err(err) = result {
                warn!(error = %err, "http server task failed");
            } else {
                warn!("http server task unexpectedly exited");
            }
        }
        _ = job_watcher.run(cancel.clone()) => warn!("job watcher task unexpectedly exited"),
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
            cancel.cancel();
        }
    }

    alert_store.close().await;
    info!("openfero shutting down");
    Ok(())
}
