/*
 * Copyright (C) 2025 Pedro Henrique / phkaiser13
 *
 * File: src/http.rs
 *
 * The embedded HTTP surface: seven routes wired with `warp`, using a
 * filter-injection idiom to thread shared state into each handler. Each
 * route is a thin adapter over a core function — no business logic lives
 * here.
 *
 * SPDX-License-Identifier: Apache-2.0
 */

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use futures::{SinkExt, Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::time::{interval, sleep, Instant};
use tracing::{info, warn};
use warp::http::StatusCode;
use warp::{Filter, Reply};

use crate::alert_store::AlertStore;
use crate::auth::WebhookAuth;
use crate::gateway::ClusterGateway;
use crate::live_hub::LiveUpdateHub;
use crate::orchestrator::RemediationOrchestrator;
use crate::rule_cache::RuleCache;
use crate::types::HookMessage;

pub struct AppState {
    pub orchestrator: Arc<RemediationOrchestrator>,
    pub alert_store: Arc<AlertStore>,
    pub rule_cache: Arc<RuleCache>,
    pub live_hub: Arc<LiveUpdateHub>,
    pub gateway: Arc<dyn ClusterGateway>,
    pub auth: Arc<WebhookAuth>,
    /// Deadline for reading and parsing the ingest webhook body; the write
    /// deadline is enforced one layer up, around the whole service (see
    /// `main.rs`).
    pub read_timeout: Duration,
}

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

type BoxedReply = Box<dyn Reply>;

pub fn routes(state: Arc<AppState>) -> warp::filters::BoxedFilter<(BoxedReply,)> {
    let read_timeout = state.read_timeout;
    let ingest = warp::post()
        .and(warp::path("alerts"))
        .and(warp::path::end())
        .and(warp::header::optional::<String>("authorization"))
        .and(json_body_with_read_timeout::<HookMessage>(read_timeout))
        .and(with_state(state.clone()))
        .and_then(handle_ingest)
        .recover(recover_ingest_rejection)
        .unify()
        .boxed();

    let alerts_liveness = warp::get()
        .and(warp::path("alerts"))
        .and(warp::path::end())
        .map(|| reply_box(warp::reply::with_status("OK", StatusCode::OK)))
        .boxed();

    let alert_store_query = warp::get()
        .and(warp::path("alertStore"))
        .and(warp::path::end())
        .and(warp::query::<AlertStoreQuery>())
        .and(with_state(state.clone()))
        .and_then(handle_alert_store_query)
        .boxed();

    let jobs = warp::get()
        .and(warp::path!("api" / "jobs"))
        .and(with_state(state.clone()))
        .and_then(handle_jobs)
        .boxed();

    let ws = warp::get()
        .and(warp::path!("api" / "ws"))
        .and(warp::ws())
        .and(with_state(state.clone()))
        .map(|ws: warp::ws::Ws, state: Arc<AppState>| {
            reply_box(ws.on_upgrade(move |socket| handle_ws(socket, state)))
        })
        .boxed();

    let healthz = warp::get()
        .and(warp::path("healthz"))
        .map(|| reply_box(warp::reply::with_status("ok", StatusCode::OK)))
        .boxed();

    let readiness = warp::get()
        .and(warp::path("readiness"))
        .and(with_state(state))
        .and_then(handle_readiness)
        .boxed();

    ingest
        .or(alerts_liveness)
        .unify()
        .or(alert_store_query)
        .unify()
        .or(jobs)
        .unify()
        .or(ws)
        .unify()
        .or(healthz)
        .unify()
        .or(readiness)
        .unify()
        .boxed()
}

fn reply_box(reply: impl Reply + 'static) -> BoxedReply {
    Box::new(reply)
}

#[derive(Debug)]
struct BodyReadTimeout;
impl warp::reject::Reject for BodyReadTimeout {}

#[derive(Debug)]
struct InvalidJsonBody;
impl warp::reject::Reject for InvalidJsonBody {}

/// A `warp::body::json()` stand-in that bounds how long the client may take
/// to finish sending the body. `warp::body::json()`/`bytes()` fully collect
/// the body inside their own filter step, which makes them unreachable to an
/// outer timeout once chained with `.and_then()`; `warp::body::stream()`
/// hands back the unconsumed stream instead, so the read loop below is the
/// part actually waiting on the socket.
fn json_body_with_read_timeout<T>(
    timeout: Duration,
) -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone
where
    T: DeserializeOwned + Send + 'static,
{
    warp::body::stream()
        .and_then(move |body| read_body_bytes(body, timeout))
        .and_then(|bytes: Bytes| async move {
            serde_json::from_slice::<T>(&bytes).map_err(|_| warp::reject::custom(InvalidJsonBody))
        })
}

async fn read_body_bytes<S, B>(mut body: S, timeout: Duration) -> Result<Bytes, warp::Rejection>
where
    S: Stream<Item = Result<B, warp::Error>> + Unpin,
    B: Buf,
{
    let collect = async {
        let mut collected = BytesMut::new();
        while let Some(chunk) = body.next().await {
            let mut chunk = chunk.map_err(|_| warp::reject::custom(InvalidJsonBody))?;
            while chunk.has_remaining() {
                let bytes = chunk.chunk();
                collected.extend_from_slice(bytes);
                let n = bytes.len();
                chunk.advance(n);
            }
        }
        Ok(collected.freeze())
    };

    match tokio::time::timeout(timeout, collect).await {
        Ok(result) => result,
        Err(_) => Err(warp::reject::custom(BodyReadTimeout)),
    }
}

async fn recover_ingest_rejection(err: warp::Rejection) -> Result<BoxedReply, warp::Rejection> {
    if err.find::<BodyReadTimeout>().is_some() {
        Ok(reply_box(warp::reply::with_status(
            "request body read timed out",
            StatusCode::REQUEST_TIMEOUT,
        )))
    } else if err.find::<InvalidJsonBody>().is_some() {
        Ok(reply_box(warp::reply::with_status(
            "invalid request body",
            StatusCode::BAD_REQUEST,
        )))
    } else {
        Err(err)
    }
}

async fn handle_ingest(
    authorization: Option<String>,
    hook: HookMessage,
    state: Arc<AppState>,
) -> Result<BoxedReply, Infallible> {
    if let Err(challenge) = state.auth.check(authorization.as_deref()) {
        return Ok(reply_box(warp::reply::with_header(
            warp::reply::with_status("unauthorized", StatusCode::UNAUTHORIZED),
            "WWW-Authenticate",
            challenge.0,
        )));
    }

    info!(group_key = %hook.group_key, status = %hook.status, "ingested alert webhook");
    state.orchestrator.handle(hook).await;
    Ok(reply_box(warp::reply::with_status(
        "accepted",
        StatusCode::ACCEPTED,
    )))
}

#[derive(Deserialize)]
struct AlertStoreQuery {
    #[serde(default)]
    q: String,
}

const ALERT_STORE_QUERY_LIMIT: usize = 100;

async fn handle_alert_store_query(
    query: AlertStoreQuery,
    state: Arc<AppState>,
) -> Result<BoxedReply, Infallible> {
    let entries = state
        .alert_store
        .query(&query.q, ALERT_STORE_QUERY_LIMIT)
        .await;
    Ok(reply_box(warp::reply::json(&entries)))
}

async fn handle_jobs(state: Arc<AppState>) -> Result<BoxedReply, Infallible> {
    let rules = state.rule_cache.list();
    Ok(reply_box(warp::reply::json(&rules)))
}

async fn handle_readiness(state: Arc<AppState>) -> Result<BoxedReply, Infallible> {
    match state.gateway.server_version().await {
        Ok(_) => Ok(reply_box(warp::reply::with_status("ready", StatusCode::OK))),
        Err(err) => {
            warn!(error = %err, "readiness probe failed");
            Ok(reply_box(warp::reply::with_status(
                "not ready",
                StatusCode::SERVICE_UNAVAILABLE,
            )))
        }
    }
}

/// How often an idle subscriber is pinged to confirm it is still reading.
const PING_INTERVAL: Duration = Duration::from_secs(60);
/// How long a subscriber has to answer a ping with a pong before it is dropped.
const PONG_GRACE: Duration = Duration::from_secs(10);

async fn handle_ws(socket: warp::ws::WebSocket, state: Arc<AppState>) {
    let (mut tx, mut rx) = socket.split();
    let mut queue = state.live_hub.subscribe().await;

    state
        .live_hub
        .publish("connected", serde_json::json!({}))
        .await;

    let mut ping_tick = interval(PING_INTERVAL);
    ping_tick.tick().await;
    let mut awaiting_pong = false;
    let pong_deadline = sleep(PONG_GRACE);
    tokio::pin!(pong_deadline);

    loop {
        tokio::select! {
            event = queue.recv() => {
                match event {
                    Some(event) => {
                        let payload = serde_json::to_string(&event).unwrap_or_default();
                        if tx.send(warp::ws::Message::text(payload)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = rx.next() => {
                match incoming {
                    Some(Ok(msg)) if msg.is_close() => break,
                    Some(Ok(msg)) if msg.is_pong() => {
                        awaiting_pong = false;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(_)) | None => break,
                }
            }
            _ = ping_tick.tick() => {
                if awaiting_pong {
                    warn!("websocket subscriber missed its pong, dropping connection");
                    break;
                }
                if tx.send(warp::ws::Message::ping(Vec::new())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
                pong_deadline.as_mut().reset(Instant::now() + PONG_GRACE);
            }
            _ = &mut pong_deadline, if awaiting_pong => {
                warn!("websocket subscriber did not respond to ping within the grace period, dropping connection");
                break;
            }
        }
    }
}
