use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, DefaultBodyLimit, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::AgentError;
use crate::plan::parse_test_plan;

use super::debug_http::{perform_exchange, DebugHttpRequest};
use super::prometheus::render_metrics;
use super::restart::execute_restart_command;
use super::server::{normalize_plan_name, AgentServer};

const MAX_PLAN_BODY_BYTES: usize = 10 << 20;
const MAX_DEBUG_PAYLOAD_BYTES: usize = 2 << 20;
const MAX_RESTART_PAYLOAD_BYTES: usize = 8 << 10;

/// Header carrying the admin token for `/admin/restart`.
pub const ADMIN_TOKEN_HEADER: &str = "X-Perfolizer-Admin-Token";

/// Control-plane routes. Method routing yields 405 on wrong-method calls.
pub fn router(server: Arc<AgentServer>) -> Router {
    Router::new()
        .route(
            "/run",
            post(handle_run).layer(DefaultBodyLimit::max(MAX_PLAN_BODY_BYTES)),
        )
        .route("/stop", post(handle_stop))
        .route("/metrics", get(handle_metrics))
        .route("/healthz", get(handle_healthz))
        .route(
            "/debug/http",
            post(handle_debug_http).layer(DefaultBodyLimit::max(MAX_DEBUG_PAYLOAD_BYTES)),
        )
        .route(
            "/admin/restart",
            post(handle_restart).layer(DefaultBodyLimit::max(MAX_RESTART_PAYLOAD_BYTES)),
        )
        .with_state(server)
}

async fn handle_run(
    State(server): State<Arc<AgentServer>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> Response {
    let plan = match parse_test_plan(&body) {
        Ok(plan) => plan,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                format!("invalid test plan: {err}"),
            )
                .into_response();
        }
    };

    let plan_name = normalize_plan_name(plan.name());
    info!("run requested: from={} plan={:?}", addr, plan_name);

    match server.start(plan) {
        Ok(()) => (StatusCode::ACCEPTED, "started").into_response(),
        Err(err @ AgentError::AlreadyRunning) => {
            warn!(
                "run rejected: already running (from={} plan={:?})",
                addr, plan_name
            );
            (StatusCode::CONFLICT, err.to_string()).into_response()
        }
        Err(err) => {
            warn!("run failed: from={} plan={:?} err={}", addr, plan_name, err);
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

async fn handle_stop(
    State(server): State<Arc<AgentServer>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
) -> Response {
    info!("stop requested: from={}", addr);

    let (was_running, plan_name) = server.stop();
    if was_running {
        let plan_name = if plan_name.trim().is_empty() {
            "unknown".to_owned()
        } else {
            plan_name
        };
        info!("test stop signal sent: plan={:?}", plan_name);
    } else {
        info!("stop ignored: no running test");
    }

    (StatusCode::OK, "stopped").into_response()
}

async fn handle_metrics(State(server): State<Arc<AgentServer>>) -> Response {
    let (running, snapshot) = server.snapshot();
    let host = server.host_snapshot();
    let body = render_metrics(running, &snapshot, &host);

    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

async fn handle_healthz() -> Response {
    (StatusCode::OK, "ok").into_response()
}

async fn handle_debug_http(State(server): State<Arc<AgentServer>>, body: Bytes) -> Response {
    let debug_req: DebugHttpRequest = match serde_json::from_slice(&body) {
        Ok(debug_req) => debug_req,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                format!("invalid debug request payload: {err}"),
            )
                .into_response();
        }
    };

    let exchange = perform_exchange(server.debug_client(), debug_req).await;
    Json(exchange).into_response()
}

#[derive(Debug, Default, Deserialize)]
struct RestartRequest {
    #[serde(default)]
    command: String,
}

async fn handle_restart(
    State(server): State<Arc<AgentServer>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !server.enable_remote_restart {
        warn!("remote restart rejected: disabled (from={})", addr);
        return (StatusCode::FORBIDDEN, "remote restart is disabled").into_response();
    }

    if !server.restart_token.is_empty() {
        let provided = headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .unwrap_or_default();
        if provided != server.restart_token {
            warn!("remote restart rejected: invalid token (from={})", addr);
            return (StatusCode::UNAUTHORIZED, "invalid admin token").into_response();
        }
    }

    let payload = if body.iter().all(u8::is_ascii_whitespace) {
        RestartRequest::default()
    } else {
        match serde_json::from_slice::<RestartRequest>(&body) {
            Ok(payload) => payload,
            Err(err) => {
                return (
                    StatusCode::BAD_REQUEST,
                    format!("invalid restart payload: {err}"),
                )
                    .into_response();
            }
        }
    };

    let (command, source) = {
        let requested = payload.command.trim();
        if requested.is_empty() {
            (server.restart_command.clone(), "agent-config")
        } else {
            (requested.to_owned(), "request")
        }
    };

    if command.is_empty() {
        warn!("remote restart rejected: empty command (from={})", addr);
        return (StatusCode::BAD_REQUEST, "restart command is empty").into_response();
    }
    info!(
        "remote restart requested: from={} source={} command={:?}",
        addr, source, command
    );

    tokio::spawn(async move {
        execute_restart_command(&command).await;
    });

    (StatusCode::ACCEPTED, "restart scheduled").into_response()
}
