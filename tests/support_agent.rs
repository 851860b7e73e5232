//! Shared helpers for agent end-to-end tests: an in-process agent bound to
//! an ephemeral port and stub target servers to sample against.

use std::net::SocketAddr;

use axum::routing::{any, get};
use axum::Router;

use perfolizer::agent::{router, AgentServer, ServerOptions};

/// Binds the agent control plane on an ephemeral loopback port and serves
/// it in the background. Returns the base URL.
pub async fn spawn_agent(options: ServerOptions) -> Result<String, String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|err| format!("bind agent listener failed: {}", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("agent local_addr failed: {}", err))?;

    let server = AgentServer::new(options);
    let app = router(server).into_make_service_with_connect_info::<SocketAddr>();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(format!("http://{addr}"))
}

/// Stub target returning a fixed body with status 200 on every path.
pub async fn spawn_stub(body: &'static str) -> Result<String, String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|err| format!("bind stub listener failed: {}", err))?;
    let addr = listener
        .local_addr()
        .map_err(|err| format!("stub local_addr failed: {}", err))?;

    let app = Router::new()
        .route("/", any(move || async move { body }))
        .route("/healthz", get(|| async { "ok" }));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(format!("http://{addr}"))
}

/// Minimal plan: one single-user, single-iteration group pausing briefly.
pub fn pause_plan(pause_ms: u64) -> serde_json::Value {
    serde_json::json!({
        "type": "TestPlan",
        "name": "e2e-pause",
        "children": [{
            "type": "SimpleThreadGroup",
            "name": "g",
            "props": {"Users": 1, "Iterations": 1},
            "children": [{
                "type": "PauseController",
                "name": "p",
                "props": {"DurationMS": pause_ms}
            }]
        }]
    })
}
