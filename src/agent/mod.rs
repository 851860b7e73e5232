//! Agent control plane: the HTTP surface driving runs, streaming metrics,
//! debugging single requests, and gating remote restarts.

mod debug_http;
mod handlers;
mod prometheus;
mod restart;
mod server;

#[cfg(test)]
mod tests;

pub use debug_http::{DebugHttpExchange, DebugHttpRequest, DebugHttpResponse};
pub use handlers::{router, ADMIN_TOKEN_HEADER};
pub use prometheus::render_metrics;
pub use server::{AgentServer, ServerOptions};
