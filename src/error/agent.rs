use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("test is already running")]
    AlreadyRunning,
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}
