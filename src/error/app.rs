use thiserror::Error;

use super::{AgentError, ConfigError, ExecError, PlanError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
    #[error("HTTP client error: {source}")]
    Reqwest {
        #[from]
        source: reqwest::Error,
    },
    #[error("Join error: {source}")]
    Join {
        #[from]
        source: tokio::task::JoinError,
    },
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),
    #[error("Execution error: {0}")]
    Exec(#[from] ExecError),
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn config<E>(error: E) -> Self
    where
        E: Into<ConfigError>,
    {
        error.into().into()
    }

    pub fn plan<E>(error: E) -> Self
    where
        E: Into<PlanError>,
    {
        error.into().into()
    }

    pub fn exec<E>(error: E) -> Self
    where
        E: Into<ExecError>,
    {
        error.into().into()
    }

    pub fn agent<E>(error: E) -> Self
    where
        E: Into<AgentError>,
    {
        error.into().into()
    }
}
