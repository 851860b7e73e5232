use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("execution cancelled")]
    Cancelled,
    #[error("Invalid HTTP method '{method}'")]
    InvalidMethod { method: String },
}

impl ExecError {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExecError::Cancelled)
    }
}
