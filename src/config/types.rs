use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_LISTEN_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 9090;
const DEFAULT_POLL_SECONDS: u32 = 15;

/// Agent configuration as stored in `config/agent.json`.
///
/// Missing fields fall back to defaults so a partial (or absent) file is
/// always usable.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentConfig {
    pub listen_host: String,
    pub port: u16,
    pub ui_poll_interval_seconds: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ui_connect_host: Option<String>,
    pub enable_remote_restart: bool,
    pub remote_restart_token: String,
    pub remote_restart_command: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            listen_host: DEFAULT_LISTEN_HOST.to_owned(),
            port: DEFAULT_PORT,
            ui_poll_interval_seconds: DEFAULT_POLL_SECONDS,
            ui_connect_host: None,
            enable_remote_restart: false,
            remote_restart_token: String::new(),
            remote_restart_command: String::new(),
        }
    }
}

impl AgentConfig {
    pub(super) fn apply_defaults(&mut self) {
        if self.listen_host.is_empty() {
            self.listen_host = DEFAULT_LISTEN_HOST.to_owned();
        }
        if self.port == 0 {
            self.port = DEFAULT_PORT;
        }
        if self.ui_poll_interval_seconds == 0 {
            self.ui_poll_interval_seconds = DEFAULT_POLL_SECONDS;
        }
    }

    /// Validates the loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the port or poll interval is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort {
                port: u32::from(self.port),
            });
        }
        if self.ui_poll_interval_seconds == 0 {
            return Err(ConfigError::InvalidPollInterval);
        }
        Ok(())
    }

    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.listen_host, self.port)
    }

    /// Host the UI should dial. A wildcard listen host maps to loopback.
    #[must_use]
    pub fn ui_host(&self) -> &str {
        if let Some(host) = self.ui_connect_host.as_deref() {
            if !host.is_empty() {
                return host;
            }
        }
        if self.listen_host.is_empty() || self.listen_host == "0.0.0.0" {
            return "127.0.0.1";
        }
        &self.listen_host
    }

    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.ui_host(), self.port)
    }
}
