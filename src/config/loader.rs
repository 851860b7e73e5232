use std::path::{Path, PathBuf};

use crate::error::ConfigError;

use super::types::AgentConfig;
use super::{AGENT_CONFIG_ENV, DEFAULT_AGENT_CONFIG_PATH};

/// Resolves the agent config path from `PERFOLIZER_AGENT_CONFIG`, falling
/// back to `config/agent.json`.
#[must_use]
pub fn resolve_agent_config_path() -> PathBuf {
    match std::env::var(AGENT_CONFIG_ENV) {
        Ok(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from(DEFAULT_AGENT_CONFIG_PATH),
    }
}

/// Loads the agent configuration. A missing file yields defaults.
///
/// # Errors
///
/// Returns an error when the file exists but cannot be read or parsed, or
/// when the parsed configuration fails validation.
pub fn load_agent_config(path: &Path) -> Result<AgentConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(AgentConfig::default());
        }
        Err(err) => {
            return Err(ConfigError::ReadConfig {
                path: path.to_path_buf(),
                source: err,
            });
        }
    };

    let mut cfg: AgentConfig =
        serde_json::from_str(&content).map_err(|err| ConfigError::ParseJson {
            path: path.to_path_buf(),
            source: err,
        })?;

    cfg.apply_defaults();
    cfg.remote_restart_token = cfg.remote_restart_token.trim().to_owned();
    cfg.remote_restart_command = cfg.remote_restart_command.trim().to_owned();
    cfg.validate()?;

    Ok(cfg)
}
