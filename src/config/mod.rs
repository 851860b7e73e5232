mod loader;
mod types;

#[cfg(test)]
mod tests;

pub use loader::{load_agent_config, resolve_agent_config_path};
pub use types::AgentConfig;

pub const DEFAULT_AGENT_CONFIG_PATH: &str = "config/agent.json";
pub const AGENT_CONFIG_ENV: &str = "PERFOLIZER_AGENT_CONFIG";
