use std::io::Write;

use tempfile::NamedTempFile;

use super::*;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp config");
    file.write_all(content.as_bytes()).expect("write config");
    file
}

#[test]
fn missing_file_yields_defaults() {
    let cfg = load_agent_config(std::path::Path::new("/nonexistent/agent.json"))
        .expect("defaults for missing file");
    assert_eq!(cfg.listen_host, "127.0.0.1");
    assert_eq!(cfg.port, 9090);
    assert_eq!(cfg.ui_poll_interval_seconds, 15);
    assert!(!cfg.enable_remote_restart);
}

#[test]
fn partial_file_fills_defaults() {
    let file = write_config(r#"{ "port": 8080 }"#);
    let cfg = load_agent_config(file.path()).expect("load partial config");
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.listen_host, "127.0.0.1");
    assert_eq!(cfg.ui_poll_interval_seconds, 15);
}

#[test]
fn zero_port_falls_back_to_default() {
    let file = write_config(r#"{ "port": 0 }"#);
    let cfg = load_agent_config(file.path()).expect("load config");
    assert_eq!(cfg.port, 9090);
}

#[test]
fn invalid_json_is_an_error() {
    let file = write_config("{ not json");
    assert!(load_agent_config(file.path()).is_err());
}

#[test]
fn restart_fields_are_trimmed() {
    let file = write_config(
        r#"{ "enable_remote_restart": true,
             "remote_restart_token": "  t  ",
             "remote_restart_command": " systemctl restart perfolizer " }"#,
    );
    let cfg = load_agent_config(file.path()).expect("load config");
    assert!(cfg.enable_remote_restart);
    assert_eq!(cfg.remote_restart_token, "t");
    assert_eq!(cfg.remote_restart_command, "systemctl restart perfolizer");
}

#[test]
fn ui_host_maps_wildcard_to_loopback() {
    let mut cfg = AgentConfig::default();
    cfg.listen_host = "0.0.0.0".to_owned();
    assert_eq!(cfg.ui_host(), "127.0.0.1");
    assert_eq!(cfg.base_url(), "http://127.0.0.1:9090");

    cfg.ui_connect_host = Some("agent.internal".to_owned());
    assert_eq!(cfg.ui_host(), "agent.internal");
}

#[test]
fn listen_addr_joins_host_and_port() {
    let cfg = AgentConfig::default();
    assert_eq!(cfg.listen_addr(), "127.0.0.1:9090");
}

#[test]
fn poll_interval_zero_in_file_falls_back() {
    let file = write_config(r#"{ "ui_poll_interval_seconds": 0 }"#);
    let cfg = load_agent_config(file.path()).expect("load config");
    assert_eq!(cfg.ui_poll_interval_seconds, 15);
}
