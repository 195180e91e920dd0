//! Integration tests for node configuration loading.

use std::io::Write;

use virald_node::cli::Args;
use virald_node::config::Config;

/// Test configuration loading from YAML.
#[test]
fn test_config_yaml_parsing() {
    let yaml = r#"
server:
  listen_address: 127.0.0.1:9191

control_plane:
  api_url: http://control-plane:8080
  node_address: 10.0.0.7:9191
  registration_enabled: false

providers:
  data_dir: /var/lib/virald/vm-data
  docker_base_port: 18006
  preferred: docker
"#;

    let config = Config::from_yaml(yaml).expect("Failed to parse YAML");

    assert_eq!(config.server.listen_address, "127.0.0.1:9191");
    assert_eq!(config.control_plane.api_url, "http://control-plane:8080");
    assert_eq!(config.control_plane.node_address, "10.0.0.7:9191");
    assert!(!config.control_plane.registration_enabled);
    assert_eq!(config.providers.docker_base_port, 18006);
    // Unset fields keep their defaults
    assert_eq!(config.providers.utm_base_port, 5900);
    assert_eq!(config.providers.preferred.as_deref(), Some("docker"));

    let settings = config.providers.settings();
    assert_eq!(settings.data_dir.to_str(), Some("/var/lib/virald/vm-data"));
    assert_eq!(settings.docker_base_port, 18006);
}

/// Test that an empty document yields defaults.
#[test]
fn test_empty_config_uses_defaults() {
    let config = Config::from_yaml("{}").unwrap();
    assert_eq!(config.server.listen_address, "0.0.0.0:9090");
    assert!(config.control_plane.registration_enabled);
    assert!(config.providers.settings().data_dir.ends_with("vm-data"));
}

/// Test loading from disk with CLI overrides on top.
#[test]
fn test_load_file_with_overrides() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "control_plane:\n  api_url: http://from-file:8080").unwrap();

    let args = Args {
        api_url: Some("http://from-cli:8080".to_string()),
        utmctl: Some("/opt/utm/utmctl".to_string()),
        ..Default::default()
    };

    let config = Config::load(file.path()).unwrap().with_cli_overrides(&args);
    assert_eq!(config.control_plane.api_url, "http://from-cli:8080");
    assert_eq!(config.providers.utmctl_path.as_deref(), Some("/opt/utm/utmctl"));
}

/// Test that malformed YAML is rejected.
#[test]
fn test_invalid_yaml() {
    assert!(Config::from_yaml("server: [unclosed").is_err());
}
