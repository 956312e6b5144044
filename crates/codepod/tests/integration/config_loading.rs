use codepod::config::{Config, ConfigError};

use super::FIXTURES_PATH;

#[test]
fn test_load_valid_config() {
    let path = format!("{}/configs/valid_full.toml", FIXTURES_PATH);
    let config = Config::from_file(&path).expect("Failed to load config");

    assert!(config.languages.contains_key("python"));
    assert!(config.languages.contains_key("c"));
    assert_eq!(config.limits.timeout_ms, Some(5000));
    assert_eq!(config.max_concurrent_executions, 8);
    assert!(config.docker.auto_remove);
    assert_eq!(config.bounds.max_input_length, 5000);

    let options = config.execution_options();
    assert_eq!(options.memory_limit, "256m");
    assert_eq!(options.max_processes, 64);
}

#[test]
fn test_load_minimal_config() {
    let path = format!("{}/configs/valid_minimal.toml", FIXTURES_PATH);
    let config = Config::from_file(&path).expect("Failed to load config");

    assert!(config.languages.contains_key("shell"));
    assert_eq!(config.execution_options().timeout_ms, 10_000);
    assert!(!config.docker.auto_remove);
}

#[test]
fn test_load_invalid_configs() {
    for name in [
        "invalid_empty_name",
        "invalid_empty_image",
        "invalid_empty_run_command",
        "invalid_filename",
        "invalid_zero_timeout",
    ] {
        let path = format!("{FIXTURES_PATH}/configs/{name}.toml");
        let result = Config::from_file(&path);
        assert!(
            matches!(result, Err(ConfigError::Invalid(_))),
            "{name} should be rejected, got {result:?}"
        );
    }
}

#[test]
fn test_load_nonexistent_file() {
    let result = Config::from_file("/nonexistent/path/config.toml");
    assert!(result.is_err());
}
