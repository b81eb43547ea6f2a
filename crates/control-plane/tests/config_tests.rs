use control_plane::{ConfigError, SystemConfigLoader};

#[test]
fn config_loader_accepts_valid_keys() {
    let input = r#"
[storage]
sled_path = "alerting.sled"
[spaces]
default_space_id = "main"
[security]
enabled = true
api_keys_enabled = false
timeout_ms = 500
"#;
    let config = SystemConfigLoader::from_str(input).expect("config");
    assert_eq!(config.get_string("storage.sled_path"), "alerting.sled");
    assert_eq!(config.get_string("spaces.default_space_id"), "main");
    assert_eq!(config.get_number("security.timeout_ms"), 500);
    assert!(config.get_bool("security.enabled"));
    assert!(!config.get_bool("security.api_keys_enabled"));
}

#[test]
fn config_defaults_come_from_static_table() {
    let config = SystemConfigLoader::from_str("").expect("config");
    assert_eq!(config.get_string("security.internal_user"), "alerting_system");
    assert_eq!(config.get_string("spaces.default_space_id"), "default");
    assert!(config.get_bool("security.api_keys_enabled"));
    assert_eq!(config.get_non_empty("security.cluster_url"), None);
    assert_eq!(config.get_path("actions.preconfigured_file"), None);
}

#[test]
fn config_loader_rejects_unknown_key() {
    let input = r#"
unknown = { value = "x" }
"#;
    let err = SystemConfigLoader::from_str(input).expect_err("error");
    match err {
        ConfigError::UnknownKey(key) => assert_eq!(key, "unknown.value"),
        _ => panic!("expected unknown key error"),
    }
}

#[test]
fn config_loader_rejects_type_mismatch() {
    let input = r#"
security = { timeout_ms = "x" }
"#;
    let err = SystemConfigLoader::from_str(input).expect_err("error");
    match err {
        ConfigError::TypeMismatch(key, expected) => {
            assert_eq!(key, "security.timeout_ms");
            assert_eq!(expected, "number");
        }
        _ => panic!("expected type mismatch"),
    }
}

#[test]
fn config_loader_rejects_arrays() {
    let err = SystemConfigLoader::from_str("spaces = { default_space_id = [\"a\"] }")
        .expect_err("error");
    assert!(matches!(err, ConfigError::TypeMismatch(key, _) if key == "spaces.default_space_id"));
}
