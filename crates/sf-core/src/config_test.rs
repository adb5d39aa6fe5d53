use super::*;

#[test]
fn test_parse_minimal_config() {
    let config: Config = serde_yaml::from_str("name: test_project").unwrap();
    assert_eq!(config.name, "test_project");
    assert_eq!(config.migrations_path, "migrations");
    assert_eq!(config.database.path, ":memory:");
    assert_eq!(config.version_table, "DatabaseVersion");
    assert!(config.schema.is_none());
    assert_eq!(config.lock_timeout(), Duration::from_secs(240));
    assert_eq!(config.command_timeout(), Some(Duration::from_secs(30)));

    let root = PathBuf::from("/tmp/test");
    assert_eq!(
        config.migrations_path_absolute(&root),
        root.join("migrations")
    );
}

#[test]
fn test_parse_full_config() {
    let yaml = r#"
name: billing
migrations_path: db/migrations
schema: ops
version_table: SchemaVersion
database:
  path: ./billing.duckdb
command_timeout_secs: 0
lock_timeout_secs: 10
targets:
  prod:
    database:
      path: /var/lib/billing/prod.duckdb
    schema: ops_prod
  staging:
    schema: ops_staging
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.schema.as_ref().unwrap().as_str(), "ops");
    assert_eq!(config.version_table, "SchemaVersion");
    assert_eq!(config.command_timeout(), None);
    assert_eq!(config.lock_timeout(), Duration::from_secs(10));

    let prod = config.get_database_config(Some("prod")).unwrap();
    assert_eq!(prod.path, "/var/lib/billing/prod.duckdb");
    let staging = config.get_database_config(Some("staging")).unwrap();
    assert_eq!(staging.path, "./billing.duckdb");

    assert_eq!(config.get_schema(Some("prod")).unwrap(), &"ops_prod");
    assert_eq!(config.get_schema(Some("staging")).unwrap(), &"ops_staging");
    assert_eq!(config.get_schema(None).unwrap(), &"ops");
}

#[test]
fn test_unknown_target_lists_available() {
    let yaml = r#"
name: app
targets:
  dev: {}
  prod: {}
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    let err = config.get_database_config(Some("qa")).unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("[E003]"));
    assert!(msg.contains("dev, prod"));
}

#[test]
fn test_invalid_schema_rejected_at_parse() {
    let result = serde_yaml::from_str::<Config>("name: app\nschema: \"ops; drop\"");
    assert!(result.is_err());
}

#[test]
fn test_unknown_field_rejected() {
    let result = serde_yaml::from_str::<Config>("name: app\nmigration_path: typo");
    assert!(result.is_err());
}

#[test]
fn test_load_from_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("stepflow.yml"), "name: from_dir\n").unwrap();
    let config = Config::load_from_dir(dir.path()).unwrap();
    assert_eq!(config.name, "from_dir");
}

#[test]
fn test_load_from_dir_yaml_extension() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("stepflow.yaml"), "name: yaml_ext\n").unwrap();
    let config = Config::load_from_dir(dir.path()).unwrap();
    assert_eq!(config.name, "yaml_ext");
}

#[test]
fn test_load_missing_config() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load_from_dir(dir.path()).unwrap_err();
    assert!(matches!(err, CoreError::ConfigNotFound { .. }));
}

#[test]
fn test_validate_rejects_empty_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stepflow.yml");
    std::fs::write(&path, "name: \"\"\n").unwrap();
    let err = Config::load(&path).unwrap_err();
    assert!(matches!(err, CoreError::ConfigInvalid { .. }));
}

#[test]
fn test_validate_rejects_empty_database_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stepflow.yml");
    std::fs::write(
        &path,
        "name: app\ntargets:\n  prod:\n    database:\n      path: \"  \"\n",
    )
    .unwrap();
    let err = Config::load(&path).unwrap_err();
    assert!(err.to_string().contains("prod"));
}

#[test]
fn test_validate_rejects_zero_lock_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stepflow.yml");
    std::fs::write(&path, "name: app\nlock_timeout_secs: 0\n").unwrap();
    assert!(Config::load(&path).is_err());
}

// These tests modify environment variables and must run serially
use serial_test::serial;

#[test]
#[serial]
fn test_resolve_target_cli_takes_precedence() {
    let original = std::env::var(TARGET_ENV_VAR).ok();
    std::env::set_var(TARGET_ENV_VAR, "staging");
    let result = Config::resolve_target(Some("prod"));
    assert_eq!(result, Some("prod".to_string()));
    match original {
        Some(v) => std::env::set_var(TARGET_ENV_VAR, v),
        None => std::env::remove_var(TARGET_ENV_VAR),
    }
}

#[test]
#[serial]
fn test_resolve_target_uses_env_var() {
    let original = std::env::var(TARGET_ENV_VAR).ok();
    std::env::set_var(TARGET_ENV_VAR, "staging");
    let result = Config::resolve_target(None);
    assert_eq!(result, Some("staging".to_string()));
    match original {
        Some(v) => std::env::set_var(TARGET_ENV_VAR, v),
        None => std::env::remove_var(TARGET_ENV_VAR),
    }
}

#[test]
#[serial]
fn test_resolve_target_none_when_not_set() {
    let original = std::env::var(TARGET_ENV_VAR).ok();
    std::env::remove_var(TARGET_ENV_VAR);
    assert_eq!(Config::resolve_target(None), None);
    if let Some(v) = original {
        std::env::set_var(TARGET_ENV_VAR, v);
    }
}
