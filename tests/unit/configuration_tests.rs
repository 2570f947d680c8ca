// Configuration loading and adapter construction tests

use std::io::Write;
use storage_adapters::config::{BackendConfig, Config, LogFormat, TraversalDepth};
use storage_adapters::{ErrorKind, StorageAdapter};
use tempfile::NamedTempFile;

fn write_config(yaml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_local_backend_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = write_config(&format!(
        "backend:\n  type: local\n  base_directory: {}\nadapter:\n  traversal: two_level\nlogging:\n  format: json\n",
        dir.path().display()
    ));

    let config = Config::from_file(file.path()).unwrap();
    match &config.backend {
        BackendConfig::Local(local) => {
            assert_eq!(local.base_directory, dir.path().display().to_string());
            assert!(!local.allow_base_directory_escape);
        }
        other => panic!("Expected local backend, got {:?}", other),
    }
    assert_eq!(config.adapter.traversal, TraversalDepth::TwoLevel);
    assert_eq!(config.logging.format, LogFormat::Json);

    let adapter = StorageAdapter::from_config(&config).unwrap();
    assert_eq!(adapter.traversal(), TraversalDepth::TwoLevel);
    assert_eq!(adapter.separator(), std::path::MAIN_SEPARATOR);
}

#[test]
fn test_blob_backend_builds_with_defaults() {
    let file = write_config("backend:\n  type: blob\n  account_name: myaccount\n  account_key: c2VjcmV0\n");
    let config = Config::from_file(file.path()).unwrap();
    let adapter = StorageAdapter::from_config(&config).unwrap();
    assert_eq!(adapter.separator(), '/');
    assert!(adapter.service().native_recursive_delete());
}

#[test]
fn test_invalid_blob_key_is_a_configuration_error() {
    let config = Config::from_yaml_with_env(
        "backend:\n  type: blob\n  account_name: myaccount\n  account_key: '%%%'\n",
    )
    .unwrap();
    let err = StorageAdapter::from_config(&config).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn test_unknown_backend_type_is_rejected() {
    let err = Config::from_yaml_with_env("backend:\n  type: ftp\n").unwrap_err();
    assert!(err.contains("ftp") || err.contains("unknown variant"));
}
