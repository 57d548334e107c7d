//! Configuration and root folder resolution tests
//!
//! Tests that touch PCAT_ROOT_FOLDER are marked #[serial] so environment
//! changes never race.

use pcat_common::config::{
    CompiledDefaults, RootFolderInitializer, RootFolderResolver, TomlConfig, ROOT_FOLDER_ENV,
};
use serial_test::serial;
use std::env;
use std::path::PathBuf;

#[test]
fn test_compiled_defaults_for_current_platform() {
    let defaults = CompiledDefaults::for_current_platform();

    assert!(!defaults.root_folder.as_os_str().is_empty());
    assert!(defaults.root_folder.ends_with("pcat") || defaults.root_folder.ends_with("pcat_data"));
    assert_eq!(defaults.log_level, "info");
    assert!(defaults.log_file.is_none());
}

#[test]
#[serial]
fn test_resolver_with_no_overrides_uses_default() {
    env::remove_var(ROOT_FOLDER_ENV);

    let root_folder = RootFolderResolver::new().resolve();

    assert_eq!(root_folder, CompiledDefaults::for_current_platform().root_folder);
}

#[test]
#[serial]
fn test_resolver_env_var() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/pcat-test-env-folder");

    let root_folder = RootFolderResolver::new().resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/pcat-test-env-folder"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_cli_arg_takes_precedence_over_env() {
    env::set_var(ROOT_FOLDER_ENV, "/tmp/pcat-priority-env");

    let root_folder = RootFolderResolver::new()
        .with_cli_arg(Some(PathBuf::from("/tmp/pcat-priority-cli")))
        .resolve();
    assert_eq!(root_folder, PathBuf::from("/tmp/pcat-priority-cli"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
#[serial]
fn test_env_takes_precedence_over_toml() {
    let config: TomlConfig = toml::from_str(r#"root_folder = "/tmp/pcat-priority-toml""#).unwrap();

    env::remove_var(ROOT_FOLDER_ENV);
    let resolver = RootFolderResolver::new().with_toml(&config);
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/pcat-priority-toml"));

    env::set_var(ROOT_FOLDER_ENV, "/tmp/pcat-priority-env");
    assert_eq!(resolver.resolve(), PathBuf::from("/tmp/pcat-priority-env"));

    env::remove_var(ROOT_FOLDER_ENV);
}

#[test]
fn test_initializer_paths() {
    let root = PathBuf::from("/tmp/pcat-test-root");
    let initializer = RootFolderInitializer::new(root.clone());

    assert_eq!(initializer.database_path(), root.join("catalog.db"));
    assert_eq!(initializer.data_dir(), root.join("data"));
}

#[test]
fn test_initializer_database_exists() {
    let initializer = RootFolderInitializer::new(PathBuf::from("/tmp/pcat-test-nonexistent"));
    assert!(!initializer.database_exists());
}

#[test]
fn test_initializer_creates_directory_idempotently() {
    let temp = tempfile::tempdir().unwrap();
    let root = temp.path().join("nested").join("root");
    let initializer = RootFolderInitializer::new(root.clone());

    initializer.ensure_directory_exists().unwrap();
    initializer.ensure_directory_exists().unwrap();

    assert!(root.is_dir());
}

#[test]
fn test_load_config_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
        database_path = "/var/lib/pcat/catalog.db"

        [sync]
        workers = 2
        "#,
    )
    .unwrap();

    let config = TomlConfig::load(&path).unwrap();
    assert_eq!(config.database_path, Some(PathBuf::from("/var/lib/pcat/catalog.db")));
    assert_eq!(config.sync.workers, 2);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_invalid_config_file_is_config_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "[sync]\nworkers = \"many\"\n").unwrap();

    let result = TomlConfig::load(&path);
    assert!(matches!(result, Err(pcat_common::Error::Config(_))));
}
