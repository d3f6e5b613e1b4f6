//! Config file loading: error messages and CLI layering.

use std::fs;
use std::path::PathBuf;

use lnsync_core::{config, Config, ConfigError};
use tempfile::TempDir;

fn write_config(home: &TempDir, body: &str) -> PathBuf {
    let path = config::config_path_at(home.path());
    fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    fs::write(&path, body).expect("write config");
    path
}

#[test]
fn full_config_file_loads() {
    let home = TempDir::new().expect("tempdir");
    write_config(
        &home,
        "sources:\n  - /srv/a\n  - /srv/b\ndestination: /srv/library\npid_file: /tmp/lnsync.pid\n",
    );

    let config = config::load_default_at(home.path()).expect("load");
    assert_eq!(
        config.sources,
        vec![PathBuf::from("/srv/a"), PathBuf::from("/srv/b")]
    );
    assert_eq!(config.destination, Some(PathBuf::from("/srv/library")));
    assert_eq!(config.pid_file, Some(PathBuf::from("/tmp/lnsync.pid")));
    assert!(config.log_file.is_none());
}

#[test]
fn empty_file_is_empty_config() {
    let home = TempDir::new().expect("tempdir");
    write_config(&home, "\n");
    assert_eq!(
        config::load_default_at(home.path()).expect("load"),
        Config::default()
    );
}

#[test]
fn corrupt_yaml_returns_parse_error_with_path() {
    let home = TempDir::new().expect("tempdir");
    let path = write_config(&home, ": : corrupt : yaml : !!!\n  - broken: [unclosed");

    let err = config::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"), "got: {err}");
}

#[test]
fn unknown_keys_are_rejected() {
    let home = TempDir::new().expect("tempdir");
    let path = write_config(&home, "sources: [/a]\ndestination: /d\nrecursive: true\n");

    let err = config::load(&path).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }), "got: {err}");
}

#[test]
fn flags_layered_over_file_resolve_to_settings() {
    let home = TempDir::new().expect("tempdir");
    write_config(&home, "sources: [/srv/a]\ndestination: /srv/library\n");

    let file = config::load_default_at(home.path()).expect("load");
    let flags = Config {
        sources: vec!["/srv/b".into(), "/srv/c".into()],
        ..Config::default()
    };
    let settings = file.merge(flags).resolve().expect("resolve");

    assert_eq!(
        settings.sources,
        vec![PathBuf::from("/srv/b"), PathBuf::from("/srv/c")]
    );
    assert_eq!(settings.destination, PathBuf::from("/srv/library"));
}
