#![cfg(unix)]

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use lnsync_core::Settings;
use lnsync_daemon::paths::{default_pid_path, socket_path};
use lnsync_daemon::{request_status, request_stop, run, DaemonError};
use tempfile::TempDir;

fn settings(root: &TempDir) -> Settings {
    let source = root.path().join("src");
    let destination = root.path().join("dest");
    fs::create_dir_all(&source).unwrap();
    fs::create_dir_all(&destination).unwrap();
    Settings {
        sources: vec![source],
        destination,
        pid_file: None,
        log_file: None,
    }
}

async fn wait_for_socket(home: PathBuf) {
    let socket = socket_path(&home);
    for _ in 0..100 {
        if socket.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("daemon socket never appeared at {}", socket.display());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn status_then_stop_cleans_up_runtime_files() {
    let home = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let settings = settings(&root);
    let daemon = tokio::spawn(run(home.path().to_path_buf(), settings.clone()));
    wait_for_socket(home.path().to_path_buf()).await;

    let h = home.path().to_path_buf();
    let status = tokio::task::spawn_blocking(move || request_status(&h))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status["running"], true);
    assert_eq!(status["pid"], std::process::id());
    assert_eq!(status["sources"].as_array().unwrap().len(), 1);
    assert!(default_pid_path(home.path()).exists());

    let h = home.path().to_path_buf();
    tokio::task::spawn_blocking(move || request_stop(&h))
        .await
        .unwrap()
        .unwrap();

    tokio::time::timeout(Duration::from_secs(10), daemon)
        .await
        .expect("daemon exits after stop")
        .unwrap()
        .unwrap();
    assert!(!socket_path(home.path()).exists());
    assert!(!default_pid_path(home.path()).exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_daemon_on_the_same_home_is_rejected() {
    let home = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let settings = settings(&root);
    let first = tokio::spawn(run(home.path().to_path_buf(), settings.clone()));
    wait_for_socket(home.path().to_path_buf()).await;

    let err = run(home.path().to_path_buf(), settings).await.unwrap_err();
    assert!(matches!(err, DaemonError::AlreadyRunning { .. }), "got: {err}");

    let h = home.path().to_path_buf();
    tokio::task::spawn_blocking(move || request_stop(&h))
        .await
        .unwrap()
        .unwrap();
    first.await.unwrap().unwrap();
}

#[tokio::test]
async fn startup_failure_removes_pid_file_and_socket() {
    let home = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let mut settings = settings(&root);
    settings.destination = root.path().join("missing");

    assert!(run(home.path().to_path_buf(), settings).await.is_err());
    assert!(!socket_path(home.path()).exists());
    assert!(!default_pid_path(home.path()).exists());
}
