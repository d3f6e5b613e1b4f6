#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use tempfile::TempDir;

fn lnsync_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_lnsync"))
}

struct DaemonProcess {
    child: Child,
    home: PathBuf,
}

impl DaemonProcess {
    fn start(home: &Path, source: &Path, destination: &Path) -> Self {
        let child = Command::new(lnsync_bin())
            .env("HOME", home)
            .arg("start")
            .arg("-s")
            .arg(source)
            .arg("-d")
            .arg(destination)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn daemon");

        Self {
            child,
            home: home.to_path_buf(),
        }
    }

    fn stop(&mut self) -> bool {
        let _ = Command::new(lnsync_bin())
            .env("HOME", &self.home)
            .arg("stop")
            .status();

        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if let Ok(Some(status)) = self.child.try_wait() {
                return status.success();
            }
            sleep(Duration::from_millis(50));
        }

        let _ = self.child.kill();
        let _ = self.child.wait();
        false
    }
}

impl Drop for DaemonProcess {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            self.stop();
        }
    }
}

fn status(home: &Path) -> Option<serde_json::Value> {
    let output = Command::new(lnsync_bin())
        .env("HOME", home)
        .arg("status")
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    serde_json::from_slice(&output.stdout).ok()
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(100));
    }
    false
}

#[test]
fn daemon_links_new_files_and_stops_on_request() {
    let home = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    let src = root.path().join("src");
    let dest = root.path().join("dest");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&dest).unwrap();

    let mut daemon = DaemonProcess::start(home.path(), &src, &dest);
    assert!(
        wait_until(Duration::from_secs(5), || status(home.path())
            .map(|s| s["running"] == true)
            .unwrap_or(false)),
        "daemon did not report running state in time",
    );

    fs::write(src.join("report.pdf"), "pdf").unwrap();
    let link = dest.join("report.pdf");
    assert!(
        wait_until(Duration::from_secs(5), || fs::symlink_metadata(&link).is_ok()),
        "daemon did not create the link",
    );
    assert_eq!(
        fs::read_link(&link).unwrap(),
        fs::canonicalize(&src).unwrap().join("report.pdf")
    );

    let linked = status(home.path()).unwrap()["linked"].as_u64().unwrap();
    assert_eq!(linked, 1);

    assert!(daemon.stop(), "daemon exited with failure");
    assert!(!home.path().join(".lnsync/run/lnsync.sock").exists());
    assert!(!home.path().join(".lnsync/run/lnsync.pid").exists());
    assert!(home.path().join(".lnsync/logs/lnsync.log").exists());
}
