#![cfg(unix)]

use std::fs;
use std::os::unix::fs::symlink;
use std::path::PathBuf;
use std::sync::Arc;

use lnsync_core::{Notification, SourceDir};
use lnsync_sync::{apply, reconcile, LinkAction, SyncError};
use tempfile::TempDir;

struct Layout {
    _root: TempDir,
    a: PathBuf,
    b: PathBuf,
    dest: PathBuf,
}

fn layout() -> Layout {
    let root = TempDir::new().expect("root");
    let a = root.path().join("A");
    let b = root.path().join("B");
    let dest = root.path().join("D");
    for dir in [&a, &b, &dest] {
        fs::create_dir_all(dir).expect("mkdir");
    }
    fs::write(a.join("x.txt"), "x").expect("write x");
    fs::write(b.join("y.txt"), "y").expect("write y");
    symlink("/gone", dest.join("stale")).expect("stale link");
    Layout {
        _root: root,
        a,
        b,
        dest,
    }
}

#[test]
fn stale_link_pruned_then_live_events_drive_destination() {
    let l = layout();
    let sources = SourceDir::from_paths(&[&l.a, &l.b]);

    let report = reconcile(&[&l.a, &l.b], &l.dest).expect("reconcile");
    assert_eq!(report.pruned, vec![l.dest.join("stale")]);
    assert_eq!(
        fs::read_dir(&l.dest).expect("read dest").count(),
        0,
        "x.txt / y.txt must not be pre-populated"
    );

    let x = l.a.join("x.txt");
    apply(&l.dest, &Notification::creation(sources[0].clone(), &x)).expect("create");
    assert_eq!(fs::read_link(l.dest.join("x.txt")).expect("link"), x);

    apply(&l.dest, &Notification::deletion(sources[0].clone(), &x)).expect("delete");
    assert!(fs::symlink_metadata(l.dest.join("x.txt")).is_err());
}

#[test]
fn same_name_from_two_sources_keeps_one_link() {
    let l = layout();
    let sources = SourceDir::from_paths(&[&l.a, &l.b]);
    let dup_a = l.a.join("dup.txt");
    let dup_b = l.b.join("dup.txt");
    fs::write(&dup_a, "a").expect("write");
    fs::write(&dup_b, "b").expect("write");

    let first = apply(&l.dest, &Notification::creation(sources[0].clone(), &dup_a));
    let second = apply(&l.dest, &Notification::creation(Arc::clone(&sources[1]), &dup_b));

    assert!(matches!(first, Ok(LinkAction::Linked { .. })));
    assert!(matches!(second, Err(SyncError::LinkExists { .. })));
    assert_eq!(fs::read_link(l.dest.join("dup.txt")).expect("link"), dup_a);
}
