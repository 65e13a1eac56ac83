use std::fs;
use std::io::Cursor;

use nsenter_cgroup::*;
use nsenter_core::{Error, ProcessId};
use tempfile::TempDir;

/// Check if running as root
fn is_root() -> bool {
    unsafe { libc::getuid() == 0 }
}

fn fake_hierarchy(group: &str) -> TempDir {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join(group);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("cgroup.procs"), "").unwrap();
    root
}

#[test]
fn test_join_through_proc_cgroup() {
    let root = fake_hierarchy("user.slice/session-3.scope");
    let controller = CgroupController::new(root.path());

    let procs = controller
        .open_procs_of(Cursor::new("0::/user.slice/session-3.scope\n"))
        .unwrap();
    CgroupJoiner::new(procs)
        .join(ProcessId::from_raw(1234))
        .unwrap();

    let written =
        fs::read_to_string(root.path().join("user.slice/session-3.scope/cgroup.procs")).unwrap();
    assert_eq!(written, "1234");
}

#[test]
fn test_procs_is_opened_for_append() {
    let root = fake_hierarchy("a");
    fs::write(root.path().join("a/cgroup.procs"), "1\n").unwrap();
    let controller = CgroupController::new(root.path());

    let procs = controller.open_procs("/a").unwrap();
    CgroupJoiner::new(procs).join(ProcessId::from_raw(2)).unwrap();

    assert_eq!(
        fs::read_to_string(root.path().join("a/cgroup.procs")).unwrap(),
        "1\n2"
    );
}

#[test]
fn test_missing_cgroup_is_an_error() {
    let root = tempfile::tempdir().unwrap();
    let controller = CgroupController::new(root.path());
    let err = controller.open_procs("/does/not/exist").unwrap_err();
    assert!(matches!(err, Error::Cgroup { .. }));
}

#[test]
fn test_tempdir_is_not_cgroup2() {
    let root = tempfile::tempdir().unwrap();
    let controller = CgroupController::new(root.path());
    assert!(!controller.is_cgroup2());
    assert!(matches!(controller.ensure_v2(), Err(Error::CgroupUnsupported)));
}

#[test]
#[ignore] // Requires root
fn test_join_own_cgroup() {
    if !is_root() {
        return;
    }

    let controller = CgroupController::default();
    if !controller.is_cgroup2() {
        return;
    }

    let own = fs::File::open("/proc/self/cgroup").unwrap();
    let procs = controller.open_procs_of(own).unwrap();
    CgroupJoiner::new(procs).join_self().unwrap();

    let contents = fs::read_to_string("/proc/self/cgroup").unwrap();
    let path = parse_cgroup_path(&contents).unwrap();
    let members = fs::read_to_string(controller.procs_path(path)).unwrap();
    let me = ProcessId::current().as_raw().to_string();
    assert!(members.lines().any(|line| line == me));
}
