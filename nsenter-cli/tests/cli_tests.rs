use assert_cmd::Command;
use predicates::prelude::*;
use std::process::{Child, Stdio};
use std::thread;
use std::time::Duration;

/// Check if running as root
fn is_root() -> bool {
    unsafe { libc::getuid() == 0 }
}

fn nsenter() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_nsenter"));
    cmd.env_remove("NSENTER_LOG");
    cmd
}

/// Long-running helper in fresh namespaces, killed on drop
struct Helper(Child);

impl Helper {
    fn spawn(args: &[&str]) -> Self {
        let child = std::process::Command::new("unshare")
            .args(args)
            .stdin(Stdio::null())
            .spawn()
            .expect("Failed to spawn unshare");
        // let the helper finish its setup
        thread::sleep(Duration::from_millis(500));
        Self(child)
    }

    fn pid(&self) -> String {
        self.0.id().to_string()
    }
}

impl Drop for Helper {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

#[test]
fn test_help_command() {
    nsenter()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Run a program with namespaces of other processes",
        ))
        .stdout(predicate::str::contains("--target"))
        .stdout(predicate::str::contains("--mount"))
        .stdout(predicate::str::contains("--user-parent"))
        .stdout(predicate::str::contains("--join-cgroup"));
}

#[test]
fn test_version_command() {
    nsenter()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("nsenter"));
}

#[test]
fn test_no_namespace_specified() {
    nsenter()
        .arg("/bin/true")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("nsenter: no namespace specified"));
}

#[test]
fn test_namespace_without_target() {
    nsenter()
        .args(["-m", "/bin/true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no target PID specified"));
}

#[test]
fn test_all_without_target() {
    nsenter()
        .args(["--all", "/bin/true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no target PID specified"));
}

#[test]
fn test_wd_conflicts_with_wdns() {
    nsenter()
        .args(["-w", "-W", "/", "/bin/true"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_invalid_target() {
    nsenter()
        .args(["--target", "0", "-m", "/bin/true"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_negative_net_socket() {
    nsenter()
        .args(["-t", "1", "--net-socket=-1", "/bin/true"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_invalid_uid() {
    nsenter()
        .args(["-S", "nobody", "-m", "/bin/true"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_missing_namespace_file() {
    nsenter()
        .args(["--mount=/nonexistent/ns/mnt", "/bin/true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("cannot open mnt namespace"));
}

#[test]
fn test_own_user_namespace_is_fatal() {
    let me = std::process::id().to_string();
    nsenter()
        .args(["-U", "--preserve-credentials", "-F", "-t", &me, "/bin/true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("reassociate to namespace 'user' failed"));
}

#[test]
fn test_verbose_logs_to_stderr() {
    nsenter()
        .args(["--verbose", "/bin/true"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Parsed options"));
}

#[test]
#[ignore] // Requires root
fn test_enter_own_uts_namespace() {
    if !is_root() {
        return;
    }

    let me = std::process::id().to_string();
    nsenter()
        .args(["-u", "-F", "-t", &me, "--", "/bin/sh", "-c", "exit 7"])
        .assert()
        .code(7);
}

#[test]
#[ignore] // Requires root
fn test_enter_mount_and_uts_of_helper() {
    if !is_root() {
        return;
    }

    let helper = Helper::spawn(&["-m", "-u", "sh", "-c", "hostname testhost && exec sleep 30"]);
    let target = format!("--target={}", helper.pid());

    nsenter()
        .args(["-m", "-u", &target, "-F", "--", "hostname"])
        .assert()
        .success()
        .stdout(predicate::str::diff("testhost\n"));
}

#[test]
#[ignore] // Requires root
fn test_all_enters_helper_namespaces() {
    if !is_root() {
        return;
    }

    let helper = Helper::spawn(&["-m", "-u", "sh", "-c", "hostname testhost && exec sleep 30"]);
    let target = format!("--target={}", helper.pid());

    nsenter()
        .args(["--all", &target, "-F", "--", "hostname"])
        .assert()
        .success()
        .stdout(predicate::str::diff("testhost\n"));
}

#[test]
#[ignore] // Requires root
fn test_user_parent_enters_owning_user_namespace() {
    if !is_root() {
        return;
    }

    // the target's user namespace is nested inside an intermediate one
    let helper = Helper::spawn(&["-U", "-r", "unshare", "-U", "-r", "sleep", "30"]);
    let pid = helper.pid();
    let own = std::fs::read_link("/proc/self/ns/user").unwrap();
    let theirs = std::fs::read_link(format!("/proc/{pid}/ns/user")).unwrap();

    let output = nsenter()
        .args(["-U", "--user-parent", "--preserve-credentials"])
        .arg(format!("--target={pid}"))
        .args(["-F", "--", "readlink", "/proc/self/ns/user"])
        .output()
        .expect("Failed to execute nsenter");

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let entered = String::from_utf8_lossy(&output.stdout).trim().to_string();
    assert_ne!(entered, own.to_string_lossy());
    assert_ne!(entered, theirs.to_string_lossy());
}
