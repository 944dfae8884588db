use std::fs;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn hotloop() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_hotloop"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn launches(marker: &Path) -> usize {
    fs::read_to_string(marker)
        .map(|s| s.lines().count())
        .unwrap_or(0)
}

fn wait_for(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        sleep(Duration::from_millis(25));
    }
    check()
}

fn wait_exit(child: &mut Child, timeout: Duration) -> Option<ExitStatus> {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Some(status) = child.try_wait().unwrap() {
            return Some(status);
        }
        sleep(Duration::from_millis(25));
    }
    let _ = child.kill();
    None
}

/// True if `pid` exists and is not a zombie.
fn is_running(pid: i32) -> bool {
    match fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => {
            let state = stat.rsplit(')').next().and_then(|rest| rest.trim().chars().next());
            !matches!(state, Some('Z') | Some('X') | None)
        }
        Err(_) => false,
    }
}

fn send(child: &Child, signal: i32) {
    unsafe {
        libc::kill(child.id() as i32, signal);
    }
}

#[test]
fn test_no_arguments_prints_usage() {
    let output = hotloop().output().expect("Failed to run hotloop");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage:"), "stderr: {stderr}");
}

#[test]
fn test_missing_command_prints_usage() {
    let dir = TempDir::new().unwrap();
    let output = hotloop()
        .arg(dir.path())
        .output()
        .expect("Failed to run hotloop");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage:"), "stderr: {stderr}");
}

#[test]
fn test_help_exits_zero() {
    let output = hotloop()
        .arg("--help")
        .output()
        .expect("Failed to run hotloop");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("<DIRECTORY>"));
    assert!(stdout.contains("<COMMAND>"));
}

#[test]
fn test_missing_directory_fails() {
    let dir = TempDir::new().unwrap();
    let output = hotloop()
        .arg(dir.path().join("nope"))
        .arg("true")
        .output()
        .expect("Failed to run hotloop");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not a directory"), "stderr: {stderr}");
}

#[test]
fn test_change_restarts_and_interrupt_exits_cleanly() {
    let watched = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let marker = scratch.path().join("marker");
    let command = format!("echo run >> '{}'; sleep 30", marker.display());

    let mut child = hotloop()
        .env("HOTLOOP_QUIET_MS", "200")
        .arg(watched.path())
        .arg(&command)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to start hotloop");

    // Watches are installed before the first launch
    assert!(wait_for(Duration::from_secs(5), || launches(&marker) == 1));

    fs::write(watched.path().join("main.rs"), "fn main() {}").unwrap();
    assert!(wait_for(Duration::from_secs(5), || launches(&marker) == 2));

    send(&child, libc::SIGINT);
    let status = wait_exit(&mut child, Duration::from_secs(10));

    assert_eq!(status.and_then(|s| s.code()), Some(0));
    assert_eq!(launches(&marker), 2);
}

#[test]
fn test_excluded_change_does_not_restart() {
    let watched = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let marker = scratch.path().join("marker");
    let ignored = watched.path().join("target");
    fs::create_dir(&ignored).unwrap();
    let command = format!("echo run >> '{}'; sleep 30", marker.display());

    let mut child = hotloop()
        .arg("--quiet-ms")
        .arg("200")
        .arg(watched.path())
        .arg(&command)
        .arg(&ignored)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to start hotloop");

    assert!(wait_for(Duration::from_secs(5), || launches(&marker) == 1));

    fs::write(ignored.join("out.o"), "obj").unwrap();
    sleep(Duration::from_millis(800));
    assert_eq!(launches(&marker), 1);

    send(&child, libc::SIGTERM);
    let status = wait_exit(&mut child, Duration::from_secs(10));
    assert_eq!(status.and_then(|s| s.code()), Some(0));
}

#[test]
fn test_interrupt_leaves_no_descendants_behind() {
    let watched = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let pid_file = scratch.path().join("grandchild.pid");
    let command = format!("sleep 60 & echo $! > '{}'; wait", pid_file.display());

    let mut child = hotloop()
        .arg(watched.path())
        .arg(&command)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("Failed to start hotloop");

    let mut grandchild = None;
    assert!(wait_for(Duration::from_secs(5), || {
        grandchild = fs::read_to_string(&pid_file)
            .ok()
            .and_then(|text| text.trim().parse::<i32>().ok());
        grandchild.is_some()
    }));
    let grandchild = grandchild.unwrap();
    assert!(is_running(grandchild));

    send(&child, libc::SIGINT);
    let status = wait_exit(&mut child, Duration::from_secs(10));

    assert_eq!(status.and_then(|s| s.code()), Some(0));
    assert!(
        wait_for(Duration::from_secs(2), || !is_running(grandchild)),
        "grandchild {grandchild} outlived hotloop"
    );
}
