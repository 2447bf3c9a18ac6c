//! Reload supervision and bind pre-flight.

mod common;

use std::fs;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, SystemTime};

use devserve::net::{BindError, Listener};
use devserve::reload::{ReloaderRole, Supervisor, EXIT_RESTART, RELOADER_ENV};
use devserve::Address;
use hyper::StatusCode;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{ChildStdout, Command};

// Counts runs in a file and asks for a restart until the third run.
const RESTARTING_CHILD: &str = r#"
[ "$DEVSERVE_RUN_MAIN" = "true" ] || exit 64
n=$(cat "$1" 2>/dev/null || echo 0)
n=$((n + 1))
echo "$n" > "$1"
[ "$n" -lt 3 ] && exit 3
exit 0
"#;

#[tokio::test]
async fn supervisor_restarts_on_exit_code_three() {
    let dir = tempfile::tempdir().unwrap();
    let counter = dir.path().join("runs");
    let supervisor = Supervisor::new(
        "/bin/sh",
        ["-c", RESTARTING_CHILD, "sh", counter.to_str().unwrap()],
    );

    let code = supervisor.run().await.unwrap();

    assert_eq!(code, 0);
    assert_eq!(fs::read_to_string(&counter).unwrap().trim(), "3");
}

#[tokio::test]
async fn supervisor_returns_failure_codes() {
    let supervisor = Supervisor::new("/bin/sh", ["-c", "exit 2"]);
    assert_eq!(supervisor.run().await.unwrap(), 2);
}

#[test]
fn restart_code_and_marker() {
    assert_eq!(EXIT_RESTART, 3);
    assert_eq!(RELOADER_ENV, "DEVSERVE_RUN_MAIN");
    // The test harness is never started by the supervisor.
    assert_eq!(ReloaderRole::from_env(), ReloaderRole::Main);
}

#[tokio::test]
async fn preflight_probe_leaves_no_socket_behind() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("probe.sock");

    Listener::probe(&Address::unix(&path)).await.unwrap();
    assert!(!path.exists());

    // A child can bind the same path right after the probe.
    let listener = Listener::bind(&Address::unix(&path)).await.unwrap();
    assert!(path.exists());
    listener.close();
    assert!(!path.exists());
}

#[tokio::test]
async fn preflight_probe_reports_live_socket() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("live.sock");
    let _live = Listener::bind(&Address::unix(&path)).await.unwrap();

    let err = Listener::probe(&Address::unix(&path)).await.unwrap_err();
    assert!(matches!(err, BindError::InUse { .. }), "{err}");
    assert!(path.exists());
}

/// Read log lines until one contains `needle`.
async fn wait_for_log(lines: &mut Lines<BufReader<ChildStdout>>, needle: &str) {
    let found = tokio::time::timeout(Duration::from_secs(30), async {
        while let Some(line) = lines.next_line().await.unwrap() {
            if line.contains(needle) {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);
    assert!(found, "no log line containing {needle:?}");
}

async fn get_ok(socket: &Path) {
    for _ in 0..50 {
        if let Ok(reply) = common::unix_get(socket, "/").await {
            assert_eq!(reply.status, StatusCode::OK);
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("{} is not serving", socket.display());
}

#[tokio::test]
async fn changed_file_restarts_server_on_same_socket() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("app.sock");
    let watched = dir.path().join("settings.txt");
    fs::write(&watched, "one").unwrap();

    let mut supervisor = Command::new(env!("CARGO_BIN_EXE_devserve"))
        .arg(&socket)
        .args(["--reload", "--reloader-type", "poll", "--reloader-interval-ms", "50"])
        .arg("--extra-file")
        .arg(&watched)
        .args(["--log-level", "info"])
        .env_remove(RELOADER_ENV)
        .env_remove("RUST_LOG")
        .stdout(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .unwrap();
    let mut logs = BufReader::new(supervisor.stdout.take().unwrap()).lines();

    wait_for_log(&mut logs, "Server bound").await;
    get_ok(&socket).await;

    // Whole-second mtimes are all the poll backend compares.
    fs::write(&watched, "two").unwrap();
    fs::File::options()
        .write(true)
        .open(&watched)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(5))
        .unwrap();

    wait_for_log(&mut logs, "Detected change").await;
    wait_for_log(&mut logs, "Server bound").await;
    get_ok(&socket).await;

    // SIGTERM to the supervisor alone reaches the child through forwarding.
    kill(Pid::from_raw(supervisor.id().unwrap() as i32), Signal::SIGTERM).unwrap();
    let status = tokio::time::timeout(Duration::from_secs(15), supervisor.wait())
        .await
        .unwrap()
        .unwrap();
    assert!(status.success(), "{status}");
    assert!(!socket.exists());
}
