#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::time::{Duration, Instant};

use formulary_core::{describe_service, FormulaName, InstallLayout, ServiceDescriptor};
use formulary_service::{supervise, ExitReason, RestartPolicy};
use tempfile::TempDir;
use tokio::sync::broadcast;

/// Install `body` as a shell client under a scratch prefix.
fn client(body: &str) -> (TempDir, InstallLayout, ServiceDescriptor) {
    let prefix = TempDir::new().unwrap();
    let layout = InstallLayout::new(prefix.path(), &FormulaName::from("demo"), "demo.sh");
    layout.ensure_dirs().unwrap();
    fs::write(&layout.binary_path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&layout.binary_path, fs::Permissions::from_mode(0o755)).unwrap();
    let descriptor = describe_service(&layout);
    (prefix, layout, descriptor)
}

fn policy(interval: Duration, max_launches: u32) -> RestartPolicy {
    RestartPolicy {
        interval,
        throttle: Duration::ZERO,
        keep_alive: true,
        max_launches: Some(max_launches),
        stop_grace: Duration::from_secs(2),
    }
}

fn log_lines(layout: &InstallLayout, needle: &str) -> usize {
    fs::read_to_string(&layout.log_path)
        .unwrap_or_default()
        .lines()
        .filter(|l| l.contains(needle))
        .count()
}

#[tokio::test]
async fn relaunches_a_client_that_exits_cleanly() {
    let (_prefix, layout, d) = client("echo tick\nexit 0");
    let (_tx, rx) = broadcast::channel(1);

    let summary = supervise(&d, policy(Duration::from_secs(60), 3), rx)
        .await
        .unwrap();

    assert_eq!(summary.launches, 3);
    assert_eq!(summary.interval_kills, 0);
    assert_eq!(summary.last_exit, Some(ExitReason::Exited(Some(0))));
    assert_eq!(log_lines(&layout, "tick"), 3);
}

#[tokio::test]
async fn kills_a_client_that_outlives_the_interval() {
    let (_prefix, layout, d) = client("echo started\nexec sleep 30");
    let (_tx, rx) = broadcast::channel(1);

    let summary = supervise(&d, policy(Duration::from_millis(300), 2), rx)
        .await
        .unwrap();

    assert_eq!(summary.launches, 2);
    assert_eq!(summary.interval_kills, 2);
    assert_eq!(summary.last_exit, Some(ExitReason::IntervalElapsed));
    assert_eq!(log_lines(&layout, "started"), 2);
}

#[tokio::test]
async fn never_runs_two_clients_at_once() {
    let (_prefix, layout, d) = client(
        "if [ -e running ]; then echo OVERLAP; fi\ntouch running\nsleep 0.1\nrm -f running\necho done",
    );
    let (_tx, rx) = broadcast::channel(1);

    let summary = supervise(&d, policy(Duration::from_secs(60), 4), rx)
        .await
        .unwrap();

    assert_eq!(summary.launches, 4);
    assert_eq!(log_lines(&layout, "done"), 4);
    assert_eq!(log_lines(&layout, "OVERLAP"), 0);
}

#[tokio::test]
async fn appends_both_streams_to_the_existing_log() {
    let (_prefix, layout, d) = client("echo out\necho err >&2");
    fs::write(&layout.log_path, "previous run\n").unwrap();
    let (_tx, rx) = broadcast::channel(1);

    supervise(&d, policy(Duration::from_secs(60), 1), rx)
        .await
        .unwrap();

    let log = fs::read_to_string(&layout.log_path).unwrap();
    assert!(log.starts_with("previous run\n"), "log was truncated: {log}");
    assert!(log.contains("out\n"));
    assert!(log.contains("err\n"));
}

#[tokio::test]
async fn injects_env_path_and_runs_in_config_dir() {
    let (_prefix, layout, d) = client("echo \"env=$ENV_PATH\"\nls -a");
    fs::write(layout.config_file(), "HA_URL=\n").unwrap();
    let (_tx, rx) = broadcast::channel(1);

    supervise(&d, policy(Duration::from_secs(60), 1), rx)
        .await
        .unwrap();

    let log = fs::read_to_string(&layout.log_path).unwrap();
    assert!(log.contains(&format!("env={}", layout.config_file().display())));
    assert!(log.lines().any(|l| l == ".env"), "ls did not run in config dir: {log}");
}

#[tokio::test]
async fn stops_without_relaunch_when_keep_alive_is_off() {
    let (_prefix, _layout, d) = client("exit 3");
    let (_tx, rx) = broadcast::channel(1);
    let policy = RestartPolicy {
        keep_alive: false,
        max_launches: None,
        ..policy(Duration::from_secs(60), 1)
    };

    let summary = supervise(&d, policy, rx).await.unwrap();

    assert_eq!(summary.launches, 1);
    assert_eq!(summary.last_exit, Some(ExitReason::Exited(Some(3))));
}

#[tokio::test]
async fn shutdown_stops_the_running_client() {
    let (_prefix, _layout, d) = client("exec sleep 30");
    let (tx, rx) = broadcast::channel(1);
    let policy = RestartPolicy {
        max_launches: None,
        ..policy(Duration::from_secs(60), 1)
    };

    let handle = tokio::spawn(async move { supervise(&d, policy, rx).await });
    tokio::time::sleep(Duration::from_millis(200)).await;
    tx.send(()).unwrap();

    let summary = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .expect("runner stopped")
        .unwrap()
        .unwrap();
    assert_eq!(summary.launches, 1);
    assert_eq!(summary.last_exit, Some(ExitReason::Shutdown));
}

/// A client whose real work runs in a forked subshell, as shell clients do.
const FORKING_CLIENT: &str = "echo \"start $$\"\n( sleep 1; echo \"LEFTOVER from $$\" )";

#[tokio::test]
async fn interval_kill_takes_forked_processes_with_it() {
    let (_prefix, layout, d) = client(FORKING_CLIENT);
    let (_tx, rx) = broadcast::channel(1);

    let summary = supervise(&d, policy(Duration::from_millis(300), 2), rx)
        .await
        .unwrap();
    assert_eq!(summary.interval_kills, 2);

    // Long enough for any surviving subshell to write.
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(log_lines(&layout, "start"), 2);
    assert_eq!(log_lines(&layout, "LEFTOVER"), 0);
}

#[tokio::test]
async fn shutdown_takes_forked_processes_with_it() {
    let (_prefix, layout, d) = client(FORKING_CLIENT);
    let (tx, rx) = broadcast::channel(1);
    let policy = RestartPolicy {
        max_launches: None,
        ..policy(Duration::from_secs(60), 1)
    };

    let handle = tokio::spawn(async move { supervise(&d, policy, rx).await });
    tokio::time::sleep(Duration::from_millis(200)).await;
    tx.send(()).unwrap();
    let summary = handle.await.unwrap().unwrap();
    assert_eq!(summary.last_exit, Some(ExitReason::Shutdown));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(log_lines(&layout, "LEFTOVER"), 0);
}

#[tokio::test]
async fn background_work_does_not_outlive_a_finished_run() {
    let (_prefix, layout, d) = client("( sleep 1; echo \"LEFTOVER from $$\" ) &\necho \"start $$\"\nexit 0");
    let (_tx, rx) = broadcast::channel(1);

    let summary = supervise(&d, policy(Duration::from_secs(60), 2), rx)
        .await
        .unwrap();
    assert_eq!(summary.launches, 2);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(log_lines(&layout, "start"), 2);
    assert_eq!(log_lines(&layout, "LEFTOVER"), 0);
}

#[tokio::test]
async fn client_ignoring_sigterm_is_killed_after_grace() {
    let (_prefix, layout, d) = client("trap '' TERM\necho started\nsleep 30");
    let (_tx, rx) = broadcast::channel(1);
    let policy = RestartPolicy {
        stop_grace: Duration::from_millis(200),
        ..policy(Duration::from_millis(300), 1)
    };

    let began = Instant::now();
    let summary = supervise(&d, policy, rx).await.unwrap();

    assert_eq!(summary.last_exit, Some(ExitReason::IntervalElapsed));
    assert!(began.elapsed() < Duration::from_secs(10), "runner waited for sleep 30");
    assert_eq!(log_lines(&layout, "started"), 1);
}

#[test]
fn policy_from_descriptor_uses_structural_cadence() {
    let (_prefix, _layout, d) = client("exit 0");
    let p = RestartPolicy::from_descriptor(&d);
    assert_eq!(p.interval, Duration::from_secs(300));
    assert_eq!(p.throttle, Duration::from_secs(10));
    assert!(p.keep_alive);
    assert_eq!(p.max_launches, None);
    assert_eq!(p.stop_grace, Duration::from_secs(5));
    assert_eq!(p.with_max_launches(2).max_launches, Some(2));
}
