//! Foreground supervision: keep one child running, cycle it every interval.
//!
//! Used on hosts without launchd or systemd (`formulary service run`). It
//! enforces the same contract the generated unit files ask of the host
//! supervisor: one instance at a time, relaunch on exit, kill and relaunch
//! when the interval elapses, combined log opened for append.
//!
//! On unix each launch gets its own process group. Stopping a run signals
//! the whole group (SIGTERM, then SIGKILL after the grace period), so
//! processes the client forked never outlive their run.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::broadcast;
use tokio::time::Instant;

use formulary_core::service::RESTART_THROTTLE_SECS;
use formulary_core::ServiceDescriptor;

use crate::error::{io_err, ServiceError};

/// Seconds a stopped run gets to exit after SIGTERM before SIGKILL.
pub const STOP_GRACE_SECS: u64 = 5;

/// When and how often the runner relaunches the child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    /// A child still running after this long is killed and relaunched.
    pub interval: Duration,
    /// Minimum time between two launches.
    pub throttle: Duration,
    /// Relaunch after the child exits on its own.
    pub keep_alive: bool,
    /// Stop after this many launches; `None` runs until shutdown.
    pub max_launches: Option<u32>,
    /// Time between SIGTERM and SIGKILL when a run is stopped.
    pub stop_grace: Duration,
}

impl RestartPolicy {
    pub fn from_descriptor(descriptor: &ServiceDescriptor) -> Self {
        Self {
            interval: descriptor.interval_duration(),
            throttle: Duration::from_secs(RESTART_THROTTLE_SECS),
            keep_alive: descriptor.keep_alive,
            max_launches: None,
            stop_grace: Duration::from_secs(STOP_GRACE_SECS),
        }
    }

    pub fn with_max_launches(mut self, max: u32) -> Self {
        self.max_launches = Some(max);
        self
    }
}

/// Why a child stopped running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Exited on its own; `None` when terminated by a signal.
    Exited(Option<i32>),
    IntervalElapsed,
    Shutdown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuperviseSummary {
    pub launches: u32,
    pub interval_kills: u32,
    pub last_exit: Option<ExitReason>,
}

enum Event {
    Exited(std::io::Result<std::process::ExitStatus>),
    Interval,
    Shutdown,
}

/// Run `descriptor` under `policy` until shutdown, until the launch budget
/// is spent, or (without keep-alive) until the child exits.
///
/// The next child is only spawned after the previous one has been reaped.
pub async fn supervise(
    descriptor: &ServiceDescriptor,
    policy: RestartPolicy,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<SuperviseSummary, ServiceError> {
    let mut summary = SuperviseSummary::default();

    loop {
        if policy
            .max_launches
            .is_some_and(|max| summary.launches >= max)
        {
            break;
        }

        let started = Instant::now();
        let mut child = spawn(descriptor)?;
        let pid = child.id();
        summary.launches += 1;
        tracing::info!(
            label = %descriptor.label(),
            pid = pid.unwrap_or_default(),
            launch = summary.launches,
            "service launched"
        );

        let event = tokio::select! {
            status = child.wait() => Event::Exited(status),
            _ = tokio::time::sleep(policy.interval) => Event::Interval,
            _ = shutdown.recv() => Event::Shutdown,
        };

        let reason = match event {
            Event::Exited(status) => {
                let status = status.map_err(|e| io_err(&descriptor.program, e))?;
                // Whatever the run left in the background goes with it.
                if let Some(pid) = pid {
                    signal_group(pid, "KILL").await;
                }
                ExitReason::Exited(status.code())
            }
            Event::Interval => {
                terminate(&mut child, pid, policy.stop_grace, &descriptor.program).await?;
                summary.interval_kills += 1;
                ExitReason::IntervalElapsed
            }
            Event::Shutdown => {
                terminate(&mut child, pid, policy.stop_grace, &descriptor.program).await?;
                ExitReason::Shutdown
            }
        };
        tracing::info!(label = %descriptor.label(), reason = ?reason, "service stopped");
        summary.last_exit = Some(reason);

        match reason {
            ExitReason::Shutdown => break,
            ExitReason::Exited(_) if !policy.keep_alive => break,
            _ => {}
        }
        if policy
            .max_launches
            .is_some_and(|max| summary.launches >= max)
        {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep_until(started + policy.throttle) => {}
            _ = shutdown.recv() => {
                summary.last_exit = Some(ExitReason::Shutdown);
                break;
            }
        }
    }

    Ok(summary)
}

/// Build a runtime, supervise until Ctrl-C, and return the summary.
pub fn run_blocking(
    descriptor: &ServiceDescriptor,
    policy: RestartPolicy,
) -> Result<SuperviseSummary, ServiceError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;

    runtime.block_on(async {
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(4);
        let signal = tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::info!("received ctrl-c, stopping service");
                    let _ = shutdown_tx.send(());
                }
                Err(err) => {
                    tracing::warn!(error = %err, "ctrl-c handler failed; runner stops only on its own");
                    // Keep the sender alive so receivers never see `Closed`.
                    std::future::pending::<()>().await;
                    drop(shutdown_tx);
                }
            }
        });
        let result = supervise(descriptor, policy, shutdown_rx).await;
        signal.abort();
        result
    })
}

fn open_log(path: &Path) -> Result<File, ServiceError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_err(path, e))
}

fn spawn(descriptor: &ServiceDescriptor) -> Result<Child, ServiceError> {
    let stdout = open_log(&descriptor.log_path)?;
    let stderr = if descriptor.combined_log() {
        stdout
            .try_clone()
            .map_err(|e| io_err(&descriptor.log_path, e))?
    } else {
        open_log(&descriptor.error_log_path)?
    };

    let mut command = Command::new(&descriptor.program);
    command
        .current_dir(&descriptor.working_dir)
        .envs(&descriptor.environment)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr))
        .kill_on_drop(true);
    // The child leads a new group whose id is its pid.
    #[cfg(unix)]
    command.process_group(0);

    command
        .spawn()
        .map_err(|source| ServiceError::Spawn {
            program: descriptor.program.clone(),
            source,
        })
}

/// Stop a run: SIGTERM to its process group, SIGKILL once `grace` has
/// passed, then reap the leader. Members that survived the leader are
/// killed too.
#[cfg(unix)]
async fn terminate(
    child: &mut Child,
    pid: Option<u32>,
    grace: Duration,
    program: &Path,
) -> Result<(), ServiceError> {
    let Some(pid) = pid else {
        child.wait().await.map_err(|e| io_err(program, e))?;
        return Ok(());
    };

    signal_group(pid, "TERM").await;
    if tokio::time::timeout(grace, child.wait()).await.is_err() {
        tracing::warn!(pid, grace_ms = grace.as_millis() as u64, "run ignored SIGTERM; killing");
    }
    signal_group(pid, "KILL").await;
    child.wait().await.map_err(|e| io_err(program, e))?;
    Ok(())
}

#[cfg(not(unix))]
async fn terminate(
    child: &mut Child,
    _pid: Option<u32>,
    _grace: Duration,
    program: &Path,
) -> Result<(), ServiceError> {
    if let Err(err) = child.start_kill() {
        tracing::debug!(error = %err, "child was not running");
    }
    child.wait().await.map_err(|e| io_err(program, e))?;
    Ok(())
}

/// Send `signal` to every process in group `pgid`. An empty group is not an
/// error: the run already finished.
#[cfg(unix)]
async fn signal_group(pgid: u32, signal: &str) {
    let group = format!("-{pgid}");
    let result = Command::new("kill")
        .args(["-s", signal, "--", group.as_str()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match result {
        Ok(status) if status.success() => {
            tracing::debug!(pgid, signal, "signalled process group");
        }
        Ok(_) => {}
        Err(err) => tracing::warn!(pgid, signal, error = %err, "failed to run kill"),
    }
}

#[cfg(not(unix))]
async fn signal_group(_pgid: u32, _signal: &str) {}
