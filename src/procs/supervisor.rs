// Copyright 2019-2020 Benjamin Fry <benjaminfry@me.com>
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::process::ExitStatus;
use std::time::Duration;

use futures::future::{self, FutureExt};
use futures::{Stream, StreamExt};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::time::{self, timeout, Instant};
use tracing::{debug, error, info, warn};

use crate::fork::Child;
use crate::procs::Logger;
use crate::Error;

pub const DEFAULT_SIGTERM_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_SIGKILL_TIMEOUT: Duration = Duration::from_secs(5);

/// Index of the last, unconditional, escalation step
const KILL_STEP: usize = 2;

/// How one launched process ended
#[derive(Debug)]
pub struct ExitReport {
    pub name: String,
    pub pid: Option<u32>,
    pub status: Result<ExitStatus, Error>,
}

impl ExitReport {
    pub fn success(&self) -> bool {
        match &self.status {
            Ok(status) => status.success(),
            Err(_) => false,
        }
    }
}

/// Monitor launched processes until all of them exit
///
/// Rules:
///   - never restarts a process
///   - captured output is handed to the logger
///   - on shutdown escalates SIGINT, then SIGTERM, then SIGKILL to the processes still running
///   - a repeated shutdown request goes straight to SIGKILL
///   - only signals processes that have not been reaped, so a recycled pid is never hit
#[derive(Debug)]
pub struct Supervisor {
    sigterm_timeout: Duration,
    sigkill_timeout: Duration,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(DEFAULT_SIGTERM_TIMEOUT, DEFAULT_SIGKILL_TIMEOUT)
    }
}

impl Supervisor {
    /// `sigterm_timeout` is the wait after SIGINT, `sigkill_timeout` the wait after SIGTERM
    ///
    /// `sigkill_timeout` also bounds how long captured output is drained once every process exited.
    pub fn new(sigterm_timeout: Duration, sigkill_timeout: Duration) -> Self {
        Self {
            sigterm_timeout,
            sigkill_timeout,
        }
    }

    fn step(&self, step: usize) -> (Signal, Option<Duration>) {
        match step {
            0 => (Signal::SIGINT, Some(self.sigterm_timeout)),
            1 => (Signal::SIGTERM, Some(self.sigkill_timeout)),
            _ => (Signal::SIGKILL, None),
        }
    }

    /// Waits on `children`, each item of `shutdown` is one shutdown request
    ///
    /// The reports are in the same order as `children`.
    pub async fn supervise<S>(&self, mut children: Vec<Child>, shutdown: S) -> Vec<ExitReport>
    where
        S: Stream<Item = ()>,
    {
        let mut output_tasks = Vec::new();
        let mut pids = Vec::with_capacity(children.len());
        for child in children.iter_mut() {
            output_tasks.extend(Logger::attach(child));
            pids.push(child.pid());
        }

        let mut statuses: Vec<Option<Result<ExitStatus, Error>>> =
            children.iter().map(|_| None).collect();
        let mut remaining = children.len();

        tokio::pin!(shutdown);
        let mut shutdown_closed = false;

        let mut escalation: Option<usize> = None;
        let deadline = time::sleep(Duration::from_secs(0));
        tokio::pin!(deadline);
        let mut deadline_armed = false;

        while remaining > 0 {
            let waits = children
                .iter_mut()
                .zip(statuses.iter())
                .enumerate()
                .filter(|(_, (_, status))| status.is_none())
                .map(|(index, (child, _))| {
                    Box::pin(async move { (index, child.child.wait().await) })
                });

            // the wait futures, and their borrow of `children`, end before any handler runs
            tokio::select! {
                (index, status) = future::select_all(waits).map(|(exited, _, _)| exited) => {
                    let status = status.map_err(Error::from);
                    Self::log_exit(&children[index].name, pids[index], &status);
                    statuses[index] = Some(status);
                    remaining -= 1;
                }
                request = shutdown.next(), if !shutdown_closed => match request {
                    Some(()) => {
                        let step = match escalation {
                            None => {
                                info!(processes = remaining, "shutting down");
                                0
                            }
                            Some(_) => {
                                warn!(processes = remaining, "shutdown requested again, killing");
                                KILL_STEP
                            }
                        };
                        escalation = Some(step);
                        deadline_armed = self.enter_step(step, &children, &statuses, deadline.as_mut());
                    }
                    None => shutdown_closed = true,
                },
                _ = &mut deadline, if deadline_armed => {
                    let step = escalation.map_or(0, |step| step + 1).min(KILL_STEP);
                    warn!(processes = remaining, "processes still running");
                    escalation = Some(step);
                    deadline_armed = self.enter_step(step, &children, &statuses, deadline.as_mut());
                }
            }
        }

        // background processes may hold on to the captured pipes after the launched ones exited
        let drained = timeout(self.sigkill_timeout, future::join_all(output_tasks.iter_mut())).await;
        if drained.is_err() {
            warn!("captured output still open after all processes exited, detaching");
            for task in &output_tasks {
                task.abort();
            }
        }

        children
            .into_iter()
            .zip(pids)
            .zip(statuses)
            .map(|((child, pid), status)| ExitReport {
                name: child.name,
                pid,
                status: status.unwrap_or_else(|| Err(Error::from("process was not reaped"))),
            })
            .collect()
    }

    /// Signals the running processes for `step`, returns whether a deadline was armed
    fn enter_step(
        &self,
        step: usize,
        children: &[Child],
        statuses: &[Option<Result<ExitStatus, Error>>],
        deadline: std::pin::Pin<&mut time::Sleep>,
    ) -> bool {
        let (signal, wait) = self.step(step);
        Self::signal_running(children, statuses, signal);

        match wait {
            Some(wait) => {
                deadline.reset(Instant::now() + wait);
                true
            }
            None => false,
        }
    }

    /// Sends `signal` to every child not yet reaped, returns how many were signalled
    fn signal_running(
        children: &[Child],
        statuses: &[Option<Result<ExitStatus, Error>>],
        signal: Signal,
    ) -> usize {
        let mut signalled = 0;

        for (child, status) in children.iter().zip(statuses) {
            if status.is_some() {
                continue;
            }

            // no pid once reaped
            if let Some(pid) = child.pid() {
                Self::signal(&child.name, pid, signal);
                signalled += 1;
            }
        }

        signalled
    }

    fn signal(name: &str, pid: u32, signal: Signal) {
        debug!(process = %name, pid, ?signal, "sending signal");

        if let Err(e) = kill(Pid::from_raw(pid as i32), signal) {
            warn!(process = %name, pid, ?signal, error = %e, "failed to signal process");
        }
    }

    fn log_exit(name: &str, pid: Option<u32>, status: &Result<ExitStatus, Error>) {
        match status {
            Ok(status) if status.success() => {
                info!(process = %name, ?pid, "process has finished cleanly")
            }
            Ok(status) => error!(process = %name, ?pid, %status, "process has died"),
            Err(e) => error!(process = %name, ?pid, error = %e, "failed to wait on process"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::process::ExitStatusExt;
    use std::process::Stdio;

    use futures::stream;
    use tokio::process::Command;

    use super::*;
    use crate::launch::OutputPolicy;

    fn spawn(name: &str, program: &str, args: &[&str]) -> Child {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .unwrap();

        Child {
            name: name.to_string(),
            output: OutputPolicy::Log,
            child,
        }
    }

    #[tokio::test]
    async fn test_reports_in_launch_order() {
        let children = vec![
            spawn("slow", "sh", &["-c", "sleep 0.2; exit 0"]),
            spawn("fails", "sh", &["-c", "echo broken >&2; exit 3"]),
        ];

        let reports = Supervisor::default()
            .supervise(children, stream::pending())
            .await;

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].name, "slow");
        assert!(reports[0].success());
        assert_eq!(reports[1].name, "fails");
        assert!(!reports[1].success());
        assert_eq!(reports[1].status.as_ref().unwrap().code(), Some(3));
    }

    #[tokio::test]
    async fn test_shutdown_interrupts() {
        let children = vec![spawn("sleeper", "sleep", &["30"])];

        let reports = Supervisor::default()
            .supervise(children, stream::once(future::ready(())))
            .await;

        assert_eq!(reports.len(), 1);
        let status = reports[0].status.as_ref().unwrap();
        assert_eq!(status.signal(), Some(Signal::SIGINT as i32));
    }

    #[tokio::test]
    async fn test_shutdown_escalates_to_kill() {
        // ignores SIGINT and SIGTERM
        let children = vec![spawn(
            "stubborn",
            "sh",
            &["-c", "trap '' INT TERM; while true; do sleep 0.05; done"],
        )];

        let supervisor = Supervisor::new(Duration::from_millis(100), Duration::from_millis(100));
        // give the shell time to install its traps
        let shutdown = stream::once(time::sleep(Duration::from_millis(300)));
        let reports = supervisor.supervise(children, shutdown).await;

        let status = reports[0].status.as_ref().unwrap();
        assert_eq!(status.signal(), Some(Signal::SIGKILL as i32));
    }

    #[tokio::test]
    async fn test_no_children() {
        let reports = Supervisor::default()
            .supervise(Vec::new(), stream::pending())
            .await;

        assert!(reports.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_shutdown_kills() {
        let children = vec![spawn(
            "stubborn",
            "sh",
            &["-c", "trap '' INT TERM; while true; do sleep 0.05; done"],
        )];

        let supervisor = Supervisor::new(Duration::from_secs(10), Duration::from_secs(10));
        let shutdown = stream::once(time::sleep(Duration::from_millis(300)))
            .chain(stream::once(time::sleep(Duration::from_millis(600))));

        let started = std::time::Instant::now();
        let reports = supervisor.supervise(children, shutdown).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        let status = reports[0].status.as_ref().unwrap();
        assert_eq!(status.signal(), Some(Signal::SIGKILL as i32));
    }

    #[tokio::test]
    async fn test_background_output_is_detached() {
        // the backgrounded sleep keeps the captured pipes open after the shell exits
        let children = vec![spawn("forks", "sh", &["-c", "sleep 5 & exit 0"])];

        let supervisor = Supervisor::new(Duration::from_millis(100), Duration::from_millis(100));
        let started = std::time::Instant::now();
        let reports = supervisor.supervise(children, stream::pending()).await;

        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(reports[0].success());
    }

    #[tokio::test]
    async fn test_reaped_children_are_not_signalled() {
        let mut done = spawn("done", "true", &[]);
        done.child.wait().await.unwrap();
        let running = spawn("running", "sleep", &["30"]);

        let children = vec![done, running];
        let statuses = vec![None, None];

        assert_eq!(
            Supervisor::signal_running(&children, &statuses, Signal::SIGKILL),
            1
        );
    }
}
