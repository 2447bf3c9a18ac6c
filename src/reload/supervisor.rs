//! Parent side of the reloader.
//!
//! Re-executes the program with the reload marker set and keeps doing so
//! while the child asks for a restart.

use std::ffi::OsString;
use std::future::Future;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};

use crate::lifecycle::signals::wait_for_signal;
use crate::reload::{ReloaderError, EXIT_RESTART, RELOADER_ENV};

/// How long an interrupted supervisor waits for its child before killing it.
const CHILD_EXIT_GRACE: Duration = Duration::from_secs(5);

/// Runs the server in a child process and restarts it on request.
#[derive(Debug, Clone)]
pub struct Supervisor {
    program: PathBuf,
    args: Vec<OsString>,
}

impl Supervisor {
    /// Supervise a copy of the running executable with the same arguments.
    pub fn from_current_process() -> Result<Self, ReloaderError> {
        let program = std::env::current_exe().map_err(ReloaderError::CurrentExe)?;
        Ok(Self::new(program, std::env::args_os().skip(1)))
    }

    pub fn new(program: impl Into<PathBuf>, args: impl IntoIterator<Item = impl Into<OsString>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Spawn children until one exits with something other than the restart code.
    ///
    /// Returns that exit code. A child killed by a signal reports `128 + signal`.
    /// SIGINT or SIGTERM received here is forwarded to the child, and the
    /// child's exit code is returned without restarting.
    pub async fn run(&self) -> Result<i32, ReloaderError> {
        loop {
            let mut child = self.spawn()?;
            tracing::debug!(pid = child.id(), "Server process started");

            match wait_or_forward(&mut child, wait_for_signal()).await? {
                ChildExit::Finished(EXIT_RESTART) => {
                    tracing::info!(" * Restarting with {}", self.program.display());
                }
                ChildExit::Finished(code) | ChildExit::Interrupted(code) => {
                    tracing::debug!(code, "Server process exited");
                    return Ok(code);
                }
            }
        }
    }

    fn spawn(&self) -> Result<Child, ReloaderError> {
        Command::new(&self.program)
            .args(&self.args)
            .env(RELOADER_ENV, "true")
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ReloaderError::Spawn {
                program: self.program.clone(),
                source,
            })
    }
}

/// How a supervised child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChildExit {
    /// Exited on its own.
    Finished(i32),
    /// Exited after the supervisor passed on a termination signal.
    Interrupted(i32),
}

/// Wait for `child`, passing `interrupt`'s signal on to it if that resolves first.
async fn wait_or_forward(
    child: &mut Child,
    interrupt: impl Future<Output = Signal>,
) -> Result<ChildExit, ReloaderError> {
    tokio::select! {
        status = child.wait() => Ok(ChildExit::Finished(exit_code(status.map_err(ReloaderError::Wait)?))),
        signal = interrupt => {
            tracing::debug!(signal = signal.as_str(), "Forwarding signal to server process");
            if let Some(pid) = child.id() {
                // The child may already be gone. Waiting below still reaps it.
                let _ = kill(Pid::from_raw(pid as i32), signal);
            }
            let status = wait_or_kill(child).await?;
            Ok(ChildExit::Interrupted(exit_code(status)))
        }
    }
}

async fn wait_or_kill(child: &mut Child) -> Result<ExitStatus, ReloaderError> {
    match tokio::time::timeout(CHILD_EXIT_GRACE, child.wait()).await {
        Ok(status) => status.map_err(ReloaderError::Wait),
        Err(_) => {
            tracing::warn!("Server process did not exit, killing it");
            child.kill().await.map_err(ReloaderError::Wait)?;
            child.wait().await.map_err(ReloaderError::Wait)
        }
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => 1,
    }
}
