//! Subprocess management for helper binaries.
//!
//! The browser-session source needs a WebDriver server (`chromedriver`)
//! running for the length of one session. This module locates and spawns
//! such helpers and guarantees they are reaped.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, instrument, warn};

use crate::error::ProcessError;

/// How long to wait for a killed helper to exit.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Background Process
// ============================================================================

/// A long-running helper process.
///
/// The child is spawned with `kill_on_drop`, so dropping the handle without
/// calling [`BackgroundProcess::shutdown`] still terminates it.
#[derive(Debug)]
pub struct BackgroundProcess {
    program: String,
    child: Child,
}

impl BackgroundProcess {
    /// Program name, for logs.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// OS process id, if the process is still running.
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Fails if the process has already exited.
    pub fn ensure_running(&mut self) -> Result<(), ProcessError> {
        match self.child.try_wait()? {
            Some(status) => Err(ProcessError::ExitedEarly {
                program: self.program.clone(),
                code: status.code(),
            }),
            None => Ok(()),
        }
    }

    /// Kills the process and waits for it to exit.
    #[instrument(skip(self), fields(program = %self.program))]
    pub async fn shutdown(mut self) {
        if let Err(e) = self.child.start_kill() {
            // Already exited.
            debug!(error = %e, "Kill request ignored");
        }

        match tokio::time::timeout(SHUTDOWN_TIMEOUT, self.child.wait()).await {
            Ok(Ok(status)) => debug!(status = %status, "Helper process exited"),
            Ok(Err(e)) => warn!(error = %e, "Failed to reap helper process"),
            Err(_) => warn!(timeout = ?SHUTDOWN_TIMEOUT, "Helper process did not exit in time"),
        }
    }
}

// ============================================================================
// Process Runner
// ============================================================================

/// API for locating and spawning helper binaries.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Creates a new process runner.
    pub fn new() -> Self {
        Self
    }

    /// Spawns a helper in the background with output discarded.
    #[instrument(skip(self), fields(cmd = %cmd))]
    pub fn spawn_background(&self, cmd: &str, args: &[String]) -> Result<BackgroundProcess, ProcessError> {
        let cmd_path = self.which(cmd).ok_or_else(|| {
            warn!(cmd = %cmd, "Command not found");
            ProcessError::NotFound(cmd.to_string())
        })?;

        debug!(path = %cmd_path.display(), args = ?args, "Spawning helper process");

        let child = Command::new(&cmd_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        Ok(BackgroundProcess {
            program: cmd.to_string(),
            child,
        })
    }

    /// Check if a command exists on PATH (or is a path to an existing file).
    pub fn command_exists(&self, cmd: &str) -> bool {
        self.which(cmd).is_some()
    }

    /// Find the path to a command.
    pub fn which(&self, cmd: &str) -> Option<PathBuf> {
        which::which(cmd).ok()
    }
}

// ============================================================================
// Tests
// ============================================================================
