//! Command runner
//!
//! Drives one remote command sequence: acquire a session, run each command
//! in order, print its output, stop at the first non-zero exit status and
//! close the session exactly once on every exit path.

use std::future::Future;
use std::io::Write;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{Result, RunnerError};
use crate::ssh::CommandResult;

/// Something that can open a [`RemoteSession`]
#[async_trait]
pub trait Connector: Send + Sync {
    /// Session type produced by this connector
    type Session: RemoteSession;

    /// Connect and authenticate. Errors here are fatal to the run.
    async fn connect(&self) -> Result<Self::Session>;
}

/// An open session able to execute commands
#[async_trait]
pub trait RemoteSession: Send {
    /// Execute `command` and wait for it to terminate
    async fn exec(&mut self, command: &str) -> Result<CommandResult>;

    /// Release the session
    async fn close(&mut self) -> Result<()>;
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every command exited with status 0
    Completed,

    /// Command at `index` exited non-zero; later commands were skipped
    Stopped {
        /// Position of the failing command in the command list
        index: usize,
        /// Its exit status
        exit_status: u32,
    },
}

/// Results of one run, in command order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// One entry per executed command
    pub results: Vec<CommandResult>,

    /// Whether the sequence completed or stopped early
    pub outcome: RunOutcome,
}

impl RunReport {
    /// Check if every configured command ran and succeeded
    pub fn completed(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }
}

/// Runs a fixed, ordered command list over one session per run
#[derive(Debug)]
pub struct CommandRunner<C> {
    connector: C,
    commands: Vec<String>,
}

impl<C: Connector> CommandRunner<C> {
    /// Create a runner for `commands` using `connector`
    pub fn new(connector: C, commands: Vec<String>) -> Self {
        Self {
            connector,
            commands,
        }
    }

    /// The configured command list
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Run the sequence, printing to the process stdout/stderr
    pub async fn run(&self) -> Result<RunReport> {
        self.run_until(std::future::pending()).await
    }

    /// Run the sequence against the process stdout/stderr until it finishes
    /// or `shutdown` resolves
    pub async fn run_until<F>(&self, shutdown: F) -> Result<RunReport>
    where
        F: Future<Output = ()>,
    {
        let mut stdout = std::io::stdout();
        let mut stderr = std::io::stderr();
        self.run_with_until(shutdown, &mut stdout, &mut stderr).await
    }

    /// Run the sequence, printing command output to `out` and command
    /// stderr plus failure notices to `err`
    pub async fn run_with<O, E>(&self, out: &mut O, err: &mut E) -> Result<RunReport>
    where
        O: Write,
        E: Write,
    {
        self.run_with_until(std::future::pending(), out, err).await
    }

    /// Like [`run_with`](Self::run_with), abandoning the run with
    /// [`RunnerError::Interrupted`] once `shutdown` resolves
    ///
    /// Connection and authentication errors are returned before any command
    /// runs. Any error after the session is open, the interruption included,
    /// is returned only after the session has been closed.
    pub async fn run_with_until<F, O, E>(
        &self,
        shutdown: F,
        out: &mut O,
        err: &mut E,
    ) -> Result<RunReport>
    where
        F: Future<Output = ()>,
        O: Write,
        E: Write,
    {
        tokio::pin!(shutdown);

        let mut session = tokio::select! {
            session = self.connector.connect() => session?,
            _ = &mut shutdown => {
                warn!("Interrupted while connecting");
                return Err(RunnerError::Interrupted);
            }
        };

        let report = tokio::select! {
            report = self.execute_all(&mut session, out, err) => report,
            _ = &mut shutdown => {
                warn!("Interrupted, closing session");
                Err(RunnerError::Interrupted)
            }
        };

        if let Err(e) = session.close().await {
            warn!("Failed to close session cleanly: {}", e);
        }

        report
    }

    async fn execute_all<S, O, E>(
        &self,
        session: &mut S,
        out: &mut O,
        err: &mut E,
    ) -> Result<RunReport>
    where
        S: RemoteSession,
        O: Write,
        E: Write,
    {
        let mut results = Vec::with_capacity(self.commands.len());

        for (index, command) in self.commands.iter().enumerate() {
            debug!(
                "Executing command {}/{}: {}",
                index + 1,
                self.commands.len(),
                command
            );
            let result = session.exec(command).await?;

            print_result(&result, out, err)?;

            let exit_status = result.exit_status;
            results.push(result);

            if exit_status != 0 {
                writeln!(
                    err,
                    "Command `{}` failed with exit status {}, aborting",
                    command, exit_status
                )?;
                err.flush()?;
                info!(
                    "Stopping after command {} of {}",
                    index + 1,
                    self.commands.len()
                );
                return Ok(RunReport {
                    results,
                    outcome: RunOutcome::Stopped { index, exit_status },
                });
            }
        }

        Ok(RunReport {
            results,
            outcome: RunOutcome::Completed,
        })
    }
}

/// Echo the command, then its trimmed stdout and stderr when non-empty
fn print_result<O, E>(result: &CommandResult, out: &mut O, err: &mut E) -> Result<()>
where
    O: Write,
    E: Write,
{
    writeln!(out, "$ {}", result.command)?;

    let stdout = result.stdout.trim();
    if !stdout.is_empty() {
        writeln!(out, "{}", stdout)?;
    }
    out.flush()?;

    let stderr = result.stderr.trim();
    if !stderr.is_empty() {
        writeln!(err, "{}", stderr)?;
        err.flush()?;
    }

    Ok(())
}
