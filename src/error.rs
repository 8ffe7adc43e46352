//! Error types for the SSH command runner

use std::time::Duration;

use thiserror::Error;

/// Main error type for a command run
///
/// A command exiting with a non-zero status is not an error; it ends the
/// run early and is reported through [`RunOutcome`](crate::runner::RunOutcome).
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Transport could not be established (unreachable host, timeout, handshake)
    #[error("SSH connection error: {0}")]
    Connection(String),

    /// Credentials rejected by the server
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Server host key refused by the configured policy
    #[error("Host key rejected for {0}")]
    HostKeyRejected(String),

    /// Channel open/exec failure or channel lost mid-command
    #[error("SSH channel error: {0}")]
    Channel(String),

    /// Command did not finish within the per-command timeout
    #[error("Command timeout after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Run abandoned on SIGINT/SIGTERM
    #[error("Run interrupted")]
    Interrupted,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Config file could not be read or parsed
    #[error("Config file error: {0}")]
    ConfigFile(#[from] ::config::ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using RunnerError
pub type Result<T> = std::result::Result<T, RunnerError>;

impl RunnerError {
    /// Create a connection error from a string
    pub fn connection(msg: impl Into<String>) -> Self {
        RunnerError::Connection(msg.into())
    }

    /// Create an authentication error from a string
    pub fn auth(msg: impl Into<String>) -> Self {
        RunnerError::Authentication(msg.into())
    }

    /// Create a channel error from a string
    pub fn channel(msg: impl Into<String>) -> Self {
        RunnerError::Channel(msg.into())
    }

    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        RunnerError::Config(msg.into())
    }

    /// Whether the error happened before a session was established
    pub fn is_fatal_connect(&self) -> bool {
        matches!(
            self,
            RunnerError::Connection(_)
                | RunnerError::Authentication(_)
                | RunnerError::HostKeyRejected(_)
        )
    }
}
