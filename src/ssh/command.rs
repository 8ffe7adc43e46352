//! Command execution over SSH
//!
//! Provides the `CommandResult` struct and `exec` on an open
//! [`SshSession`], one exec channel per command.

use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::connection::SshSession;
use crate::error::{Result, RunnerError};

/// Exit status reported for a remote process killed by a signal
pub const SIGNAL_EXIT_STATUS: u32 = 255;

/// Output of one executed remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    /// The command as sent to the server
    pub command: String,

    /// Standard output from the command
    pub stdout: String,

    /// Standard error from the command
    pub stderr: String,

    /// Exit status of the remote process
    pub exit_status: u32,
}

impl CommandResult {
    /// Create an empty result for `command`
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    /// Check if the command succeeded (exit status 0)
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

impl SshSession {
    /// Execute a command over SSH and wait for it to terminate
    ///
    /// Opens a fresh exec channel, collects all stdout/stderr and the exit
    /// status. Fails with `Channel` if the channel closes without an exit
    /// status, or `Timeout` if a per-command timeout is configured and
    /// elapses.
    pub async fn exec(&self, command: &str) -> Result<CommandResult> {
        let mut channel = self.open_channel().await?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| RunnerError::channel(format!("Failed to exec command: {}", e)))?;

        let mut result = CommandResult::new(command);
        match self.command_timeout() {
            Some(limit) => {
                let collected =
                    timeout(limit, collect_channel_output(&mut channel, &mut result)).await;
                match collected {
                    Ok(collected) => collected?,
                    Err(_) => {
                        warn!("Command timed out after {}s: {}", limit.as_secs(), command);
                        let _ = channel.close().await;
                        return Err(RunnerError::Timeout(limit));
                    }
                }
            }
            None => collect_channel_output(&mut channel, &mut result).await?,
        }

        debug!(
            "Command completed: exit_status={}, stdout_len={}, stderr_len={}",
            result.exit_status,
            result.stdout.len(),
            result.stderr.len()
        );

        Ok(result)
    }
}

/// Collect output from a channel until both EOF and exit status arrived,
/// or the channel closes
async fn collect_channel_output(
    channel: &mut Channel<Msg>,
    result: &mut CommandResult,
) -> Result<()> {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut exit_status = None;
    let mut got_eof = false;

    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { data } => {
                stdout.extend_from_slice(&data);
            }
            ChannelMsg::ExtendedData { data, ext } => {
                // ext == 1 is SSH_EXTENDED_DATA_STDERR
                if ext == 1 {
                    stderr.extend_from_slice(&data);
                } else {
                    stdout.extend_from_slice(&data);
                }
            }
            ChannelMsg::ExitStatus { exit_status: status } => {
                exit_status = Some(status);
                if got_eof {
                    break;
                }
            }
            ChannelMsg::ExitSignal { signal_name, .. } => {
                debug!("Remote process terminated by signal {:?}", signal_name);
                exit_status = Some(SIGNAL_EXIT_STATUS);
                if got_eof {
                    break;
                }
            }
            ChannelMsg::Eof => {
                got_eof = true;
                if exit_status.is_some() {
                    break;
                }
            }
            ChannelMsg::Close => {
                break;
            }
            _ => {
                // Ignore other messages
            }
        }
    }

    result.stdout = String::from_utf8_lossy(&stdout).into_owned();
    result.stderr = String::from_utf8_lossy(&stderr).into_owned();
    result.exit_status = exit_status.ok_or_else(|| {
        RunnerError::channel("Channel closed without an exit status")
    })?;

    Ok(())
}
