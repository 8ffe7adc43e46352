//! SSH session lifecycle
//!
//! `SshSession` is one authenticated connection: connect, handshake, host-key
//! check and password authentication happen in [`SshSession::connect`];
//! [`SshSession::close`] disconnects. `SshConnector` plugs the session into
//! the command runner.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Handle, Msg};
use russh::{Channel, Disconnect};
use secrecy::ExposeSecret;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::command::CommandResult;
use super::config::SshConfig;
use super::handler::SshHandler;
use crate::error::{Result, RunnerError};
use crate::runner::{Connector, RemoteSession};

/// One authenticated SSH connection
pub struct SshSession {
    /// `host:port`, kept for logging after the config is gone
    address: String,

    /// Active session handle; `None` once closed
    handle: Option<Handle<SshHandler>>,

    /// Per-command timeout
    command_timeout: Option<Duration>,
}

impl SshSession {
    /// Connect and authenticate
    ///
    /// The connection timeout bounds TCP connect plus handshake, and again
    /// password authentication. A session whose authentication fails is
    /// disconnected before the error is returned.
    pub async fn connect(config: &SshConfig) -> Result<Self> {
        let address = config.address();
        info!("Connecting to SSH server {}...", address);

        if config.host_key_policy.is_insecure() {
            warn!(
                "Host key verification is disabled for {}; the server identity is not checked",
                address
            );
        }

        let ssh_config = Arc::new(client::Config::default());
        let handler = SshHandler::new(&config.host, config.port, config.host_key_policy.clone());

        let connect = async {
            client::connect(ssh_config, (config.host.as_str(), config.port), handler)
                .await
                .map_err(|e| {
                    if is_host_key_rejection(&e) {
                        error!("Host key for {} rejected", address);
                        RunnerError::HostKeyRejected(address.clone())
                    } else {
                        error!("SSH connection failed: {}", e);
                        RunnerError::connection(e.to_string())
                    }
                })
        };
        let mut handle = within(
            config.connect_timeout,
            format!("Connection to {}", address),
            connect,
        )
        .await?;

        let auth = within(
            config.connect_timeout,
            format!("Authentication with {}", address),
            authenticate(&mut handle, config),
        )
        .await;
        if let Err(e) = auth {
            let disconnect = handle.disconnect(Disconnect::ByApplication, "", "en").await;
            if let Err(disconnect_err) = disconnect {
                debug!("Disconnect after failed authentication: {}", disconnect_err);
            }
            return Err(e);
        }

        info!(
            "Successfully connected to {}@{}",
            config.username, address
        );

        Ok(Self {
            address,
            handle: Some(handle),
            command_timeout: config.command_timeout,
        })
    }

    /// Open a new session channel
    pub(crate) async fn open_channel(&self) -> Result<Channel<Msg>> {
        let handle = self
            .handle
            .as_ref()
            .ok_or_else(|| RunnerError::channel("SSH session already closed"))?;

        handle
            .channel_open_session()
            .await
            .map_err(|e| RunnerError::channel(format!("Failed to open channel: {}", e)))
    }

    pub(crate) fn command_timeout(&self) -> Option<Duration> {
        self.command_timeout
    }

    /// Check if the session is still open
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Close the SSH connection
    ///
    /// Closing an already closed session is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        let result = handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(|e| RunnerError::connection(format!("Failed to disconnect: {}", e)));

        info!("SSH connection to {} closed", self.address);
        result
    }
}

impl std::fmt::Debug for SshSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshSession")
            .field("address", &self.address)
            .field("open", &self.is_open())
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

/// Password authentication
async fn authenticate(handle: &mut Handle<SshHandler>, config: &SshConfig) -> Result<()> {
    debug!(
        "Attempting password authentication for user '{}'",
        config.username
    );

    let auth_result = handle
        .authenticate_password(&config.username, config.password.expose_secret())
        .await
        .map_err(|e| RunnerError::auth(e.to_string()))?;

    if auth_result.success() {
        info!("Password authentication successful");
        Ok(())
    } else {
        error!("Password authentication rejected for '{}'", config.username);
        Err(RunnerError::auth(format!(
            "Password authentication rejected for user '{}'",
            config.username
        )))
    }
}

/// Bound `fut` by `limit`; elapsing is a connection error naming `what`
async fn within<T, F>(limit: Duration, what: String, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            error!("{} timed out after {:?}", what, limit);
            Err(RunnerError::connection(format!(
                "{} timed out after {:?}",
                what, limit
            )))
        }
    }
}

/// russh reports a `false` from `check_server_key` as `Error::UnknownKey`
fn is_host_key_rejection(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<russh::Error>(),
        Some(russh::Error::UnknownKey)
    )
}

/// Opens real SSH sessions from an [`SshConfig`]
#[derive(Debug)]
pub struct SshConnector {
    config: SshConfig,
}

impl SshConnector {
    /// Create a connector for `config`
    pub fn new(config: SshConfig) -> Self {
        Self { config }
    }

    /// The configuration sessions are opened with
    pub fn config(&self) -> &SshConfig {
        &self.config
    }
}

#[async_trait]
impl Connector for SshConnector {
    type Session = SshSession;

    async fn connect(&self) -> Result<SshSession> {
        SshSession::connect(&self.config).await
    }
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn exec(&mut self, command: &str) -> Result<CommandResult> {
        SshSession::exec(self, command).await
    }

    async fn close(&mut self) -> Result<()> {
        SshSession::close(self).await
    }
}
