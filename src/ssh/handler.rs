//! SSH client handler implementation
//!
//! Implements the `russh::client::Handler` trait; the only event handled is
//! server key verification, delegated to the configured [`HostKeyPolicy`].

use super::host_key::HostKeyPolicy;

/// SSH client handler for russh
#[derive(Debug, Clone)]
pub struct SshHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl SshHandler {
    /// Create a handler that verifies `host:port` with `policy`
    pub fn new(host: impl Into<String>, port: u16, policy: HostKeyPolicy) -> Self {
        Self {
            host: host.into(),
            port,
            policy,
        }
    }
}

impl russh::client::Handler for SshHandler {
    type Error = anyhow::Error;

    /// Returning `false` makes russh abort the handshake with `Error::UnknownKey`
    async fn check_server_key(
        &mut self,
        server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(self.policy.verify(&self.host, self.port, server_public_key))
    }
}
