//! SSH configuration types
//!
//! Connection parameters for one session: address, credentials, timeouts
//! and the host-key policy.

use std::time::Duration;

use secrecy::SecretString;

use super::host_key::HostKeyPolicy;

/// Default SSH port
pub const DEFAULT_PORT: u16 = 22;

/// Default timeout for establishing the connection
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// SSH connection configuration
#[derive(Debug)]
pub struct SshConfig {
    /// Remote hostname or IP address
    pub host: String,

    /// SSH port (default: 22)
    pub port: u16,

    /// Username for authentication
    pub username: String,

    /// Password for password authentication
    pub password: SecretString,

    /// Bound on TCP connect plus SSH handshake
    pub connect_timeout: Duration,

    /// Bound on a single command (None = wait for the remote process)
    pub command_timeout: Option<Duration>,

    /// How the server's host key is verified
    pub host_key_policy: HostKeyPolicy,
}

impl SshConfig {
    /// Create a new SSH configuration with the required fields
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            username: username.into(),
            password,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            command_timeout: None,
            host_key_policy: HostKeyPolicy::default(),
        }
    }

    /// Set the SSH port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-command timeout
    pub fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Set the host-key policy
    pub fn with_host_key_policy(mut self, policy: HostKeyPolicy) -> Self {
        self.host_key_policy = policy;
        self
    }

    /// `host:port` for logs and errors
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_ssh_config_builder() {
        let config = SshConfig::new("192.168.1.2", "root", SecretString::new("root".into()))
            .with_port(2222)
            .with_connect_timeout(Duration::from_secs(3))
            .with_host_key_policy(HostKeyPolicy::AcceptAny);

        assert_eq!(config.host, "192.168.1.2");
        assert_eq!(config.port, 2222);
        assert_eq!(config.username, "root");
        assert_eq!(config.password.expose_secret(), "root");
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert!(config.command_timeout.is_none());
        assert_eq!(config.host_key_policy, HostKeyPolicy::AcceptAny);
        assert_eq!(config.address(), "192.168.1.2:2222");
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = SshConfig::new("router", "root", SecretString::new("hunter2".into()));
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
    }
}
