//! SSH transport module
//!
//! This module provides the russh-backed session used by the command
//! runner: connection, host-key verification, password authentication,
//! command execution and disconnect.

pub mod command;
pub mod config;
pub mod connection;
pub mod handler;
pub mod host_key;

// Re-exports
pub use command::CommandResult;
pub use config::SshConfig;
pub use connection::{SshConnector, SshSession};
pub use handler::SshHandler;
pub use host_key::HostKeyPolicy;
