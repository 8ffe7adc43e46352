//! ssh-runner - run an ordered list of shell commands on a remote host
//!
//! Opens one SSH session, authenticates with a username and password, runs
//! each configured command in order and prints its output. The sequence
//! stops at the first command that exits with a non-zero status, and the
//! session is closed on every exit path.
//!
//! # Features
//!
//! - Password authentication over a single session (no agent, no key files)
//! - Pluggable host-key verification (known_hosts, trust-on-first-use,
//!   pinned fingerprints, or an explicit accept-any opt-in)
//! - Configuration from flags, environment variables or a `key=value` file
//! - Dry-run mode that prints the commands without connecting
//!
//! # Example Usage (CLI)
//!
//! ```bash
//! ssh-runner --host=192.168.1.2 --user=root --password=secret \
//!   -c 'mkdir isitworking' -c 'ls -d isitworking'
//! ```

pub mod commands;
pub mod config;
pub mod dry_run;
pub mod error;
pub mod runner;
pub mod ssh;

// Re-exports for convenience
pub use crate::config::{Args, Config, HostKeyMode};
pub use dry_run::DryRunConnector;
pub use error::{Result, RunnerError};
pub use runner::{CommandRunner, Connector, RemoteSession, RunOutcome, RunReport};
pub use ssh::{CommandResult, HostKeyPolicy, SshConfig, SshConnector, SshSession};
