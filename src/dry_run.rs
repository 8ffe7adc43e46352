//! Dry-run connector
//!
//! Stands in for the SSH transport when `--dry-run` is given: nothing leaves
//! the machine, every command "succeeds" and reports what would have run.

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::runner::{Connector, RemoteSession};
use crate::ssh::CommandResult;

/// Connector whose sessions never touch the network
#[derive(Debug, Clone, Default)]
pub struct DryRunConnector {
    /// Target shown in log lines
    target: String,
}

impl DryRunConnector {
    /// Create a dry-run connector for `target` (e.g. `root@192.168.1.2:22`)
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

#[async_trait]
impl Connector for DryRunConnector {
    type Session = DryRunSession;

    async fn connect(&self) -> Result<DryRunSession> {
        info!("Dry run: not connecting to {}", self.target);
        Ok(DryRunSession)
    }
}

/// Session that echoes commands instead of executing them
#[derive(Debug)]
pub struct DryRunSession;

#[async_trait]
impl RemoteSession for DryRunSession {
    async fn exec(&mut self, command: &str) -> Result<CommandResult> {
        Ok(CommandResult {
            stdout: format!("[dry-run] {}", command),
            ..CommandResult::new(command)
        })
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::CommandRunner;

    #[tokio::test]
    async fn test_dry_run_reports_every_command() {
        let runner = CommandRunner::new(
            DryRunConnector::new("root@192.168.1.2:22"),
            vec!["mkdir isitworking".to_string(), "netstat".to_string()],
        );

        let mut out = Vec::new();
        let mut err = Vec::new();
        let report = runner.run_with(&mut out, &mut err).await.unwrap();

        assert!(report.completed());
        assert_eq!(report.results.len(), 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "$ mkdir isitworking\n[dry-run] mkdir isitworking\n$ netstat\n[dry-run] netstat\n"
        );
        assert!(err.is_empty());
    }
}
