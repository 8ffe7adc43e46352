//! ssh-runner - Entry point
//!
//! Parses CLI arguments, builds the configuration, runs the command
//! sequence once and maps the result to the process exit code.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use ssh_runner::config::{Args, Config};
use ssh_runner::{
    CommandRunner, Connector, DryRunConnector, RunOutcome, RunnerError, SshConnector,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let args = Args::parse();

    // Logs share stderr with command diagnostics, so stay quiet by default
    let default_level = match args.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Validate and create config
    let config = match Config::from_args(args) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("ssh-runner v{} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        "Target {}, timeout {}s, {} command(s)",
        config.target(),
        config.timeout.as_secs(),
        config.commands.len()
    );

    if config.dry_run {
        let target = config.target();
        let (_, commands) = config.into_parts();
        return execute(CommandRunner::new(DryRunConnector::new(target), commands)).await;
    }

    let (ssh_config, commands) = config.into_parts();
    execute(CommandRunner::new(SshConnector::new(ssh_config), commands)).await
}

async fn execute<C: Connector>(runner: CommandRunner<C>) -> ExitCode {
    match runner.run_until(shutdown_signal()).await {
        Ok(report) => {
            match report.outcome {
                RunOutcome::Completed => {
                    info!("All {} command(s) succeeded", report.results.len());
                }
                RunOutcome::Stopped { index, exit_status } => {
                    info!(
                        "Stopped at command {} of {} (exit status {})",
                        index + 1,
                        runner.commands().len(),
                        exit_status
                    );
                }
            }
            ExitCode::SUCCESS
        }
        Err(RunnerError::Interrupted) => {
            warn!("Run interrupted");
            ExitCode::from(130)
        }
        Err(e) if e.is_fatal_connect() => {
            error!("Could not open session: {}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("Run aborted: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    tokio::select! {
        _ = interrupt() => {
            info!("Received SIGINT (Ctrl+C), shutting down...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}

async fn interrupt() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("Failed to register SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}
