//! Command list validation
//!
//! Commands come from repeated `--command` flags or a commands file; either
//! way they are trimmed and checked here before any connection is made.

use std::path::Path;

use crate::error::{Result, RunnerError};

/// Sanitize a command before execution
///
/// Trims surrounding whitespace and rejects empty commands and commands
/// containing NUL bytes (which cannot be sent in an SSH exec request).
///
/// # Examples
/// ```
/// use ssh_runner::commands::sanitize_command;
///
/// let cmd = sanitize_command("  mkdir isitworking  ").unwrap();
/// assert_eq!(cmd, "mkdir isitworking");
///
/// assert!(sanitize_command("   ").is_err());
/// ```
pub fn sanitize_command(command: &str) -> Result<String> {
    let trimmed = command.trim();

    if trimmed.is_empty() {
        return Err(RunnerError::config("Command cannot be empty"));
    }

    if trimmed.contains('\0') {
        return Err(RunnerError::config(format!(
            "Command contains a NUL byte: {:?}",
            trimmed
        )));
    }

    Ok(trimmed.to_string())
}

/// Sanitize a whole command list; the list itself must not be empty
pub fn sanitize_commands<I, S>(commands: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let commands = commands
        .into_iter()
        .map(|c| sanitize_command(c.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    if commands.is_empty() {
        return Err(RunnerError::config(
            "No commands given (use --command or --commands-file)",
        ));
    }

    Ok(commands)
}

/// Parse a commands file: one command per line, blank lines and `#`
/// comments skipped
pub fn parse_commands(text: &str) -> Vec<&str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect()
}

/// Read and parse a commands file
pub fn read_commands_file(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        RunnerError::config(format!(
            "Cannot read commands file {}: {}",
            path.display(),
            e
        ))
    })?;

    sanitize_commands(parse_commands(&text))
}
