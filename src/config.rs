//! Configuration and CLI argument parsing
//!
//! Every setting can come from a flag, an environment variable or a
//! `key=value` config file (the router's `router_cli.conf` format), in that
//! order of precedence, falling back to the router defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};
use secrecy::SecretString;
use serde::Deserialize;

use crate::commands::{read_commands_file, sanitize_commands};
use crate::error::{Result, RunnerError};
use crate::ssh::{HostKeyPolicy, SshConfig};

/// Default host when none is configured
pub const DEFAULT_HOST: &str = "192.168.1.2";

/// Default SSH username
pub const DEFAULT_USER: &str = "root";

/// Default connection timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Host-key verification mode as given on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum HostKeyMode {
    /// Accept any host key (insecure)
    AcceptAny,
    /// Accept and remember unknown hosts, reject changed keys
    #[value(alias = "tofu")]
    TrustOnFirstUse,
    /// Accept only hosts already in known_hosts
    #[default]
    #[value(alias = "strict")]
    StrictKnownHosts,
    /// Accept only the fingerprints given with --host-key-fingerprint
    #[value(alias = "pinned")]
    RejectUnknown,
}

/// ssh-runner CLI arguments
#[derive(Parser, Debug, Clone)]
#[command(name = "ssh-runner")]
#[command(version)]
#[command(about = "Run an ordered list of shell commands on a remote host over one SSH session")]
pub struct Args {
    /// SSH host to connect to [default: 192.168.1.2]
    #[arg(long, env = "SSH_RUNNER_HOST")]
    pub host: Option<String>,

    /// SSH port [default: 22]
    #[arg(long, env = "SSH_RUNNER_PORT")]
    pub port: Option<u16>,

    /// SSH username [default: root]
    #[arg(long, env = "SSH_RUNNER_USER")]
    pub user: Option<String>,

    /// SSH password
    #[arg(long, env = "SSH_RUNNER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Connection timeout in seconds [default: 10]
    #[arg(long, env = "SSH_RUNNER_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Per-command timeout in seconds (unset = wait for the command)
    #[arg(long, env = "SSH_RUNNER_COMMAND_TIMEOUT")]
    pub command_timeout: Option<u64>,

    /// Command to run; repeat for several, they run in the given order
    #[arg(short = 'c', long = "command")]
    pub commands: Vec<String>,

    /// File with one command per line (# starts a comment)
    #[arg(long, conflicts_with = "commands")]
    pub commands_file: Option<PathBuf>,

    /// key=value config file (router_ip, router_port, username, password, timeout)
    #[arg(long, env = "SSH_RUNNER_CONFIG")]
    pub config: Option<PathBuf>,

    /// How the server host key is verified
    #[arg(
        long,
        value_enum,
        default_value_t = HostKeyMode::default(),
        env = "SSH_RUNNER_HOST_KEY_POLICY"
    )]
    pub host_key_policy: HostKeyMode,

    /// Allowed SHA-256 host key fingerprint for reject-unknown; repeatable
    #[arg(long = "host-key-fingerprint")]
    pub host_key_fingerprints: Vec<String>,

    /// known_hosts file [default: ~/.ssh/known_hosts]
    #[arg(long, env = "SSH_RUNNER_KNOWN_HOSTS")]
    pub known_hosts: Option<PathBuf>,

    /// Print the commands instead of connecting and running them
    #[arg(long)]
    pub dry_run: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

/// Settings read from the config file; every key is optional
#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    router_ip: Option<String>,
    router_port: Option<u16>,
    username: Option<String>,
    password: Option<SecretString>,
    timeout: Option<u64>,
}

impl FileSettings {
    fn load(path: &Path) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::new(&path.to_string_lossy(), RouterConf))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

/// `router_cli.conf` format: one `key=value` per line, split at the first
/// `=`, the value kept byte for byte. The first occurrence of a key wins and
/// lines without `=` are ignored.
#[derive(Debug, Clone, Copy)]
struct RouterConf;

impl ::config::Format for RouterConf {
    fn parse(
        &self,
        uri: Option<&String>,
        text: &str,
    ) -> std::result::Result<
        ::config::Map<String, ::config::Value>,
        Box<dyn std::error::Error + Send + Sync>,
    > {
        let mut map = ::config::Map::new();
        for (key, value) in parse_key_values(text) {
            map.entry(key.to_string())
                .or_insert_with(|| ::config::Value::new(uri, value.to_string()));
        }
        Ok(map)
    }
}

impl ::config::FileStoredFormat for RouterConf {
    fn file_extensions(&self) -> &'static [&'static str] {
        &["conf"]
    }
}

fn parse_key_values(text: &str) -> impl Iterator<Item = (&str, &str)> {
    text.lines()
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .filter(|(key, _)| !key.is_empty())
}

/// Parsed and validated configuration
#[derive(Debug)]
pub struct Config {
    /// SSH host
    pub host: String,

    /// SSH port
    pub port: u16,

    /// SSH username
    pub user: String,

    /// SSH password
    pub password: SecretString,

    /// Connection timeout
    pub timeout: Duration,

    /// Per-command timeout
    pub command_timeout: Option<Duration>,

    /// Commands to run, in order
    pub commands: Vec<String>,

    /// Host-key verification policy
    pub host_key_policy: HostKeyPolicy,

    /// Whether to skip the connection and only print commands
    pub dry_run: bool,
}

impl Config {
    /// Create Config from CLI Args, merging the config file when given
    pub fn from_args(args: Args) -> Result<Self> {
        let file = match args.config.as_deref() {
            Some(path) => FileSettings::load(path)?,
            None => FileSettings::default(),
        };

        let commands = match args.commands_file.as_deref() {
            Some(path) => read_commands_file(path)?,
            None => sanitize_commands(&args.commands)?,
        };

        let host = args
            .host
            .or(file.router_ip)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = args
            .port
            .or(file.router_port)
            .unwrap_or(crate::ssh::config::DEFAULT_PORT);
        let user = args
            .user
            .or(file.username)
            .unwrap_or_else(|| DEFAULT_USER.to_string());
        let timeout_secs = args
            .timeout
            .or(file.timeout)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let password = sanitize_password(args.password)
            .map(SecretString::new)
            .or(file.password);

        let host_key_policy = build_host_key_policy(
            args.host_key_policy,
            args.host_key_fingerprints,
            args.known_hosts,
        );

        validate(&host, &user, timeout_secs, &host_key_policy)?;

        let password = match (password, args.dry_run) {
            (Some(password), _) => password,
            (None, true) => SecretString::new(String::new()),
            (None, false) => {
                return Err(RunnerError::config(
                    "Missing password (use --password, SSH_RUNNER_PASSWORD or the config file)",
                ))
            }
        };

        Ok(Config {
            host,
            port,
            user,
            password,
            timeout: Duration::from_secs(timeout_secs),
            command_timeout: args
                .command_timeout
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            commands,
            host_key_policy,
            dry_run: args.dry_run,
        })
    }

    /// `user@host:port` for logs
    pub fn target(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }

    /// Split into the SSH connection settings and the command list
    pub fn into_parts(self) -> (SshConfig, Vec<String>) {
        let ssh = SshConfig::new(self.host, self.user, self.password)
            .with_port(self.port)
            .with_connect_timeout(self.timeout)
            .with_command_timeout(self.command_timeout)
            .with_host_key_policy(self.host_key_policy);
        (ssh, self.commands)
    }
}

fn build_host_key_policy(
    mode: HostKeyMode,
    fingerprints: Vec<String>,
    known_hosts: Option<PathBuf>,
) -> HostKeyPolicy {
    match mode {
        HostKeyMode::AcceptAny => HostKeyPolicy::AcceptAny,
        HostKeyMode::TrustOnFirstUse => HostKeyPolicy::TrustOnFirstUse { known_hosts },
        HostKeyMode::StrictKnownHosts => HostKeyPolicy::StrictKnownHosts { known_hosts },
        HostKeyMode::RejectUnknown => HostKeyPolicy::RejectUnknown { fingerprints },
    }
}

/// Validate merged settings, collecting every problem
fn validate(host: &str, user: &str, timeout_secs: u64, policy: &HostKeyPolicy) -> Result<()> {
    let mut errors = Vec::new();

    if host.trim().is_empty() {
        errors.push("Host cannot be empty".to_string());
    }

    if user.trim().is_empty() {
        errors.push("User cannot be empty".to_string());
    }

    if timeout_secs == 0 {
        errors.push("Timeout must be at least 1 second".to_string());
    }

    if let HostKeyPolicy::RejectUnknown { fingerprints } = policy {
        if fingerprints.is_empty() {
            errors.push(
                "reject-unknown host key policy needs at least one --host-key-fingerprint"
                    .to_string(),
            );
        }
    }

    if !errors.is_empty() {
        return Err(RunnerError::Config(errors.join("\n")));
    }

    Ok(())
}

/// Sanitize password: return None if empty
fn sanitize_password(password: Option<String>) -> Option<String> {
    password.filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn parse(argv: &[&str]) -> Args {
        let mut full = vec!["ssh-runner"];
        full.extend_from_slice(argv);
        Args::try_parse_from(full).unwrap()
    }

    fn write_config(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("router_cli.conf");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_args(parse(&["--password", "root", "-c", "uptime"])).unwrap();

        assert_eq!(config.host, DEFAULT_HOST);
        assert_eq!(config.port, 22);
        assert_eq!(config.user, DEFAULT_USER);
        assert_eq!(config.password.expose_secret(), "root");
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert!(config.command_timeout.is_none());
        assert_eq!(config.commands, vec!["uptime"]);
        assert_eq!(config.host_key_policy, HostKeyPolicy::default());
        assert!(!config.dry_run);
        assert_eq!(config.target(), "root@192.168.1.2:22");
    }

    #[test]
    fn test_commands_keep_order() {
        let config = Config::from_args(parse(&[
            "--password", "x", "-c", "mkdir a", "--command", "ls a", "-c", "rmdir a",
        ]))
        .unwrap();
        assert_eq!(config.commands, vec!["mkdir a", "ls a", "rmdir a"]);
    }

    #[test]
    fn test_missing_commands() {
        let err = Config::from_args(parse(&["--password", "x"])).unwrap_err();
        assert!(err.to_string().contains("No commands given"));
    }

    #[test]
    fn test_missing_password() {
        let err = Config::from_args(parse(&["-c", "uptime"])).unwrap_err();
        assert!(err.to_string().contains("Missing password"));

        // Empty password counts as missing
        let err = Config::from_args(parse(&["--password", "", "-c", "uptime"])).unwrap_err();
        assert!(err.to_string().contains("Missing password"));
    }

    #[test]
    fn test_dry_run_needs_no_password() {
        let config = Config::from_args(parse(&["--dry-run", "-c", "uptime"])).unwrap();
        assert!(config.dry_run);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err =
            Config::from_args(parse(&["--password", "x", "--timeout", "0", "-c", "uptime"]))
                .unwrap_err();
        assert!(err.to_string().contains("Timeout"));
    }

    #[test]
    fn test_command_timeout_zero_means_unset() {
        let config = Config::from_args(parse(&[
            "--password", "x", "--command-timeout", "0", "-c", "uptime",
        ]))
        .unwrap();
        assert!(config.command_timeout.is_none());

        let config = Config::from_args(parse(&[
            "--password", "x", "--command-timeout", "30", "-c", "uptime",
        ]))
        .unwrap();
        assert_eq!(config.command_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_config_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "router_ip=10.0.0.5\nrouter_port=2222\nusername=admin\npassword=s3cret\ntimeout=3\n",
        );

        let config = Config::from_args(parse(&[
            "--config",
            path.to_str().unwrap(),
            "-c",
            "uptime",
        ]))
        .unwrap();

        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.port, 2222);
        assert_eq!(config.user, "admin");
        assert_eq!(config.password.expose_secret(), "s3cret");
        assert_eq!(config.timeout, Duration::from_secs(3));
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "router_ip=10.0.0.5\nusername=admin\npassword=s3cret\n");

        let config = Config::from_args(parse(&[
            "--config",
            path.to_str().unwrap(),
            "--host",
            "10.0.0.9",
            "--password",
            "override",
            "-c",
            "uptime",
        ]))
        .unwrap();

        assert_eq!(config.host, "10.0.0.9");
        assert_eq!(config.user, "admin");
        assert_eq!(config.password.expose_secret(), "override");
        assert_eq!(config.port, 22);
    }

    #[test]
    fn test_missing_config_file() {
        let err = Config::from_args(parse(&[
            "--config",
            "/nonexistent/router_cli.conf",
            "--password",
            "x",
            "-c",
            "uptime",
        ]))
        .unwrap_err();
        assert!(matches!(err, RunnerError::ConfigFile(_)));
    }

    #[test]
    fn test_commands_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commands.txt");
        std::fs::write(&path, "# setup\nmkdir isitworking\nls\n").unwrap();

        let config = Config::from_args(parse(&[
            "--password",
            "x",
            "--commands-file",
            path.to_str().unwrap(),
        ]))
        .unwrap();
        assert_eq!(config.commands, vec!["mkdir isitworking", "ls"]);
    }

    #[test]
    fn test_commands_and_commands_file_conflict() {
        let result = Args::try_parse_from([
            "ssh-runner",
            "-c",
            "uptime",
            "--commands-file",
            "commands.txt",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_host_key_policy_modes() {
        let config = Config::from_args(parse(&[
            "--password",
            "x",
            "--host-key-policy",
            "tofu",
            "--known-hosts",
            "/tmp/known_hosts",
            "-c",
            "uptime",
        ]))
        .unwrap();
        assert_eq!(
            config.host_key_policy,
            HostKeyPolicy::TrustOnFirstUse {
                known_hosts: Some(PathBuf::from("/tmp/known_hosts"))
            }
        );

        let config = Config::from_args(parse(&[
            "--password",
            "x",
            "--host-key-policy",
            "accept-any",
            "-c",
            "uptime",
        ]))
        .unwrap();
        assert!(config.host_key_policy.is_insecure());
    }

    #[test]
    fn test_reject_unknown_requires_fingerprint() {
        let err = Config::from_args(parse(&[
            "--password",
            "x",
            "--host-key-policy",
            "reject-unknown",
            "-c",
            "uptime",
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("--host-key-fingerprint"));

        let config = Config::from_args(parse(&[
            "--password",
            "x",
            "--host-key-policy",
            "pinned",
            "--host-key-fingerprint",
            "SHA256:bbXpuKG6zhzdmnxq256TlqzFBzRl2f6OOg722cYNbU8",
            "-c",
            "uptime",
        ]))
        .unwrap();
        assert!(matches!(
            config.host_key_policy,
            HostKeyPolicy::RejectUnknown { ref fingerprints } if fingerprints.len() == 1
        ));
    }

    #[test]
    fn test_into_parts() {
        let config = Config::from_args(parse(&[
            "--host", "10.1.1.1", "--port", "2200", "--password", "x", "-c", "uptime",
        ]))
        .unwrap();

        let (ssh, commands) = config.into_parts();
        assert_eq!(ssh.address(), "10.1.1.1:2200");
        assert_eq!(ssh.connect_timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(commands, vec!["uptime"]);
    }

    #[test]
    fn test_sanitize_password() {
        assert_eq!(
            sanitize_password(Some("secret".to_string())),
            Some("secret".to_string())
        );
        assert_eq!(sanitize_password(Some("".to_string())), None);
        assert_eq!(sanitize_password(None), None);
    }

    #[test]
    fn test_config_file_values_are_raw() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "username=admin\npassword=pa\\ss\"q\"=x ;y #z \nrouter_ip=10.0.0.5\n",
        );

        let config = Config::from_args(parse(&[
            "--config",
            path.to_str().unwrap(),
            "-c",
            "uptime",
        ]))
        .unwrap();

        assert_eq!(config.password.expose_secret(), "pa\\ss\"q\"=x ;y #z ");
        assert_eq!(config.host, "10.0.0.5");
    }

    #[test]
    fn test_config_file_quoted_password() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "password=\"quoted\"\npassword=second\n");

        let config = Config::from_args(parse(&[
            "--config",
            path.to_str().unwrap(),
            "-c",
            "uptime",
        ]))
        .unwrap();

        // Quotes are part of the secret; a repeated key does not override
        assert_eq!(config.password.expose_secret(), "\"quoted\"");
    }

    #[test]
    fn test_parse_key_values() {
        let pairs: Vec<_> =
            parse_key_values("# note\nrouter_ip=10.0.0.1\nbogus line\n=orphan\nk=a=b\r\n")
                .collect();
        assert_eq!(pairs, vec![("router_ip", "10.0.0.1"), ("k", "a=b")]);
    }
}
