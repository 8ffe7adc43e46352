//! Host-identity verification policies
//!
//! Decides whether a server's public key is trusted before authentication
//! happens. `StrictKnownHosts` is the default; accepting any key has to be
//! asked for explicitly.

use std::path::{Path, PathBuf};

use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::ssh_key::HashAlg;
use russh::keys::PublicKey;
use tracing::{debug, error, warn};

/// How the server's host key is verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Accept every key. Insecure: anyone on the path can impersonate the host.
    AcceptAny,

    /// Accept and record keys of unknown hosts; reject keys that changed
    TrustOnFirstUse {
        /// known_hosts file (None = ~/.ssh/known_hosts)
        known_hosts: Option<PathBuf>,
    },

    /// Accept only keys already present in known_hosts
    StrictKnownHosts {
        /// known_hosts file (None = ~/.ssh/known_hosts)
        known_hosts: Option<PathBuf>,
    },

    /// Accept only keys whose SHA-256 fingerprint is listed
    RejectUnknown {
        /// Allowed fingerprints, with or without the `SHA256:` prefix
        fingerprints: Vec<String>,
    },
}

impl Default for HostKeyPolicy {
    fn default() -> Self {
        HostKeyPolicy::StrictKnownHosts { known_hosts: None }
    }
}

impl HostKeyPolicy {
    /// Whether this policy skips verification entirely
    pub fn is_insecure(&self) -> bool {
        matches!(self, HostKeyPolicy::AcceptAny)
    }

    /// Check `key` presented by `host:port` against this policy
    pub fn verify(&self, host: &str, port: u16, key: &PublicKey) -> bool {
        match self {
            HostKeyPolicy::AcceptAny => {
                warn!(
                    "Accepting host key for {}:{} without verification ({})",
                    host,
                    port,
                    fingerprint(key)
                );
                true
            }
            HostKeyPolicy::TrustOnFirstUse { known_hosts } => {
                match lookup(host, port, key, known_hosts.as_deref()) {
                    Ok(true) => true,
                    Err(russh::keys::Error::KeyChanged { line }) => {
                        error!(
                            "Host key for {}:{} does not match known_hosts line {}",
                            host, port, line
                        );
                        false
                    }
                    Ok(false) | Err(_) => {
                        warn!(
                            "Trust-On-First-Use: accepting unknown host key for {}:{} ({})",
                            host,
                            port,
                            fingerprint(key)
                        );
                        if let Err(e) = learn(host, port, key, known_hosts.as_deref()) {
                            warn!("Failed to save host key to known_hosts: {}", e);
                        }
                        true
                    }
                }
            }
            HostKeyPolicy::StrictKnownHosts { known_hosts } => {
                match lookup(host, port, key, known_hosts.as_deref()) {
                    Ok(true) => true,
                    Ok(false) => {
                        error!(
                            "Host {}:{} is not in known_hosts ({})",
                            host,
                            port,
                            fingerprint(key)
                        );
                        false
                    }
                    Err(e) => {
                        error!("Host key check for {}:{} failed: {}", host, port, e);
                        false
                    }
                }
            }
            HostKeyPolicy::RejectUnknown { fingerprints } => {
                let presented = fingerprint(key);
                let accepted = fingerprints
                    .iter()
                    .any(|allowed| strip_prefix(allowed) == strip_prefix(&presented));
                if accepted {
                    debug!("Host key {} is pinned", presented);
                } else {
                    error!(
                        "Host key {} for {}:{} is not in the allowed list",
                        presented, host, port
                    );
                }
                accepted
            }
        }
    }
}

/// SHA-256 fingerprint in OpenSSH notation (`SHA256:...`)
pub fn fingerprint(key: &PublicKey) -> String {
    key.fingerprint(HashAlg::Sha256).to_string()
}

fn strip_prefix(fingerprint: &str) -> &str {
    fingerprint
        .trim()
        .strip_prefix("SHA256:")
        .unwrap_or(fingerprint.trim())
}

fn lookup(
    host: &str,
    port: u16,
    key: &PublicKey,
    path: Option<&Path>,
) -> Result<bool, russh::keys::Error> {
    match path {
        Some(path) => check_known_hosts_path(host, port, key, path),
        None => check_known_hosts(host, port, key),
    }
}

fn learn(
    host: &str,
    port: u16,
    key: &PublicKey,
    path: Option<&Path>,
) -> Result<(), russh::keys::Error> {
    match path {
        Some(path) => learn_known_hosts_path(host, port, key, path),
        None => learn_known_hosts(host, port, key),
    }
}
