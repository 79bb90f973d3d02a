//! SSH credential resolution
//!
//! Nodes are reached over SSH once providers create them. The orchestrator
//! does not generate keys: it resolves an existing key pair from the
//! config (inline key or paths, `~` expanded) or from the usual files in
//! `~/.ssh`, and computes the OpenSSH `SHA256:` fingerprint for logging and
//! provider key registration.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::config::SshConfig;

/// Default key files tried in order when nothing is configured
const DEFAULT_KEYS: [&str; 2] = ["id_ed25519", "id_rsa"];

#[derive(Error, Debug)]
pub enum SshError {
    #[error("SSH public key not found (tried: {0})")]
    KeyNotFound(String),

    #[error("Failed to read SSH key {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed SSH public key: {0}")]
    Malformed(String),
}

/// Resolved SSH access for the cluster's nodes
#[derive(Debug, Clone, Serialize)]
pub struct SshCredentials {
    pub user: String,
    pub port: u16,
    /// OpenSSH public key line, e.g. "ssh-ed25519 AAAA... comment"
    pub public_key: String,
    pub private_key_path: Option<PathBuf>,
    pub fingerprint: String,
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

fn read_key(path: &Path) -> Result<String, SshError> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|source| SshError::Read {
            path: path.to_path_buf(),
            source,
        })
}

/// `key.pub` -> `key`
fn private_for(public: &Path) -> Option<PathBuf> {
    let s = public.to_str()?;
    let private = PathBuf::from(s.strip_suffix(".pub")?);
    private.exists().then_some(private)
}

/// Public key file candidates in precedence order
fn candidate_paths(config: &SshConfig, home: Option<&Path>) -> Vec<PathBuf> {
    if let Some(path) = &config.public_key_path {
        return vec![expand_path(path)];
    }
    if let Some(private) = &config.private_key_path {
        return vec![PathBuf::from(format!("{}.pub", expand_path(private).display()))];
    }
    home.map(|h| {
        DEFAULT_KEYS
            .iter()
            .map(|k| h.join(".ssh").join(format!("{}.pub", k)))
            .collect()
    })
    .unwrap_or_default()
}

/// OpenSSH-style fingerprint of a public key line
pub fn fingerprint(public_key: &str) -> Result<String, SshError> {
    let mut fields = public_key.split_whitespace();
    let key_type = fields
        .next()
        .ok_or_else(|| SshError::Malformed("empty key".to_string()))?;
    let blob = fields
        .next()
        .ok_or_else(|| SshError::Malformed(format!("{} key has no key data", key_type)))?;
    let decoded = STANDARD
        .decode(blob)
        .map_err(|e| SshError::Malformed(format!("invalid base64 key data: {}", e)))?;

    let digest = Sha256::digest(&decoded);
    Ok(format!("SHA256:{}", STANDARD_NO_PAD.encode(digest)))
}

/// Resolve credentials with an explicit home directory (pure apart from file reads)
pub fn resolve_ssh_credentials_in(
    config: &SshConfig,
    home: Option<&Path>,
) -> Result<SshCredentials, SshError> {
    let private_key_path = config.private_key_path.as_deref().map(expand_path);

    if let Some(inline) = &config.public_key {
        let public_key = inline.trim().to_string();
        let fingerprint = fingerprint(&public_key)?;
        return Ok(SshCredentials {
            user: config.user.clone(),
            port: config.port,
            public_key,
            private_key_path,
            fingerprint,
        });
    }

    let candidates = candidate_paths(config, home);
    let path = candidates
        .iter()
        .find(|p| p.exists())
        .ok_or_else(|| {
            SshError::KeyNotFound(
                candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            )
        })?;

    debug!("Using SSH public key {}", path.display());
    let public_key = read_key(path)?;
    let fingerprint = fingerprint(&public_key)?;

    Ok(SshCredentials {
        user: config.user.clone(),
        port: config.port,
        public_key,
        private_key_path: private_key_path.or_else(|| private_for(path)),
        fingerprint,
    })
}

/// Resolve credentials, falling back to keys under the user's home directory
pub fn resolve_ssh_credentials(config: &SshConfig) -> Result<SshCredentials, SshError> {
    resolve_ssh_credentials_in(config, dirs::home_dir().as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    // ssh-keygen -t ed25519 test vector
    const PUBLIC_KEY: &str =
        "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl test@kubemesh";

    fn expected_fingerprint() -> String {
        let blob = STANDARD
            .decode("AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl")
            .unwrap();
        format!("SHA256:{}", STANDARD_NO_PAD.encode(Sha256::digest(&blob)))
    }

    #[test]
    fn test_fingerprint_format() {
        let fp = fingerprint(PUBLIC_KEY).unwrap();
        assert!(fp.starts_with("SHA256:"));
        assert!(!fp.ends_with('='));
        assert_eq!(fp, expected_fingerprint());
    }

    #[test]
    fn test_fingerprint_rejects_garbage() {
        assert!(matches!(fingerprint(""), Err(SshError::Malformed(_))));
        assert!(matches!(fingerprint("ssh-rsa"), Err(SshError::Malformed(_))));
        assert!(matches!(
            fingerprint("ssh-rsa !!!notbase64"),
            Err(SshError::Malformed(_))
        ));
    }

    #[test]
    fn test_inline_key_wins() {
        let config = SshConfig {
            public_key: Some(format!("  {}\n", PUBLIC_KEY)),
            public_key_path: Some("/does/not/exist.pub".to_string()),
            ..Default::default()
        };
        let creds = resolve_ssh_credentials_in(&config, None).unwrap();
        assert_eq!(creds.public_key, PUBLIC_KEY);
        assert_eq!(creds.user, "root");
        assert_eq!(creds.port, 22);
    }

    #[test]
    fn test_default_key_in_home() {
        let home = tempfile::tempdir().unwrap();
        let ssh_dir = home.path().join(".ssh");
        std::fs::create_dir(&ssh_dir).unwrap();
        std::fs::write(ssh_dir.join("id_rsa.pub"), PUBLIC_KEY).unwrap();
        std::fs::write(ssh_dir.join("id_rsa"), "private").unwrap();

        let creds = resolve_ssh_credentials_in(&SshConfig::default(), Some(home.path())).unwrap();
        assert_eq!(creds.fingerprint, expected_fingerprint());
        assert_eq!(creds.private_key_path, Some(ssh_dir.join("id_rsa")));
    }

    #[test]
    fn test_missing_key_lists_candidates() {
        let home = tempfile::tempdir().unwrap();
        let err = resolve_ssh_credentials_in(&SshConfig::default(), Some(home.path())).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("id_ed25519.pub"));
        assert!(message.contains("id_rsa.pub"));
    }

    #[test]
    fn test_configured_private_key_implies_public_path() {
        let dir = tempfile::tempdir().unwrap();
        let private = dir.path().join("cluster_key");
        std::fs::write(&private, "private").unwrap();
        std::fs::write(dir.path().join("cluster_key.pub"), PUBLIC_KEY).unwrap();

        let config = SshConfig {
            private_key_path: Some(private.display().to_string()),
            ..Default::default()
        };
        let creds = resolve_ssh_credentials_in(&config, None).unwrap();
        assert_eq!(creds.private_key_path, Some(private));
        assert_eq!(creds.public_key, PUBLIC_KEY);
    }
}
