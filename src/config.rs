//! Mount configuration: tunables loadable from an optional TOML file and
//! overridable by CLI flags, plus credential resolution.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::cache_manager::CacheManager;
use crate::fs::FsConfig;

/// Resolved AWS-style credentials for the S3 backend.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// Tunables loaded from TOML and/or CLI flags.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub stat_cache_max_size: usize,
    pub stat_cache_ttl_secs: u64,
    pub fd_cache_max_open: usize,
    pub page_size: u64,
    pub max_dirty_data: i64,
    pub enable_file_lock: bool,
    pub uid: u32,
    pub gid: u32,
}

impl Default for Config {
    fn default() -> Self {
        let fs = FsConfig::default();
        Self {
            stat_cache_max_size: 1000,
            stat_cache_ttl_secs: 5 * 60,
            fd_cache_max_open: crate::fd::cache::DEFAULT_MAX_OPEN,
            page_size: fs.page_size,
            max_dirty_data: fs.max_dirty_data,
            enable_file_lock: fs.enable_file_lock,
            uid: fs.uid,
            gid: fs.gid,
        }
    }
}

impl Config {
    /// Load from a TOML file, falling back to defaults for any field the
    /// file omits.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        toml::from_str(&text).map_err(ConfigError::Parse)
    }

    pub fn fs_config(&self) -> FsConfig {
        FsConfig {
            page_size: self.page_size,
            max_dirty_data: self.max_dirty_data,
            enable_file_lock: self.enable_file_lock,
            uid: self.uid,
            gid: self.gid,
            ..FsConfig::default()
        }
    }

    pub fn cache_manager(&self) -> CacheManager {
        CacheManager::new(
            self.stat_cache_max_size,
            Duration::from_secs(self.stat_cache_ttl_secs),
            self.fd_cache_max_open,
            self.page_size,
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(toml::de::Error),
}

/// Resolve credentials from a `--passwd_file` (two-field `ACCESS:SECRET`)
/// or, failing that, from the standard AWS environment variables.
pub fn resolve_credentials(passwd_file: Option<&Path>) -> Result<Credentials, CredentialError> {
    if let Some(path) = passwd_file {
        let text = std::fs::read_to_string(path).map_err(CredentialError::Read)?;
        let line = text.lines().find(|l| !l.trim().is_empty()).ok_or(CredentialError::Malformed)?;
        let (access, secret) = line.split_once(':').ok_or(CredentialError::Malformed)?;
        return Ok(Credentials {
            access_key_id: access.trim().to_string(),
            secret_access_key: secret.trim().to_string(),
            session_token: None,
        });
    }

    let access_key_id =
        std::env::var("AWS_ACCESS_KEY_ID").map_err(|_| CredentialError::MissingEnv("AWS_ACCESS_KEY_ID"))?;
    let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
        .map_err(|_| CredentialError::MissingEnv("AWS_SECRET_ACCESS_KEY"))?;
    let session_token = std::env::var("AWS_SESSION_TOKEN").ok();
    Ok(Credentials { access_key_id, secret_access_key, session_token })
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("failed to read passwd file: {0}")]
    Read(std::io::Error),
    #[error("passwd file must contain a non-empty ACCESS:SECRET line")]
    Malformed,
    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_fs_defaults() {
        let cfg = Config::default();
        let fs = cfg.fs_config();
        assert_eq!(fs.page_size, FsConfig::default().page_size);
        assert_eq!(fs.max_dirty_data, FsConfig::default().max_dirty_data);
    }

    #[test]
    fn toml_overrides_merge_with_defaults() {
        let parsed: Config = toml::from_str("enable_file_lock = true\n").unwrap();
        assert!(parsed.enable_file_lock);
        assert_eq!(parsed.stat_cache_max_size, Config::default().stat_cache_max_size);
    }

    #[test]
    fn passwd_file_parses_access_and_secret() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("passwd");
        std::fs::write(&path, "AKIA_TEST:secret-value\n").unwrap();
        let creds = resolve_credentials(Some(&path)).unwrap();
        assert_eq!(creds.access_key_id, "AKIA_TEST");
        assert_eq!(creds.secret_access_key, "secret-value");
    }

    #[test]
    fn missing_passwd_file_and_env_errors() {
        std::env::remove_var("AWS_ACCESS_KEY_ID");
        std::env::remove_var("AWS_SECRET_ACCESS_KEY");
        assert!(matches!(resolve_credentials(None), Err(CredentialError::MissingEnv(_))));
    }
}
