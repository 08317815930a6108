use config::{Config, ConfigBuilder, ConfigError, Environment, File as ConfigFile};
use config::builder::DefaultState;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const REDACTED: &str = "********";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub remote: RemoteConfig,
    pub local: LocalConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub private_key: Option<PathBuf>,
    #[serde(default)]
    pub passphrase: Option<String>,
    pub directory: String,
    /// Blocking timeout applied to every session call. 0 disables it.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LocalConfig {
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_path")]
    pub path: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: default_catalog_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransferConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_recursive")]
    pub recursive: bool,
    #[serde(default)]
    pub retries: u32,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            recursive: default_recursive(),
            retries: 0,
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_port() -> u16 {
    22
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_catalog_path() -> String {
    "sftp_mirror.db".to_string()
}

fn default_workers() -> usize {
    1
}

fn default_recursive() -> bool {
    true
}

fn default_chunk_size() -> usize {
    crate::fetcher::DEFAULT_CHUNK_SIZE
}

/// Load configuration from `<name>.toml` (optional) overlaid with `MIRROR_*`
/// environment variables, e.g. `MIRROR_REMOTE__PASSWORD`.
pub fn load_configuration(name: &str) -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name(name).required(false))
        .add_source(
            Environment::with_prefix("MIRROR")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
    finish(builder)
}

fn finish(builder: ConfigBuilder<DefaultState>) -> Result<AppConfig, ConfigError> {
    let config = builder.build()?.try_deserialize::<AppConfig>()?;
    config.validate()?;
    Ok(config)
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("remote.host", self.remote.host.trim().is_empty()),
            ("remote.username", self.remote.username.trim().is_empty()),
            ("remote.directory", self.remote.directory.trim().is_empty()),
            ("local.directory", self.local.directory.as_os_str().is_empty()),
            ("catalog.path", self.catalog.path.trim().is_empty()),
        ];
        if let Some((key, _)) = required.iter().find(|(_, empty)| *empty) {
            return Err(ConfigError::Message(format!("{} must not be empty", key)));
        }
        if self.transfer.workers == 0 {
            return Err(ConfigError::Message(
                "transfer.workers must be at least 1".to_string(),
            ));
        }
        if self.transfer.chunk_size == 0 {
            return Err(ConfigError::Message(
                "transfer.chunk_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> AppConfig {
        let mut copy = self.clone();
        if copy.remote.password.is_some() {
            copy.remote.password = Some(REDACTED.to_string());
        }
        if copy.remote.passphrase.is_some() {
            copy.remote.passphrase = Some(REDACTED.to_string());
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn parse(toml: &str) -> Result<AppConfig, ConfigError> {
        finish(Config::builder().add_source(ConfigFile::from_str(toml, FileFormat::Toml)))
    }

    const MINIMAL: &str = r#"
        [remote]
        host = "sftp.example.com"
        username = "mirror"
        password = "hunter2"
        directory = "/outgoing"

        [local]
        directory = "/var/mirror"
    "#;

    #[test]
    fn test_defaults_applied() {
        let config = parse(MINIMAL).unwrap();
        assert_eq!(config.remote.port, 22);
        assert_eq!(config.remote.timeout_secs, 30);
        assert_eq!(config.catalog.path, "sftp_mirror.db");
        assert_eq!(config.transfer.workers, 1);
        assert!(config.transfer.recursive);
        assert_eq!(config.transfer.retries, 0);
        assert_eq!(config.transfer.chunk_size, crate::fetcher::DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_explicit_values_override_defaults() {
        let toml = format!(
            "{}\n[transfer]\nworkers = 4\nrecursive = false\nretries = 2\n\n[catalog]\npath = \"/tmp/c.db\"\n",
            MINIMAL
        );
        let config = parse(&toml).unwrap();
        assert_eq!(config.transfer.workers, 4);
        assert!(!config.transfer.recursive);
        assert_eq!(config.transfer.retries, 2);
        assert_eq!(config.catalog.path, "/tmp/c.db");
    }

    #[test]
    fn test_zero_workers_rejected() {
        let toml = format!("{}\n[transfer]\nworkers = 0\n", MINIMAL);
        let err = parse(&toml).unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn test_empty_host_rejected() {
        let toml = MINIMAL.replace("sftp.example.com", " ");
        let err = parse(&toml).unwrap_err();
        assert!(err.to_string().contains("remote.host"));
    }

    #[test]
    fn test_missing_remote_section_is_error() {
        let err = parse("[local]\ndirectory = \"/tmp\"\n");
        assert!(err.is_err());
    }

    #[test]
    fn test_redacted_masks_secrets() {
        let config = parse(MINIMAL).unwrap();
        let redacted = config.redacted();
        assert_eq!(redacted.remote.password.as_deref(), Some(REDACTED));
        assert_eq!(redacted.remote.passphrase, None);
        assert_eq!(config.remote.password.as_deref(), Some("hunter2"));
    }
}
