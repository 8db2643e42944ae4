use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;

/// Only ever read from the environment, never from the config file
pub const SMTP_PASSWORD_VAR: &str = "TRIAGE_SMTP_PASSWORD";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,
    #[serde(default)]
    pub smtp: SmtpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub security: SmtpSecurity,
    #[serde(default)]
    pub username: Option<String>,
    /// Sender address
    #[serde(default)]
    pub from: Option<String>,
    #[serde(skip)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpSecurity {
    /// Implicit TLS, usually port 465
    #[default]
    Tls,
    /// Plain connection upgraded with STARTTLS, usually port 587
    StartTls,
    /// No encryption. Local relays only.
    None,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine the configuration directory")]
    ConfigDirNotFound,

    #[error("Failed to read config from '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config '{path}': {source}")]
    ParseFailed {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_path: default_data_path(),
            model_path: default_model_path(),
            smtp: SmtpConfig::default(),
        }
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_smtp_port(),
            security: SmtpSecurity::default(),
            username: None,
            from: None,
            password: None,
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("triage")
}

fn default_data_path() -> PathBuf {
    data_dir().join("tasks.csv")
}

fn default_model_path() -> PathBuf {
    data_dir().join("priority_model.json")
}

fn default_smtp_port() -> u16 {
    465
}

impl Config {
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("triage").join("config.toml"))
            .ok_or(ConfigError::ConfigDirNotFound)
    }

    /// Reads `path`, or the default location when `path` is None, then applies
    /// environment overrides. A missing default file yields the defaults; a
    /// missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (Self::default_path()?, false),
        };

        let mut config = match fs::read_to_string(&path) {
            Ok(content) => Self::from_toml(&content, &path)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => {
                log::debug!("No config at {}, using defaults", path.display());
                Config::default()
            }
            Err(e) => return Err(ConfigError::ReadFailed { path, source: e }),
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// True unless the model path was set in the file or the environment
    pub fn uses_default_model_path(&self) -> bool {
        self.model_path == default_model_path()
    }

    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// `lookup` is `std::env::var` in production
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(path) = lookup("TRIAGE_DATA_PATH") {
            self.data_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("TRIAGE_MODEL_PATH") {
            self.model_path = PathBuf::from(path);
        }
        if let Some(host) = lookup("TRIAGE_SMTP_HOST") {
            self.smtp.host = Some(host);
        }
        if let Some(port) = lookup("TRIAGE_SMTP_PORT") {
            self.smtp.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "TRIAGE_SMTP_PORT".to_string(),
                value: port.clone(),
            })?;
        }
        if let Some(username) = lookup("TRIAGE_SMTP_USERNAME") {
            self.smtp.username = Some(username);
        }
        if let Some(from) = lookup("TRIAGE_SMTP_FROM") {
            self.smtp.from = Some(from);
        }
        self.smtp.password = lookup(SMTP_PASSWORD_VAR);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_parse_full_config() {
        let content = r#"
            data_path = "/srv/tasks.csv"
            model_path = "/srv/model.json"

            [smtp]
            host = "smtp.example.com"
            port = 587
            security = "starttls"
            username = "bot"
            from = "Task Bot <bot@example.com>"
        "#;

        let config = Config::from_toml(content, Path::new("config.toml")).unwrap();

        assert_eq!(config.data_path, PathBuf::from("/srv/tasks.csv"));
        assert_eq!(config.model_path, PathBuf::from("/srv/model.json"));
        assert!(!config.uses_default_model_path());
        assert_eq!(config.smtp.host.as_deref(), Some("smtp.example.com"));
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.smtp.security, SmtpSecurity::StartTls);
        assert_eq!(config.smtp.from.as_deref(), Some("Task Bot <bot@example.com>"));
        assert_eq!(config.smtp.password, None);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_toml("", Path::new("config.toml")).unwrap();

        assert!(config.data_path.ends_with("triage/tasks.csv"));
        assert!(config.uses_default_model_path());
        assert_eq!(config.smtp.port, 465);
        assert_eq!(config.smtp.security, SmtpSecurity::Tls);
        assert_eq!(config.smtp.host, None);
    }

    #[test]
    fn test_password_in_file_is_ignored() {
        let content = r#"
            [smtp]
            host = "smtp.example.com"
            password = "hunter2"
        "#;
        let config = Config::from_toml(content, Path::new("config.toml")).unwrap();
        assert_eq!(config.smtp.password, None);
    }

    #[test]
    fn test_invalid_security_value() {
        let content = "[smtp]\nsecurity = \"ssl3\"\n";
        assert!(matches!(
            Config::from_toml(content, Path::new("config.toml")),
            Err(ConfigError::ParseFailed { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();

        config
            .apply_env(env(&[
                ("TRIAGE_DATA_PATH", "/tmp/tasks.csv"),
                ("TRIAGE_SMTP_HOST", "localhost"),
                ("TRIAGE_SMTP_PORT", "2525"),
                ("TRIAGE_SMTP_FROM", "bot@example.com"),
                ("TRIAGE_SMTP_PASSWORD", "s3cret"),
                ("TRIAGE_SMTP_USERNAME", ""),
            ]))
            .unwrap();

        assert_eq!(config.data_path, PathBuf::from("/tmp/tasks.csv"));
        assert_eq!(config.smtp.host.as_deref(), Some("localhost"));
        assert_eq!(config.smtp.port, 2525);
        assert_eq!(config.smtp.password.as_deref(), Some("s3cret"));
        assert_eq!(config.smtp.username, None);
        assert_eq!(config.smtp.from.as_deref(), Some("bot@example.com"));
    }

    #[test]
    fn test_env_invalid_port() {
        let mut config = Config::default();
        let result = config.apply_env(env(&[("TRIAGE_SMTP_PORT", "smtp")]));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let path = std::env::temp_dir().join("triage-missing-config.toml");
        assert!(matches!(
            Config::load(Some(&path)),
            Err(ConfigError::ReadFailed { .. })
        ));
    }
}
