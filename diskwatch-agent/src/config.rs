//! Configuration management
//!
//! Handles:
//! - Optional TOML file (`$DISKWATCH_CONFIG` or the OS config dir)
//! - Environment variables, `.env` included, overriding file values
//! - Required settings check before any network activity

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings without which a run cannot start
pub const REQUIRED_VARS: &[&str] = &[
    "PVE_HOST",
    "PVE_USER",
    "PVE_TOKEN_NAME",
    "PVE_TOKEN_SECRET",
    "ALERT_EMAIL",
    "ALERT_EMAIL_PASSWORD",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing one or more required settings: {}", .0.join(", "))]
    Missing(Vec<&'static str>),
    #[error("Invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub cluster: ClusterConfig,
    pub scrape: ScrapeConfig,
    pub alert: AlertConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub token_name: String,
    #[serde(skip_serializing)] // Never written back to disk
    pub token_secret: String,
    pub verify_ssl: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrapeConfig {
    pub port: u16,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub threshold: f64,
    pub service_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub recipient: Option<String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 8006,
            user: String::new(),
            token_name: String::new(),
            token_secret: String::new(),
            verify_ssl: false, // self-signed cluster certificates
        }
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            port: diskwatch_core::scraper::EXPORTER_PORT,
            timeout_secs: diskwatch_core::scraper::SCRAPE_TIMEOUT.as_secs(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            threshold: diskwatch_core::DEFAULT_THRESHOLD,
            service_name: diskwatch_core::DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            username: String::new(),
            password: String::new(),
            recipient: None,
        }
    }
}

impl ClusterConfig {
    /// `https://<host>:<port>/api2/json`.
    ///
    /// A leading scheme and trailing slashes are dropped; a host already
    /// carrying a port is kept as is.
    pub fn base_url(&self) -> String {
        let host = self.host.trim();
        let host = host
            .strip_prefix("https://")
            .or_else(|| host.strip_prefix("http://"))
            .unwrap_or(host)
            .trim_end_matches('/');

        if host.contains(':') {
            format!("https://{}/api2/json", host)
        } else {
            format!("https://{}:{}/api2/json", host, self.port)
        }
    }
}

impl MailConfig {
    /// Alerts go to the sending account unless a recipient is set
    pub fn recipient(&self) -> &str {
        self.recipient.as_deref().unwrap_or(&self.username)
    }
}

impl MonitorConfig {
    /// Load file config (if any), apply the environment, then check required values
    pub async fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::config_file_path() {
            Some(path) if path.exists() => Self::from_file(&path).await?,
            _ => Self::default(),
        };

        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub async fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// `$DISKWATCH_CONFIG`, else `<config dir>/pve-diskwatch/config.toml`
    pub fn config_file_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("DISKWATCH_CONFIG") {
            return Some(PathBuf::from(path));
        }

        let mut path = dirs::config_dir()?;
        path.push("pve-diskwatch");
        path.push("config.toml");
        Some(path)
    }

    /// Override fields from `lookup`; empty values count as unset
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(value) = var("PVE_HOST") {
            self.cluster.host = value;
        }
        if let Some(value) = var("PVE_USER") {
            self.cluster.user = value;
        }
        if let Some(value) = var("PVE_TOKEN_NAME") {
            self.cluster.token_name = value;
        }
        if let Some(value) = var("PVE_TOKEN_SECRET") {
            self.cluster.token_secret = value;
        }
        if let Some(value) = var("PVE_PORT") {
            self.cluster.port = parse_var("PVE_PORT", value)?;
        }
        if let Some(value) = var("PVE_VERIFY_SSL") {
            self.cluster.verify_ssl = parse_var("PVE_VERIFY_SSL", value)?;
        }
        if let Some(value) = var("EXPORTER_PORT") {
            self.scrape.port = parse_var("EXPORTER_PORT", value)?;
        }
        if let Some(value) = var("SCRAPE_TIMEOUT_SECS") {
            self.scrape.timeout_secs = parse_var("SCRAPE_TIMEOUT_SECS", value)?;
        }
        if let Some(value) = var("ALERT_THRESHOLD") {
            self.alert.threshold = parse_var("ALERT_THRESHOLD", value)?;
        }
        if let Some(value) = var("ALERT_EMAIL") {
            self.mail.username = value;
        }
        if let Some(value) = var("ALERT_EMAIL_PASSWORD") {
            self.mail.password = value;
        }
        if let Some(value) = var("ALERT_EMAIL_TO") {
            self.mail.recipient = Some(value);
        }
        if let Some(value) = var("SMTP_HOST") {
            self.mail.smtp_host = value;
        }
        if let Some(value) = var("SMTP_PORT") {
            self.mail.smtp_port = parse_var("SMTP_PORT", value)?;
        }

        Ok(())
    }

    /// Reports every missing required setting at once
    pub fn validate(&self) -> Result<(), ConfigError> {
        let values = [
            &self.cluster.host,
            &self.cluster.user,
            &self.cluster.token_name,
            &self.cluster.token_secret,
            &self.mail.username,
            &self.mail.password,
        ];

        let missing: Vec<&'static str> = REQUIRED_VARS
            .iter()
            .zip(values)
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        if !(self.alert.threshold > 0.0) {
            return Err(ConfigError::Invalid {
                name: "ALERT_THRESHOLD",
                value: self.alert.threshold.to_string(),
            });
        }

        Ok(())
    }

    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_secs(self.scrape.timeout_secs)
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("PVE_HOST", "192.168.1.10"),
            ("PVE_USER", "monitor@pve"),
            ("PVE_TOKEN_NAME", "diskwatch"),
            ("PVE_TOKEN_SECRET", "0000-1111"),
            ("ALERT_EMAIL", "ops@example.com"),
            ("ALERT_EMAIL_PASSWORD", "app-password"),
        ]
    }

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert_eq!(config.cluster.port, 8006);
        assert!(!config.cluster.verify_ssl);
        assert_eq!(config.scrape.port, 9100);
        assert_eq!(config.scrape_timeout(), Duration::from_secs(3));
        assert_eq!(config.alert.threshold, 80.0);
        assert_eq!(config.mail.smtp_port, 587);
    }

    #[test]
    fn test_env_complete() {
        let mut config = MonitorConfig::default();
        config.apply_env(env(&full_env())).unwrap();
        config.validate().unwrap();

        assert_eq!(config.cluster.base_url(), "https://192.168.1.10:8006/api2/json");
        assert_eq!(config.mail.recipient(), "ops@example.com");
    }

    #[test]
    fn test_missing_settings_are_all_reported() {
        let mut config = MonitorConfig::default();
        config
            .apply_env(env(&[("PVE_HOST", "pve"), ("PVE_USER", "monitor@pve"), ("PVE_TOKEN_NAME", "")]))
            .unwrap();

        match config.validate() {
            Err(ConfigError::Missing(names)) => assert_eq!(
                names,
                vec!["PVE_TOKEN_NAME", "PVE_TOKEN_SECRET", "ALERT_EMAIL", "ALERT_EMAIL_PASSWORD"]
            ),
            other => panic!("expected missing settings, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_numeric_override() {
        let mut config = MonitorConfig::default();
        let err = config.apply_env(env(&[("EXPORTER_PORT", "ninety-one")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "EXPORTER_PORT", .. }));
    }

    #[tokio::test]
    async fn test_file_then_env_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[cluster]
host = "pve.lan:8443"
verify_ssl = true

[alert]
threshold = 90.0

[mail]
recipient = "oncall@example.com"
"#,
        )
        .unwrap();

        let mut config = MonitorConfig::from_file(&path).await.unwrap();
        assert_eq!(config.cluster.base_url(), "https://pve.lan:8443/api2/json");
        assert!(config.cluster.verify_ssl);
        assert_eq!(config.scrape.port, 9100);

        let mut vars = full_env();
        vars.retain(|(name, _)| *name != "PVE_HOST");
        vars.push(("ALERT_THRESHOLD", "85"));
        config.apply_env(env(&vars)).unwrap();
        config.validate().unwrap();

        assert_eq!(config.cluster.host, "pve.lan:8443");
        assert_eq!(config.alert.threshold, 85.0);
        assert_eq!(config.mail.recipient(), "oncall@example.com");
    }

    #[test]
    fn test_base_url_drops_scheme() {
        let cluster = |host: &str| ClusterConfig {
            host: host.to_string(),
            ..ClusterConfig::default()
        };

        assert_eq!(cluster("https://pve.lan").base_url(), "https://pve.lan:8006/api2/json");
        assert_eq!(cluster("http://pve.lan/").base_url(), "https://pve.lan:8006/api2/json");
        assert_eq!(
            cluster("https://pve.lan:8443").base_url(),
            "https://pve.lan:8443/api2/json"
        );
        assert_eq!(cluster(" pve.lan ").base_url(), "https://pve.lan:8006/api2/json");
    }

    #[test]
    fn test_secrets_never_serialized() {
        let mut config = MonitorConfig::default();
        config.apply_env(env(&full_env())).unwrap();
        let written = toml::to_string_pretty(&config).unwrap();
        assert!(!written.contains("0000-1111"));
        assert!(!written.contains("app-password"));
    }

    #[tokio::test]
    async fn test_unparseable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[cluster\nhost = ").unwrap();
        assert!(matches!(
            MonitorConfig::from_file(&path).await,
            Err(ConfigError::Parse { .. })
        ));
    }
}
