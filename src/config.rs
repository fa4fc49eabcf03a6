use crate::engine::EngineSettings;
use crate::notifier::DEFAULT_RELOAD_SIGNAL;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable overriding the configured domain
pub const DOMAIN_ENV: &str = "AUTOPROXY_DOMAIN";

/// Global configuration for the daemon
///
/// Unknown keys are rejected so a misspelled setting fails the load instead
/// of silently falling back to its default.
#[derive(Debug, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Domain appended to container names for preview hostnames
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Directory the proxy includes generated server blocks from
    #[serde(default = "default_conf_dir")]
    pub conf_dir: String,

    /// Root holding one certificate directory per hostname
    #[serde(default = "default_ssl_dir")]
    pub ssl_dir: String,

    /// Label whose value declares a container's role
    #[serde(default = "default_role_label")]
    pub role_label: String,

    /// Signal sent to the proxy container after a config change
    #[serde(default = "default_reload_signal")]
    pub reload_signal: String,

    /// Docker daemon address (`unix:///path` or `tcp://host:port`).
    /// Falls back to DOCKER_HOST, then common socket paths.
    pub docker_host: Option<String>,

    /// Path to PID file (optional)
    pub pid_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            conf_dir: default_conf_dir(),
            ssl_dir: default_ssl_dir(),
            role_label: default_role_label(),
            reload_signal: default_reload_signal(),
            docker_host: None,
            pid_file: None,
        }
    }
}

fn default_domain() -> String {
    "localhost".to_string()
}

fn default_conf_dir() -> String {
    "./config".to_string()
}

fn default_ssl_dir() -> String {
    "/etc/letsencrypt/live".to_string()
}

fn default_role_label() -> String {
    "function".to_string()
}

fn default_reload_signal() -> String {
    DEFAULT_RELOAD_SIGNAL.to_string()
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or fall back to defaults when it doesn't exist and
    /// wasn't asked for explicitly
    pub fn load_or_default<P: AsRef<Path>>(path: P, explicit: bool) -> anyhow::Result<Self> {
        if !explicit && !path.as_ref().exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Apply an override for the domain, e.g. from the environment
    pub fn with_domain_override(mut self, domain: Option<String>) -> anyhow::Result<Self> {
        if let Some(domain) = domain {
            self.domain = domain;
            self.validate()?;
        }
        Ok(self)
    }

    /// Validate all configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut errors = Vec::new();

        let domain = self.domain.trim();
        if domain.is_empty() {
            errors.push("domain must not be empty".to_string());
        } else if domain.starts_with('.') || domain.ends_with('.') {
            errors.push(format!("domain '{}' must not start or end with '.'", self.domain));
        } else if domain.contains(char::is_whitespace) || domain != self.domain {
            errors.push(format!("domain '{}' must not contain whitespace", self.domain));
        }

        if self.conf_dir.is_empty() {
            errors.push("conf_dir must not be empty".to_string());
        }
        if self.ssl_dir.is_empty() {
            errors.push("ssl_dir must not be empty".to_string());
        }
        if self.role_label.is_empty() {
            errors.push("role_label must not be empty".to_string());
        }
        if self.reload_signal.is_empty() {
            errors.push("reload_signal must not be empty".to_string());
        }

        if !errors.is_empty() {
            anyhow::bail!("Configuration errors:\n  - {}", errors.join("\n  - "));
        }

        Ok(())
    }

    /// Engine inputs derived from this configuration
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            base_domain: self.domain.clone(),
            conf_dir: PathBuf::from(&self.conf_dir),
            ssl_root: PathBuf::from(&self.ssl_dir),
            role_label: self.role_label.clone(),
            reload_signal: self.reload_signal.clone(),
        }
    }
}
