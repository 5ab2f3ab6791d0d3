use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::daemon::RetryConfig;
use crate::dns::DEFAULT_TTL;
use crate::error::Error;

pub const DEFAULT_IP_MIRRORS: &[&str] = &["http://myexternalip.com/raw", "https://api.ipify.org"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub domains: Vec<DomainConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_ip_mirrors")]
    pub ip_mirrors: Vec<String>,
    /// Create an `A` record for configured hostnames that have none.
    #[serde(default = "default_true")]
    pub create_missing: bool,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_interval() -> u64 {
    300 // 5 minutes
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ip_mirrors() -> Vec<String> {
    DEFAULT_IP_MIRRORS.iter().map(|m| m.to_string()).collect()
}

fn default_true() -> bool {
    true
}

/// One managed domain. An empty hostname stands for the bare domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainConfig {
    pub domain: String,
    pub hostnames: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default)]
    pub dev: bool,
    #[serde(default = "crate::dns::default_ttl")]
    pub ttl: u32,
}

impl DomainConfig {
    pub fn new(domain: &str, hostnames: &[&str]) -> Self {
        Self {
            domain: domain.to_string(),
            hostnames: hostnames.iter().map(|h| h.to_string()).collect(),
            interval_seconds: None,
            username: None,
            token: None,
            dev: false,
            ttl: DEFAULT_TTL,
        }
    }

    /// Rewrites hostnames to the form Name.com reports them in: trimmed,
    /// without a trailing dot, and `""` rather than `@` for the bare domain.
    pub fn normalize(&mut self) {
        for hostname in &mut self.hostnames {
            *hostname = normalize_hostname(hostname);
        }
    }

    /// Poll interval for this domain, falling back to the daemon default.
    pub fn interval(&self, daemon: &DaemonConfig) -> Duration {
        Duration::from_secs(self.interval_seconds.unwrap_or(daemon.interval_seconds))
    }
}

impl Settings {
    /// Loads the settings file and overlays the `NAME_*` environment variables.
    ///
    /// With `path == None` the default location is tried and a missing file is
    /// tolerated, so an environment-only deployment works.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };

        settings.apply_env(|key| std::env::var(key).ok())?;
        settings.normalize();
        Ok(settings)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(settings)
    }

    /// Applies the environment overlay using `lookup` to read variables.
    ///
    /// `NAME_DOMAIN` defines one domain entry; it replaces a file entry with
    /// the same name or is appended.
    pub fn apply_env<F>(&mut self, lookup: F) -> std::result::Result<(), Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let Some(domain) = lookup("NAME_DOMAIN").filter(|d| !d.trim().is_empty()) else {
            return Ok(());
        };
        let domain = domain.trim().to_string();

        let existing = self.domains.iter().position(|d| d.domain == domain);
        let mut entry = match existing {
            Some(index) => self.domains[index].clone(),
            None => DomainConfig::new(&domain, &[]),
        };

        if let Some(hostnames) = lookup("NAME_HOSTNAMES") {
            entry.hostnames = hostnames.split(',').map(|h| h.trim().to_string()).collect();
        }

        if let Some(interval) = lookup("NAME_INTERVAL") {
            let secs = interval.trim().parse::<u64>().map_err(|_| {
                Error::config(format!("NAME_INTERVAL is not a number of seconds: {interval}"))
            })?;
            entry.interval_seconds = Some(secs);
        }

        if let Some(username) = lookup("NAME_USER") {
            entry.username = Some(username);
        }

        if let Some(token) = lookup("NAME_TOKEN") {
            entry.token = Some(token);
        }

        if let Some(dev) = lookup("NAME_DEV_MODE") {
            entry.dev = parse_bool(&dev).ok_or_else(|| {
                Error::config(format!("NAME_DEV_MODE is not a boolean: {dev}"))
            })?;
        }

        match existing {
            Some(index) => self.domains[index] = entry,
            None => self.domains.push(entry),
        }

        Ok(())
    }

    pub fn normalize(&mut self) {
        for entry in &mut self.domains {
            entry.normalize();
        }
    }

    /// Checks the preconditions every worker relies on.
    pub fn validate(&self) -> std::result::Result<(), Error> {
        if self.domains.is_empty() {
            return Err(Error::config("no domains configured"));
        }

        if self.daemon.interval_seconds == 0 {
            return Err(Error::config("interval_seconds must be greater than zero"));
        }

        if self.daemon.ip_mirrors.is_empty() {
            return Err(Error::config("ip_mirrors must list at least one URL"));
        }

        let mut seen = HashSet::new();
        for entry in &self.domains {
            if entry.domain.trim().is_empty() {
                return Err(Error::config("domain must not be empty"));
            }
            if entry.hostnames.is_empty() {
                return Err(Error::config(format!("{}: no hostnames configured", entry.domain)));
            }
            for hostname in &entry.hostnames {
                if !is_valid_hostname(hostname) {
                    return Err(Error::config(format!(
                        "{}: invalid hostname {:?} (use \"\" for the bare domain, no trailing dot)",
                        entry.domain, hostname
                    )));
                }
            }
            if entry.interval_seconds == Some(0) {
                return Err(Error::config(format!(
                    "{}: interval_seconds must be greater than zero",
                    entry.domain
                )));
            }
            if !seen.insert(entry.domain.to_ascii_lowercase()) {
                return Err(Error::config(format!("{}: configured more than once", entry.domain)));
            }
        }

        self.daemon.retry.validate()
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn config_dir() -> PathBuf {
        #[cfg(unix)]
        {
            PathBuf::from("/etc/namecom-ddns")
        }
        #[cfg(windows)]
        {
            PathBuf::from(r"C:\ProgramData\namecom-ddns")
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval(),
            log_level: default_log_level(),
            ip_mirrors: default_ip_mirrors(),
            create_missing: true,
            retry: RetryConfig::default(),
        }
    }
}

fn normalize_hostname(hostname: &str) -> String {
    let hostname = hostname.trim();
    let hostname = hostname.strip_suffix('.').unwrap_or(hostname);
    if hostname == "@" {
        String::new()
    } else {
        hostname.to_string()
    }
}

/// A hostname that can match a record: already normalized, and a sequence of
/// non-empty labels.
fn is_valid_hostname(hostname: &str) -> bool {
    if hostname.is_empty() {
        return true;
    }
    normalize_hostname(hostname) == hostname
        && !hostname.chars().any(char::is_whitespace)
        && hostname.split('.').all(|label| !label.is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Some(true),
        "0" | "f" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
