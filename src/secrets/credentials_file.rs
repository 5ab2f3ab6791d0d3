use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::dns::Credentials;

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    domains: BTreeMap<String, DomainCredentials>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DomainCredentials {
    username: String,
    token: String,
}

/// Name.com API credentials kept per domain in a TOML file only root can read.
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<CredentialsFile> {
        if !self.path.exists() {
            return Ok(CredentialsFile::default());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read credentials file: {}", self.path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse credentials file: {}", self.path.display()))
    }

    fn save(&self, creds: &CredentialsFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(creds).context("Failed to serialize credentials")?;

        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options
            .open(&self.path)
            .with_context(|| format!("Failed to open credentials file: {}", self.path.display()))?;

        // The mode above only applies to new files
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to set permissions on: {}", self.path.display()))?;
        }

        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write credentials file: {}", self.path.display()))?;

        Ok(())
    }

    pub fn store(&self, domain: &str, username: &str, token: &str) -> Result<()> {
        let mut creds = self.load()?;

        creds.domains.insert(
            domain.to_string(),
            DomainCredentials {
                username: username.to_string(),
                token: token.to_string(),
            },
        );

        self.save(&creds)
    }

    pub fn get(&self, domain: &str) -> Result<Option<Credentials>> {
        let creds = self.load()?;

        Ok(creds.domains.get(domain).map(|c| Credentials {
            username: c.username.clone(),
            token: c.token.clone(),
        }))
    }

    pub fn delete(&self, domain: &str) -> Result<()> {
        let mut creds = self.load()?;

        if creds.domains.remove(domain).is_none() {
            return Err(anyhow!("No credentials found for domain: {}", domain));
        }

        self.save(&creds)
    }
}
