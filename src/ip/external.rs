use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::IpLookup;
use crate::error::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a single mirror could not be used.
#[derive(Debug, thiserror::Error)]
enum MirrorError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("mirror returned an empty body")]
    EmptyBody,
}

/// Asks a list of plain-text "what is my IP" services, in order, for the
/// caller's public address.
pub struct MirrorResolver {
    client: Client,
    mirrors: Vec<String>,
}

impl MirrorResolver {
    pub fn new(mirrors: Vec<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, mirrors })
    }

    pub fn mirrors(&self) -> &[String] {
        &self.mirrors
    }

    pub fn mirrors_mut(&mut self) -> &mut Vec<String> {
        &mut self.mirrors
    }
}

#[async_trait]
impl IpLookup for MirrorResolver {
    async fn external_ip(&self) -> Result<String> {
        for mirror in &self.mirrors {
            debug!("Requesting external IP from {}", mirror);

            match fetch_ip(&self.client, mirror).await {
                Ok(ip) => {
                    debug!("{} reported external IP {}", mirror, ip);
                    return Ok(ip);
                }
                Err(e) => {
                    warn!("Failed to get IP from {}: {}", mirror, e);
                }
            }
        }

        Err(Error::IpResolution)
    }
}

/// One attempt against one mirror. The body is returned trimmed and otherwise
/// unchecked.
async fn fetch_ip(client: &Client, url: &str) -> std::result::Result<String, MirrorError> {
    let response = client.get(url).send().await?.error_for_status()?;

    let body = response.text().await?;
    let ip = body.trim();

    if ip.is_empty() {
        return Err(MirrorError::EmptyBody);
    }

    Ok(ip.to_string())
}
