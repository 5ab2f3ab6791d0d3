use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

pub const RECORD_TYPE_A: &str = "A";
pub const RECORD_TYPE_CNAME: &str = "CNAME";

/// TTL used when neither the provider nor the configuration gives one.
pub const DEFAULT_TTL: u32 = 300;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub token: String,
}

/// A record as the provider reports it, or one about to be created.
///
/// `id` is assigned by the provider and is the only identity; `fqdn` is
/// derived and used for matching only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default)]
    pub domain_name: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub fqdn: String,
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

pub(crate) fn default_ttl() -> u32 {
    DEFAULT_TTL
}

impl DnsRecord {
    /// A fresh `A` record that has not been created yet.
    pub fn new_a(domain: &str, host: &str, answer: &str, ttl: u32) -> Self {
        let fqdn = if host.is_empty() {
            format!("{domain}.")
        } else {
            format!("{host}.{domain}.")
        };

        Self {
            id: None,
            domain_name: domain.to_string(),
            host: host.to_string(),
            fqdn,
            record_type: RECORD_TYPE_A.to_string(),
            answer: answer.to_string(),
            ttl,
        }
    }

    /// Label used in log lines; the bare domain shows as `@`.
    pub fn display_host(&self) -> &str {
        if self.host.is_empty() {
            "@"
        } else {
            &self.host
        }
    }
}

#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// List every record of the domain
    async fn list_records(&self, domain: &str) -> Result<Vec<DnsRecord>, ProviderError>;

    /// Create a record; `id` on the input is ignored
    async fn create_record(&self, domain: &str, record: &DnsRecord) -> Result<(), ProviderError>;

    /// Delete a record by provider id
    async fn delete_record(&self, domain: &str, record_id: u64) -> Result<(), ProviderError>;

    /// Get the provider name
    fn provider_name(&self) -> &'static str;
}
