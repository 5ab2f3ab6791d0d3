pub mod matcher;
mod namecom;
mod provider;

pub use matcher::{matches, matching_hostname};
pub use namecom::NameComProvider;
pub(crate) use provider::default_ttl;
pub use provider::{
    Credentials, DnsProvider, DnsRecord, DEFAULT_TTL, RECORD_TYPE_A, RECORD_TYPE_CNAME,
};

use std::sync::Arc;

use crate::error::ProviderError;

pub fn create_provider(credentials: Credentials, dev: bool) -> Result<Arc<dyn DnsProvider>, ProviderError> {
    Ok(Arc::new(NameComProvider::new(credentials, dev)?))
}
