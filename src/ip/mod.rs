mod external;

pub use external::MirrorResolver;

use async_trait::async_trait;

use crate::error::Result;

/// Source of the host's public address.
#[async_trait]
pub trait IpLookup: Send + Sync {
    /// Returns the external IP as reported, or [`crate::Error::IpResolution`]
    async fn external_ip(&self) -> Result<String>;
}
