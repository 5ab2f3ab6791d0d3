use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the reconciliation core.
///
/// Only [`Error::Config`] is fatal. Everything else is logged by the worker
/// and retried on the next cycle.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("could not retrieve external IP")]
    IpResolution,

    #[error("failed to retrieve records for {domain}: {source}")]
    RecordFetch {
        domain: String,
        #[source]
        source: ProviderError,
    },

    #[error("failed to update record {record_id} [{host}]: {source}")]
    RecordUpdate {
        record_id: u64,
        host: String,
        #[source]
        source: ProviderError,
    },

    #[error("failed to create record [{host}]: {source}")]
    RecordCreate {
        host: String,
        #[source]
        source: ProviderError,
    },

    #[error("record [{host}] has no id and cannot be replaced")]
    MissingRecordId { host: String },
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

/// Errors returned by a [`crate::dns::DnsProvider`].
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}
