mod backoff;
mod reconciler;
mod service;

#[cfg(test)]
mod test_support;

pub use backoff::{Backoff, RetryConfig, RetryStrategy};
pub use reconciler::{CycleReport, Plan, Reconciler};
pub use service::{build_reconcilers, resolve_credentials, run, Supervisor};
