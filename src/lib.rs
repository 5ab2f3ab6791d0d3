//! Dynamic DNS client for Name.com.
//!
//! One [`daemon::Reconciler`] runs per configured domain. Each cycle it asks
//! the IP mirrors for the public address, lists the domain's records and
//! replaces every managed `A` record whose answer has drifted.

pub mod config;
pub mod daemon;
pub mod dns;
pub mod error;
pub mod ip;
pub mod secrets;

pub use error::{Error, ProviderError, Result};
