use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;

const DEFAULT_MAX_BACKOFF_SECS: u64 = 3600;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryStrategy {
    /// Retry after the regular poll interval
    #[default]
    Fixed,
    /// Double the delay after every consecutive failed cycle
    Exponential,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub strategy: RetryStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_seconds: Option<u64>,
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.initial_seconds == Some(0) {
            return Err(Error::config("retry.initial_seconds must be greater than zero"));
        }
        if let (Some(initial), Some(max)) = (self.initial_seconds, self.max_seconds) {
            if max < initial {
                return Err(Error::config(
                    "retry.max_seconds must not be smaller than retry.initial_seconds",
                ));
            }
        }
        Ok(())
    }
}

/// Delay to wait after a cycle, driven by how many cycles in a row failed.
#[derive(Debug, Clone)]
pub struct Backoff {
    strategy: RetryStrategy,
    interval: Duration,
    initial: Duration,
    max: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(config: &RetryConfig, interval: Duration) -> Self {
        let initial = config
            .initial_seconds
            .map(Duration::from_secs)
            .unwrap_or(interval);
        let max = config
            .max_seconds
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_MAX_BACKOFF_SECS))
            .max(initial);

        Self {
            strategy: config.strategy,
            interval,
            initial,
            max,
            failures: 0,
        }
    }

    /// Records a successful cycle and returns the regular poll interval.
    pub fn succeeded(&mut self) -> Duration {
        self.failures = 0;
        self.interval
    }

    /// Records a failed cycle and returns how long to wait before the next one.
    pub fn failed(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);

        match self.strategy {
            RetryStrategy::Fixed => self.interval,
            RetryStrategy::Exponential => {
                let factor = 2u32.saturating_pow(self.failures - 1);
                self.initial.saturating_mul(factor).min(self.max)
            }
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }
}
