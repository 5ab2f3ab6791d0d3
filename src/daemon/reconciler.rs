use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::backoff::{Backoff, RetryConfig};
use crate::config::DomainConfig;
use crate::dns::{matcher, DnsProvider, DnsRecord, RECORD_TYPE_A, RECORD_TYPE_CNAME};
use crate::error::{Error, Result};
use crate::ip::IpLookup;

/// Changes one cycle would make to converge a domain on an address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    /// Managed records whose answer differs, already rewritten to the new answer
    pub stale: Vec<DnsRecord>,
    /// Configured hostnames without any `A` record
    pub missing: Vec<DnsRecord>,
    /// Managed records that already hold the address
    pub converged: usize,
}

impl Plan {
    pub fn is_converged(&self) -> bool {
        self.stale.is_empty() && self.missing.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub ip: String,
    pub unchanged: usize,
    pub updated: usize,
    pub created: usize,
    pub failed: usize,
    /// Planned changes left for the next run because of a stop request
    pub skipped: usize,
}

/// Keeps the `A` records of one domain pointed at the external address.
pub struct Reconciler {
    config: DomainConfig,
    interval: Duration,
    provider: Arc<dyn DnsProvider>,
    ip: Arc<dyn IpLookup>,
    retry: RetryConfig,
    create_missing: bool,
}

impl Reconciler {
    pub fn new(
        config: DomainConfig,
        interval: Duration,
        provider: Arc<dyn DnsProvider>,
        ip: Arc<dyn IpLookup>,
    ) -> Self {
        Self {
            config,
            interval,
            provider,
            ip,
            retry: RetryConfig::default(),
            create_missing: false,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_create_missing(mut self, create_missing: bool) -> Self {
        self.create_missing = create_missing;
        self
    }

    pub fn domain(&self) -> &str {
        &self.config.domain
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Works out which records to replace or create. Performs no I/O.
    pub fn plan(&self, records: &[DnsRecord], ip: &str) -> Plan {
        let mut plan = Plan::default();
        let mut has_a: Vec<&str> = Vec::new();
        let mut has_cname: Vec<&str> = Vec::new();

        for record in records {
            debug!("Checking against {}", record.fqdn);

            let Some(hostname) = matcher::matching_hostname(&self.config, &record.fqdn) else {
                continue;
            };

            if record.record_type == RECORD_TYPE_CNAME {
                has_cname.push(hostname);
                continue;
            }

            // Only A records carry the IPv4 address
            if record.record_type != RECORD_TYPE_A {
                continue;
            }

            has_a.push(hostname);

            if record.answer == ip {
                plan.converged += 1;
            } else {
                let mut replacement = record.clone();
                replacement.answer = ip.to_string();
                plan.stale.push(replacement);
            }
        }

        if self.create_missing {
            for hostname in &self.config.hostnames {
                let hostname = hostname.as_str();
                if has_a.contains(&hostname)
                    || has_cname.contains(&hostname)
                    || plan.missing.iter().any(|r| r.host == hostname)
                {
                    continue;
                }

                plan.missing.push(DnsRecord::new_a(
                    &self.config.domain,
                    hostname,
                    ip,
                    self.config.ttl,
                ));
            }
        }

        plan
    }

    /// Resolves the address and fetches the domain's records, returning what
    /// a cycle would change without changing anything.
    pub async fn preview(&self) -> Result<(String, Plan)> {
        let domain = self.config.domain.as_str();

        let ip = self.ip.external_ip().await?;

        let records = self
            .provider
            .list_records(domain)
            .await
            .map_err(|source| Error::RecordFetch {
                domain: domain.to_string(),
                source,
            })?;

        let plan = self.plan(&records, &ip);
        Ok((ip, plan))
    }

    /// Resolves the address, fetches the domain's records and applies the plan.
    ///
    /// IP and listing failures abort the cycle. A failing record is logged and
    /// counted; the remaining records are still processed.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let (ip, plan) = self.preview().await?;
        Ok(self.apply(ip, plan, None).await)
    }

    /// Applies a plan record by record. With a `shutdown` receiver, a stop
    /// request is honoured between records only, so a started delete+create
    /// pair always runs to completion.
    async fn apply(
        &self,
        ip: String,
        plan: Plan,
        shutdown: Option<&watch::Receiver<bool>>,
    ) -> CycleReport {
        let domain = self.config.domain.as_str();
        let mut report = CycleReport {
            unchanged: plan.converged,
            ..CycleReport::default()
        };

        for (done, record) in plan.stale.iter().enumerate() {
            if shutdown.is_some_and(stop_requested) {
                report.skipped = plan.stale.len() - done + plan.missing.len();
                report.ip = ip;
                return report;
            }

            info!("Running update check for {}", record.fqdn);

            match self.replace(record).await {
                Ok(()) => {
                    info!(
                        "Updated record {} [{}] with IP: {}",
                        record.id.unwrap_or_default(),
                        record.display_host(),
                        ip
                    );
                    report.updated += 1;
                }
                Err(e) => {
                    error!("Failed to update {} with IP {}: {}", record.fqdn, ip, e);
                    report.failed += 1;
                }
            }
        }

        for (done, record) in plan.missing.iter().enumerate() {
            if shutdown.is_some_and(stop_requested) {
                report.skipped = plan.missing.len() - done;
                break;
            }

            info!("No A record for {}, creating one", record.fqdn);

            match self.provider.create_record(domain, record).await {
                Ok(()) => {
                    info!("Created record [{}] with IP: {}", record.display_host(), ip);
                    report.created += 1;
                }
                Err(source) => {
                    let e = Error::RecordCreate {
                        host: record.host.clone(),
                        source,
                    };
                    error!("{}", e);
                    report.failed += 1;
                }
            }
        }

        report.ip = ip;
        report
    }

    /// Delete-then-create. A failed create leaves the record absent until a
    /// later cycle recreates it.
    async fn replace(&self, record: &DnsRecord) -> Result<()> {
        let domain = self.config.domain.as_str();
        let record_id = record.id.ok_or_else(|| Error::MissingRecordId {
            host: record.host.clone(),
        })?;
        let update_error = |source| Error::RecordUpdate {
            record_id,
            host: record.host.clone(),
            source,
        };

        info!("Deleting DNS record {} for {}", record_id, record.fqdn);
        self.provider
            .delete_record(domain, record_id)
            .await
            .map_err(update_error)?;

        info!("Creating DNS record for {}", record.fqdn);
        self.provider
            .create_record(domain, record)
            .await
            .map_err(update_error)?;

        Ok(())
    }

    /// Runs cycles until `shutdown` turns true or its sender goes away.
    ///
    /// Resolving, listing and sleeping are abandoned as soon as the flag flips.
    /// Record changes are only interrupted between records.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = Backoff::new(&self.retry, self.interval);

        info!(
            "Watching {} hostname(s) of {} every {} seconds",
            self.config.hostnames.len(),
            self.config.domain,
            self.interval.as_secs()
        );

        loop {
            let preview = tokio::select! {
                preview = self.preview() => preview,
                _ = stopped(&mut shutdown) => break,
            };

            let outcome = match preview {
                Ok((ip, plan)) => Ok(self.apply(ip, plan, Some(&shutdown)).await),
                Err(e) => Err(e),
            };

            if stop_requested(&shutdown) {
                if let Ok(report) = &outcome {
                    if report.skipped > 0 {
                        info!(
                            "Stop requested, leaving {} change(s) for the next run",
                            report.skipped
                        );
                    }
                }
                break;
            }

            let delay = match outcome {
                Ok(report) => {
                    let delay = backoff.succeeded();
                    info!(
                        "Update complete for {} ({} updated, {} created, {} unchanged, {} failed)",
                        self.config.domain,
                        report.updated,
                        report.created,
                        report.unchanged,
                        report.failed
                    );
                    info!("Will update again in {} seconds.", delay.as_secs());
                    delay
                }
                Err(e) => {
                    let delay = backoff.failed();
                    warn!("{}", e);
                    warn!(
                        "Will retry in {} seconds ({} consecutive failures)",
                        delay.as_secs(),
                        backoff.consecutive_failures()
                    );
                    delay
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = stopped(&mut shutdown) => break,
            }
        }

        info!("Stopped watching {}", self.config.domain);
    }
}

fn stop_requested(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}

async fn stopped(shutdown: &mut watch::Receiver<bool>) {
    loop {
        let stop = *shutdown.borrow_and_update();
        if stop {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
