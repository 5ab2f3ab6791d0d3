//! In-memory doubles for the IP lookup and the DNS provider.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::dns::{DnsProvider, DnsRecord};
use crate::error::{Error, ProviderError, Result};
use crate::ip::IpLookup;

/// Returns a fixed address, or fails like an exhausted mirror list when unset.
pub struct StaticIp {
    ip: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl StaticIp {
    pub fn new(ip: &str) -> Self {
        Self {
            ip: Mutex::new(Some(ip.to_string())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            ip: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, ip: &str) {
        *self.ip.lock().unwrap() = Some(ip.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IpLookup for StaticIp {
    async fn external_ip(&self) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.ip.lock().unwrap().clone().ok_or(Error::IpResolution)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List,
    Delete(u64),
    Create(DnsRecord),
}

/// A provider that keeps its zone in memory and records every call.
#[derive(Default)]
pub struct MemoryProvider {
    records: Mutex<Vec<DnsRecord>>,
    calls: Mutex<Vec<Call>>,
    next_id: AtomicU64,
    fail_list: Mutex<bool>,
    fail_delete: Mutex<HashSet<u64>>,
    fail_create: Mutex<HashSet<String>>,
    create_delay: Mutex<Option<Duration>>,
}

impl MemoryProvider {
    pub fn with_records(records: Vec<DnsRecord>) -> Self {
        let next_id = records.iter().filter_map(|r| r.id).max().unwrap_or(0) + 1;
        Self {
            records: Mutex::new(records),
            next_id: AtomicU64::new(next_id),
            ..Self::default()
        }
    }

    pub fn fail_list(&self, fail: bool) {
        *self.fail_list.lock().unwrap() = fail;
    }

    pub fn fail_delete(&self, record_id: u64) {
        self.fail_delete.lock().unwrap().insert(record_id);
    }

    pub fn fail_create(&self, host: &str) {
        self.fail_create.lock().unwrap().insert(host.to_string());
    }

    /// Makes every create take `delay` before it lands.
    pub fn delay_create(&self, delay: Duration) {
        *self.create_delay.lock().unwrap() = Some(delay);
    }

    pub fn clear_failures(&self) {
        self.fail_list(false);
        self.fail_delete.lock().unwrap().clear();
        self.fail_create.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls other than listing.
    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| *call != Call::List)
            .collect()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn records(&self) -> Vec<DnsRecord> {
        self.records.lock().unwrap().clone()
    }

    fn rejected(message: &str) -> ProviderError {
        ProviderError::Api {
            status: 500,
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl DnsProvider for MemoryProvider {
    async fn list_records(&self, _domain: &str) -> std::result::Result<Vec<DnsRecord>, ProviderError> {
        self.calls.lock().unwrap().push(Call::List);
        if *self.fail_list.lock().unwrap() {
            return Err(Self::rejected("list failed"));
        }
        Ok(self.records())
    }

    async fn create_record(
        &self,
        domain: &str,
        record: &DnsRecord,
    ) -> std::result::Result<(), ProviderError> {
        let delay = *self.create_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.calls.lock().unwrap().push(Call::Create(record.clone()));
        if self.fail_create.lock().unwrap().contains(&record.host) {
            return Err(Self::rejected("create failed"));
        }

        let mut created = DnsRecord::new_a(domain, &record.host, &record.answer, record.ttl);
        created.record_type = record.record_type.clone();
        created.id = Some(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.records.lock().unwrap().push(created);
        Ok(())
    }

    async fn delete_record(
        &self,
        _domain: &str,
        record_id: u64,
    ) -> std::result::Result<(), ProviderError> {
        self.calls.lock().unwrap().push(Call::Delete(record_id));
        if self.fail_delete.lock().unwrap().contains(&record_id) {
            return Err(Self::rejected("delete failed"));
        }

        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.id != Some(record_id));
        if records.len() == before {
            return Err(ProviderError::Api {
                status: 404,
                message: "Not Found".to_string(),
            });
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }
}

pub fn record(id: u64, domain: &str, host: &str, record_type: &str, answer: &str) -> DnsRecord {
    let mut record = DnsRecord::new_a(domain, host, answer, 300);
    record.id = Some(id);
    record.record_type = record_type.to_string();
    record
}
