//! Test doubles and common utilities for contract tests
//!
//! The doubles script provider and resolver responses and record every call,
//! so tests can assert on exactly which reads and writes a run performed.

#![allow(dead_code)]

use ddns_core::error::{Error, Result};
use ddns_core::traits::{
    AddressResolver, AddressSet, DnsProvider, DnsProviderFactory, DnsRecord, RecordType, Zone,
};
use ddns_core::{AddressingMode, Credentials, HostConfig, ReconciliationConfig};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DOMAIN: &str = "example.com";
pub const ZONE_ID: &str = "zone-1";

/// An AddressResolver that returns a scripted result
pub struct StubResolver {
    result: Result<AddressSet>,
    delay: Option<Duration>,
    call_count: Arc<AtomicUsize>,
}

impl StubResolver {
    pub fn returning(addresses: AddressSet) -> Self {
        Self {
            result: Ok(addresses),
            delay: None,
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(error: Error) -> Self {
        Self {
            result: Err(error),
            delay: None,
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sleep for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Shared counter of resolve() calls
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.call_count)
    }
}

#[async_trait::async_trait]
impl AddressResolver for StubResolver {
    async fn resolve(&self, _mode: AddressingMode) -> Result<AddressSet> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone()
    }
}

/// One recorded update_record() call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateCall {
    pub record: DnsRecord,
    pub new_content: String,
}

/// Scripted provider state, shared by every client the factory creates
#[derive(Default)]
pub struct ProviderState {
    zone: Mutex<Option<Result<Zone>>>,
    records: Mutex<HashMap<String, Result<Vec<DnsRecord>>>>,
    failing_updates: Mutex<HashSet<String>>,
    zone_calls: AtomicUsize,
    record_calls: Mutex<Vec<String>>,
    updates: Mutex<Vec<UpdateCall>>,
    clients_created: AtomicUsize,
}

impl ProviderState {
    pub fn new() -> Arc<Self> {
        let state = Self::default();
        *state.zone.lock().unwrap() = Some(Ok(Zone {
            id: ZONE_ID.to_string(),
            name: DOMAIN.to_string(),
        }));
        Arc::new(state)
    }

    /// Make get_zone() fail
    pub fn fail_zone(&self, error: Error) {
        *self.zone.lock().unwrap() = Some(Err(error));
    }

    /// Set the records returned for a host label
    pub fn set_records(&self, label: &str, records: Vec<DnsRecord>) {
        self.records
            .lock()
            .unwrap()
            .insert(label.to_string(), Ok(records));
    }

    /// Make get_records() fail for a host label
    pub fn fail_records(&self, label: &str, error: Error) {
        self.records
            .lock()
            .unwrap()
            .insert(label.to_string(), Err(error));
    }

    /// Make update_record() fail for a record ID
    pub fn fail_update(&self, record_id: &str) {
        self.failing_updates
            .lock()
            .unwrap()
            .insert(record_id.to_string());
    }

    pub fn zone_calls(&self) -> usize {
        self.zone_calls.load(Ordering::SeqCst)
    }

    /// Host labels passed to get_records(), in call order
    pub fn record_calls(&self) -> Vec<String> {
        self.record_calls.lock().unwrap().clone()
    }

    /// Every update attempt, including failed ones
    pub fn updates(&self) -> Vec<UpdateCall> {
        self.updates.lock().unwrap().clone()
    }

    pub fn clients_created(&self) -> usize {
        self.clients_created.load(Ordering::SeqCst)
    }

    /// Total number of provider calls of any kind
    pub fn total_calls(&self) -> usize {
        self.zone_calls() + self.record_calls().len() + self.updates().len()
    }
}

/// A DnsProvider backed by a ProviderState
pub struct MockDnsProvider {
    state: Arc<ProviderState>,
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn get_zone(&self, domain: &str) -> Result<Zone> {
        self.state.zone_calls.fetch_add(1, Ordering::SeqCst);
        self.state
            .zone
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Err(Error::zone_not_found(domain)))
    }

    async fn get_records(
        &self,
        _zone_id: &str,
        host_label: &str,
        _domain: &str,
    ) -> Result<Vec<DnsRecord>> {
        self.state
            .record_calls
            .lock()
            .unwrap()
            .push(host_label.to_string());
        self.state
            .records
            .lock()
            .unwrap()
            .get(host_label)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn update_record(&self, record: &DnsRecord, new_content: &str) -> Result<()> {
        self.state.updates.lock().unwrap().push(UpdateCall {
            record: record.clone(),
            new_content: new_content.to_string(),
        });

        if self.state.failing_updates.lock().unwrap().contains(&record.id) {
            return Err(Error::update_failed(&record.name, 500, "scripted failure"));
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// A DnsProviderFactory handing out clients over a shared ProviderState
pub struct MockProviderFactory {
    state: Arc<ProviderState>,
}

impl MockProviderFactory {
    pub fn new(state: &Arc<ProviderState>) -> Self {
        Self {
            state: Arc::clone(state),
        }
    }
}

impl DnsProviderFactory for MockProviderFactory {
    fn create(&self, credentials: &Credentials) -> Result<Box<dyn DnsProvider>> {
        credentials.validate()?;
        self.state.clients_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDnsProvider {
            state: Arc::clone(&self.state),
        }))
    }
}

/// Build a record as the provider would return it
pub fn record(id: &str, record_type: RecordType, label: &str, content: &str) -> DnsRecord {
    DnsRecord {
        id: id.to_string(),
        zone_id: ZONE_ID.to_string(),
        record_type,
        name: ddns_core::config::fqdn(label, DOMAIN),
        content: content.to_string(),
        ttl: 1,
        proxied: false,
    }
}

/// Helper to create a config for `example.com` with the given host labels
pub fn config(labels: &[&str], mode: AddressingMode) -> ReconciliationConfig {
    ReconciliationConfig::new(
        Credentials::new("ops@example.com", "test-token"),
        DOMAIN,
        labels.iter().map(|l| HostConfig::new(*l)).collect(),
        mode,
    )
}

pub fn v4(s: &str) -> std::net::Ipv4Addr {
    s.parse().unwrap()
}

pub fn v6(s: &str) -> std::net::Ipv6Addr {
    s.parse().unwrap()
}
