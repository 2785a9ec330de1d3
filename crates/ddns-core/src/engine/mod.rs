//! Core reconciliation engine
//!
//! The ReconciliationEngine is responsible for:
//! - Resolving the current public address(es) via AddressResolver
//! - Resolving the zone and each host's record set via DnsProvider
//! - Updating every A/AAAA record whose content diverges
//!
//! ## Architecture
//!
//! ```text
//!                         ┌──────────────────────┐
//!   Scheduler ── tick ──▶ │ ReconciliationEngine │
//!                         └──────────────────────┘
//!                                    │
//!         ┌──────────────────────────┼──────────────────────────┐
//!         ▼                          ▼                          ▼
//! ┌─────────────────┐      ┌───────────────────┐      ┌─────────────────┐
//! │ AddressResolver │      │ DnsProviderFactory│      │    RunReport    │
//! │ (resolve)       │      │ → DnsProvider     │      │    (summary)    │
//! └─────────────────┘      └───────────────────┘      └─────────────────┘
//! ```
//!
//! ## Run Flow
//!
//! 1. Resolve the AddressSet for the configured mode
//! 2. Create a provider client from the run's credentials
//! 3. Look up the zone
//! 4. For each host, in order: fetch its records, update divergent A/AAAA records
//!
//! Failures in steps 1-4's lookups abort the run. Update failures only affect
//! the record concerned. Nothing is carried between runs; the next tick starts
//! from scratch.

use crate::config::ReconciliationConfig;
use crate::error::Error;
use crate::traits::{AddressResolver, AddressSet, DnsProvider, DnsProviderFactory, DnsRecord};
use chrono::{DateTime, Utc};
use std::fmt;
use std::net::IpAddr;
use tracing::{debug, error, info, warn};

/// Where a run was abandoned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStage {
    /// Resolving the public address(es)
    ResolveAddresses,
    /// Creating the provider client
    CreateClient,
    /// Looking up the zone
    LookupZone,
    /// Fetching a host's record set
    FetchRecords {
        /// Host label whose fetch failed
        host: String,
    },
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStage::ResolveAddresses => f.write_str("resolve addresses"),
            RunStage::CreateClient => f.write_str("create client"),
            RunStage::LookupZone => f.write_str("zone lookup"),
            RunStage::FetchRecords { host } => write!(f, "fetch records for {}", host),
        }
    }
}

/// Overall result of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every host was processed (individual updates may still have failed)
    Completed,
    /// The run was abandoned at `stage`
    Aborted {
        /// Stage that failed
        stage: RunStage,
        /// The error that ended the run
        error: Error,
    },
}

/// What happened to one examined A/AAAA record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordAction {
    /// Content already matched the current address
    Unchanged,
    /// Content was replaced
    Updated {
        /// Content before the update
        previous: String,
        /// Content written
        current: IpAddr,
    },
    /// No address was resolved for this record's family
    Skipped,
    /// The update was attempted and failed
    Failed {
        /// The update error
        error: Error,
    },
}

/// Outcome for a single record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Fully-qualified record name
    pub name: String,
    /// Record type ("A" or "AAAA")
    pub record_type: String,
    /// What was done
    pub action: RecordAction,
}

/// Summary of one reconciliation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
    /// Completed or aborted
    pub outcome: RunOutcome,
    /// Per-record outcomes, in processing order
    pub records: Vec<RecordOutcome>,
}

impl RunReport {
    fn started() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            outcome: RunOutcome::Completed,
            records: Vec::new(),
        }
    }

    fn abort(mut self, stage: RunStage, error: Error) -> Self {
        if error.is_transient() {
            warn!("Run aborted at {}: {} (will retry next tick)", stage, error);
        } else {
            error!("Run aborted at {}: {} (operator action required)", stage, error);
        }
        self.outcome = RunOutcome::Aborted { stage, error };
        self.finished_at = Utc::now();
        self
    }

    fn finish(mut self) -> Self {
        self.finished_at = Utc::now();
        self
    }

    /// Whether every host was processed
    pub fn is_completed(&self) -> bool {
        self.outcome == RunOutcome::Completed
    }

    /// Number of records updated
    pub fn updated_count(&self) -> usize {
        self.count(|a| matches!(a, RecordAction::Updated { .. }))
    }

    /// Number of records already in sync
    pub fn unchanged_count(&self) -> usize {
        self.count(|a| matches!(a, RecordAction::Unchanged))
    }

    /// Number of failed updates
    pub fn failed_count(&self) -> usize {
        self.count(|a| matches!(a, RecordAction::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&RecordAction) -> bool) -> usize {
        self.records.iter().filter(|r| pred(&r.action)).count()
    }
}

/// Core reconciliation engine
///
/// The engine is stateless between runs and can be shared behind an `Arc`.
/// Each call to [`ReconciliationEngine::run()`] is an independent attempt.
///
/// ## Threading
///
/// A run processes hosts and records strictly in sequence. Serialising runs
/// against each other is the scheduler's job.
pub struct ReconciliationEngine {
    /// Resolver for the current public address(es)
    resolver: Box<dyn AddressResolver>,

    /// Factory for per-run provider clients
    provider_factory: Box<dyn DnsProviderFactory>,
}

impl ReconciliationEngine {
    /// Create a new engine
    ///
    /// # Parameters
    ///
    /// - `resolver`: AddressResolver implementation
    /// - `provider_factory`: factory for DnsProvider clients
    pub fn new(
        resolver: Box<dyn AddressResolver>,
        provider_factory: Box<dyn DnsProviderFactory>,
    ) -> Self {
        Self {
            resolver,
            provider_factory,
        }
    }

    /// Run one reconciliation
    ///
    /// Never fails: every problem is logged and reflected in the returned
    /// report, and the next scheduled run starts over.
    pub async fn run(&self, config: &ReconciliationConfig) -> RunReport {
        let mut report = RunReport::started();
        info!(
            domain = %config.domain,
            hosts = config.hosts.len(),
            mode = %config.addressing_mode,
            "Starting reconciliation run"
        );

        let addresses = match self.resolver.resolve(config.addressing_mode).await {
            Ok(addresses) => addresses,
            Err(e) => return report.abort(RunStage::ResolveAddresses, e),
        };
        info!(ipv4 = ?addresses.ipv4, ipv6 = ?addresses.ipv6, "Resolved current addresses");

        let provider = match self.provider_factory.create(&config.credentials) {
            Ok(provider) => provider,
            Err(e) => return report.abort(RunStage::CreateClient, e),
        };

        let zone = match provider.get_zone(&config.domain).await {
            Ok(zone) => zone,
            Err(e) => return report.abort(RunStage::LookupZone, e),
        };
        debug!(zone = %zone.id, name = %zone.name, "Resolved zone");

        for host in &config.hosts {
            let fqdn = host.fqdn(&config.domain);
            debug!(host = %fqdn, "Reviewing host");

            let records = match provider.get_records(&zone.id, &host.label, &config.domain).await {
                Ok(records) => records,
                Err(e) => {
                    return report.abort(
                        RunStage::FetchRecords {
                            host: host.label.clone(),
                        },
                        e,
                    );
                }
            };

            if records.is_empty() {
                warn!(host = %fqdn, "No records found; records are never created, skipping host");
                continue;
            }

            for record in records.iter().filter(|r| r.record_type.is_address()) {
                let action = self.reconcile_record(provider.as_ref(), record, &addresses).await;
                report.records.push(RecordOutcome {
                    name: record.name.clone(),
                    record_type: record.record_type.to_string(),
                    action,
                });
            }
        }

        let report = report.finish();
        info!(
            updated = report.updated_count(),
            unchanged = report.unchanged_count(),
            failed = report.failed_count(),
            "Reconciliation run finished"
        );
        report
    }

    /// Compare one record against the resolved addresses and update it if needed
    async fn reconcile_record(
        &self,
        provider: &dyn DnsProvider,
        record: &DnsRecord,
        addresses: &AddressSet,
    ) -> RecordAction {
        let Some(desired) = addresses.for_record_type(&record.record_type) else {
            debug!(
                record = %record.name,
                record_type = %record.record_type,
                "No address resolved for this record type, skipping"
            );
            return RecordAction::Skipped;
        };

        if !record.differs_from(desired) {
            debug!(record = %record.name, ip = %desired, "Record already up to date");
            return RecordAction::Unchanged;
        }

        info!(
            record = %record.name,
            record_type = %record.record_type,
            "Address changed: {} -> {}, sending update",
            record.content,
            desired
        );

        match provider.update_record(record, &desired.to_string()).await {
            Ok(()) => {
                info!(record = %record.name, ip = %desired, "Record updated");
                RecordAction::Updated {
                    previous: record.content.clone(),
                    current: desired,
                }
            }
            Err(e) => {
                error!(record = %record.name, "Failed to update record via {}: {}", provider.provider_name(), e);
                RecordAction::Failed { error: e }
            }
        }
    }
}
