//! Contract Test: Compare Before Write
//!
//! Constraints verified:
//! - A record whose content already matches is never written
//! - A divergent record is written exactly once, with its other fields preserved
//! - Records of other types are ignored
//! - Repeating a run against an unchanged provider writes nothing new
//!
//! If this test fails, the engine is issuing unnecessary or lossy writes.

mod common;

use common::*;
use ddns_core::traits::{AddressSet, RecordType};
use ddns_core::{AddressingMode, RecordAction, ReconciliationEngine};
use std::net::IpAddr;

fn engine(addresses: AddressSet, state: &std::sync::Arc<ProviderState>) -> ReconciliationEngine {
    ReconciliationEngine::new(
        Box::new(StubResolver::returning(addresses)),
        Box::new(MockProviderFactory::new(state)),
    )
}

#[tokio::test]
async fn matching_record_is_not_updated() {
    let state = ProviderState::new();
    state.set_records("home", vec![record("r1", RecordType::A, "home", "203.0.113.9")]);

    let engine = engine(AddressSet::v4(v4("203.0.113.9")), &state);
    let report = engine.run(&config(&["home"], AddressingMode::Ipv4Only)).await;

    assert!(report.is_completed());
    assert_eq!(report.unchanged_count(), 1);
    assert!(state.updates().is_empty(), "no write expected for a matching record");
}

#[tokio::test]
async fn divergent_record_is_updated_once_with_fields_preserved() {
    let state = ProviderState::new();
    let mut existing = record("r1", RecordType::A, "home", "198.51.100.2");
    existing.ttl = 300;
    existing.proxied = true;
    state.set_records("home", vec![existing.clone()]);

    let engine = engine(AddressSet::v4(v4("203.0.113.9")), &state);
    let report = engine.run(&config(&["home"], AddressingMode::Ipv4Only)).await;

    let updates = state.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].new_content, "203.0.113.9");
    assert_eq!(updates[0].record, existing, "type, name, ttl and proxied are passed through");

    assert_eq!(
        report.records[0].action,
        RecordAction::Updated {
            previous: "198.51.100.2".into(),
            current: IpAddr::from([203, 0, 113, 9]),
        }
    );
}

#[tokio::test]
async fn equivalent_ipv6_spelling_is_not_rewritten() {
    let state = ProviderState::new();
    state.set_records(
        "home",
        vec![record("r1", RecordType::Aaaa, "home", "2001:0db8:0000:0000::0001")],
    );

    let engine = engine(AddressSet::v6(v6("2001:db8::1")), &state);
    engine.run(&config(&["home"], AddressingMode::Ipv6Only)).await;

    assert!(state.updates().is_empty());
}

#[tokio::test]
async fn non_address_records_are_ignored() {
    let state = ProviderState::new();
    state.set_records(
        "home",
        vec![
            record("t1", RecordType::Other("TXT".into()), "home", "v=spf1 -all"),
            record("r1", RecordType::A, "home", "198.51.100.2"),
        ],
    );

    let engine = engine(AddressSet::v4(v4("203.0.113.9")), &state);
    let report = engine.run(&config(&["home"], AddressingMode::Ipv4Only)).await;

    let updates = state.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].record.id, "r1");
    assert_eq!(report.records.len(), 1, "only A/AAAA records are reported");
}

#[tokio::test]
async fn record_without_resolved_family_is_skipped() {
    let state = ProviderState::new();
    state.set_records(
        "home",
        vec![
            record("r4", RecordType::A, "home", "198.51.100.2"),
            record("r6", RecordType::Aaaa, "home", "2001:db8::2"),
        ],
    );

    let engine = engine(AddressSet::v4(v4("203.0.113.9")), &state);
    let report = engine.run(&config(&["home"], AddressingMode::Ipv4Only)).await;

    let updates = state.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].record.id, "r4");
    assert_eq!(report.records[1].action, RecordAction::Skipped);
}

#[tokio::test]
async fn second_run_after_update_writes_nothing() {
    let state = ProviderState::new();
    state.set_records("home", vec![record("r1", RecordType::A, "home", "198.51.100.2")]);

    let engine = engine(AddressSet::v4(v4("203.0.113.9")), &state);
    let cfg = config(&["home"], AddressingMode::Ipv4Only);

    engine.run(&cfg).await;
    assert_eq!(state.updates().len(), 1);

    // Provider now holds the new address
    state.set_records("home", vec![record("r1", RecordType::A, "home", "203.0.113.9")]);
    let report = engine.run(&cfg).await;

    assert_eq!(state.updates().len(), 1, "no additional write on the second run");
    assert_eq!(report.unchanged_count(), 1);
    assert_eq!(state.clients_created(), 2, "a fresh client is built per run");
}
