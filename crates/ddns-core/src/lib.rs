// # ddns-core
//
// Core library for the scheduled DDNS updater.
//
// ## Architecture Overview
//
// This library provides the core functionality for dynamic DNS updates:
// - **AddressResolver**: Trait for determining the current public address(es)
// - **DnsProvider**: Trait for reading and updating DNS records via provider APIs
// - **ReconciliationEngine**: One run of resolve → compare → update
// - **Scheduler**: Triggers the engine on a schedule and logs a heartbeat
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic is separate from implementations
// 2. **Stateless Runs**: Each run starts from scratch; the provider is the only state
// 3. **Compare Before Write**: Records are only written when their content diverges
// 4. **Library-First**: All core functionality can be used as a library

pub mod config;
pub mod engine;
pub mod error;
pub mod scheduler;
pub mod traits;

// Re-export core types for convenience
pub use config::{AddressingMode, Credentials, HostConfig, ReconciliationConfig};
pub use engine::{
    ReconciliationEngine, RecordAction, RecordOutcome, RunOutcome, RunReport, RunStage,
};
pub use error::{Error, Result};
pub use scheduler::{ScheduleSettings, Scheduler, SchedulerHandle, Trigger};
pub use traits::{
    AddressResolver, AddressSet, DnsProvider, DnsProviderFactory, DnsRecord, RecordType, Zone,
};
