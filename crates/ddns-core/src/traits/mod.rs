// Core traits for the DDNS system
//
// The engine depends only on these seams; concrete implementations live in
// their own crates.

pub mod address_resolver;
pub mod dns_provider;

pub use address_resolver::{AddressResolver, AddressSet};
pub use dns_provider::{DnsProvider, DnsProviderFactory, DnsRecord, RecordType, Zone};
