// # DNS Provider Trait
//
// Defines the interface for reading and updating DNS records via a provider's
// REST API.
//
// ## Implementations
//
// - Cloudflare: `ddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::DnsProvider;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//
//     let zone = provider.get_zone("example.com").await?;
//     for record in provider.get_records(&zone.id, "home", "example.com").await? {
//         provider.update_record(&record, "203.0.113.9").await?;
//     }
//
//     Ok(())
// }
// ```

use crate::config::Credentials;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Provider-side container for a domain's records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    /// Provider zone ID
    pub id: String,
    /// Zone name
    pub name: String,
}

/// DNS record type as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    Aaaa,
    /// Any other type; never touched by reconciliation
    Other(String),
}

impl RecordType {
    /// Provider wire name of the type
    pub fn as_str(&self) -> &str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Other(name) => name,
        }
    }

    /// Whether the type holds an address (A or AAAA)
    pub fn is_address(&self) -> bool {
        matches!(self, RecordType::A | RecordType::Aaaa)
    }
}

impl From<String> for RecordType {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "A" => RecordType::A,
            "AAAA" => RecordType::Aaaa,
            _ => RecordType::Other(value),
        }
    }
}

impl From<&str> for RecordType {
    fn from(value: &str) -> Self {
        RecordType::from(value.to_string())
    }
}

impl From<RecordType> for String {
    fn from(value: RecordType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A DNS record as currently stored by the provider
///
/// Fetched fresh on every run; never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    /// Provider record ID
    pub id: String,
    /// Zone the record was fetched from
    pub zone_id: String,
    /// Record type
    pub record_type: RecordType,
    /// Fully-qualified record name
    pub name: String,
    /// Current content (an IP literal for A/AAAA)
    pub content: String,
    /// Time-to-live (1 means "automatic" on Cloudflare)
    pub ttl: u32,
    /// Whether traffic is proxied through the provider
    pub proxied: bool,
}

impl DnsRecord {
    /// Whether the stored content differs from `desired`
    ///
    /// Content is compared as an address, so equivalent spellings of the same
    /// IPv6 address match. Unparsable content always differs.
    pub fn differs_from(&self, desired: IpAddr) -> bool {
        match self.content.trim().parse::<IpAddr>() {
            Ok(current) => current != desired,
            Err(_) => true,
        }
    }
}

/// Trait for DNS provider clients
///
/// A client is constructed with credentials and is otherwise stateless: it
/// caches no responses and performs no retries. Deciding whether an update is
/// needed is the engine's job.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Look up the zone for `domain`
    ///
    /// # Returns
    ///
    /// - `Ok(Zone)`: the first zone the provider returned for the name
    /// - `Err(Error::ZoneNotFound)`: the provider reported no such zone
    async fn get_zone(&self, domain: &str) -> Result<Zone, crate::Error>;

    /// List the records named `host_label.domain` in a zone
    ///
    /// May return both A and AAAA records, records of other types, or none.
    async fn get_records(
        &self,
        zone_id: &str,
        host_label: &str,
        domain: &str,
    ) -> Result<Vec<DnsRecord>, crate::Error>;

    /// Replace a record's content, preserving type, name, TTL and proxy flag
    async fn update_record(&self, record: &DnsRecord, new_content: &str) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS provider clients from credentials
///
/// The engine creates one client per run from the run's credentials.
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance
    ///
    /// # Returns
    ///
    /// A boxed DnsProvider trait object, or a configuration error
    fn create(&self, credentials: &Credentials) -> Result<Box<dyn DnsProvider>, crate::Error>;
}
