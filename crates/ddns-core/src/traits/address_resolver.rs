// # Address Resolver Trait
//
// Defines the interface for determining the machine's current public
// address(es).
//
// ## Implementations
//
// - HTTP echo endpoints: `ddns-ip-http` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::{AddressResolver, AddressingMode};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let resolver = /* AddressResolver implementation */;
//
//     let addresses = resolver.resolve(AddressingMode::Dual).await?;
//     println!("v4={:?} v6={:?}", addresses.ipv4, addresses.ipv6);
//
//     Ok(())
// }
// ```

use crate::config::AddressingMode;
use crate::traits::RecordType;
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Public addresses observed during one run
///
/// Lives only for the duration of a reconciliation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddressSet {
    /// Current public IPv4 address, if resolved
    pub ipv4: Option<Ipv4Addr>,
    /// Current public IPv6 address, if resolved
    pub ipv6: Option<Ipv6Addr>,
}

impl AddressSet {
    /// Address set with only an IPv4 address
    pub fn v4(ip: Ipv4Addr) -> Self {
        Self {
            ipv4: Some(ip),
            ipv6: None,
        }
    }

    /// Address set with only an IPv6 address
    pub fn v6(ip: Ipv6Addr) -> Self {
        Self {
            ipv4: None,
            ipv6: Some(ip),
        }
    }

    /// Address set with both families
    pub fn dual(v4: Ipv4Addr, v6: Ipv6Addr) -> Self {
        Self {
            ipv4: Some(v4),
            ipv6: Some(v6),
        }
    }

    /// Whether no family was resolved
    pub fn is_empty(&self) -> bool {
        self.ipv4.is_none() && self.ipv6.is_none()
    }

    /// Desired content for a record of the given type
    ///
    /// A maps to IPv4, AAAA to IPv6; other types never have a desired address.
    pub fn for_record_type(&self, record_type: &RecordType) -> Option<IpAddr> {
        match record_type {
            RecordType::A => self.ipv4.map(IpAddr::V4),
            RecordType::Aaaa => self.ipv6.map(IpAddr::V6),
            RecordType::Other(_) => None,
        }
    }
}

/// Trait for address resolver implementations
///
/// A resolver is queried once per run and holds no state between runs.
/// It performs no retries: a failed run is retried by the next scheduled tick.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Resolve the current public address(es) for `mode`
    ///
    /// # Returns
    ///
    /// - `Ok(AddressSet)`: one address per family the mode includes
    /// - `Err(Error)`: if any required family failed; never a partial set
    async fn resolve(&self, mode: AddressingMode) -> Result<AddressSet, crate::Error>;
}
