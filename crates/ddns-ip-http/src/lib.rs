// # HTTP Address Resolver
//
// This crate resolves the machine's public address(es) by asking HTTP echo
// endpoints, which answer with the caller's address as plain text.
//
// ## Architecture
//
// One endpoint per address family (IPv4 and IPv6). In dual mode both are
// queried concurrently and both must succeed; a partial result is never
// returned.
//
// Nothing is cached: every call to `resolve()` performs fresh requests.

use ddns_core::traits::{AddressResolver, AddressSet};
use ddns_core::{AddressingMode, Error, Result};

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use std::time::Duration;

/// Default IPv4 echo endpoint
pub const DEFAULT_IPV4_URL: &str = "https://v4.ident.me";

/// Default IPv6 echo endpoint
pub const DEFAULT_IPV6_URL: &str = "https://v6.ident.me";

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Endpoints and timeout for [`HttpAddressResolver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResolverConfig {
    /// Endpoint answering with the caller's IPv4 address
    pub ipv4_url: String,

    /// Endpoint answering with the caller's IPv6 address
    pub ipv6_url: String,

    /// Upper bound for each request, connection included
    pub timeout: Duration,
}

impl Default for HttpResolverConfig {
    fn default() -> Self {
        Self {
            ipv4_url: DEFAULT_IPV4_URL.to_string(),
            ipv6_url: DEFAULT_IPV6_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Address family label, used to tag errors and logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    V4,
    V6,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::V4 => f.write_str("ipv4"),
            Family::V6 => f.write_str("ipv6"),
        }
    }
}

/// Address resolver backed by HTTP echo endpoints
pub struct HttpAddressResolver {
    config: HttpResolverConfig,

    /// HTTP client (timeout applied to every request)
    client: reqwest::Client,
}

impl HttpAddressResolver {
    /// Create a resolver with custom endpoints and timeout
    pub fn with_config(config: HttpResolverConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn url(&self, family: Family) -> &str {
        match family {
            Family::V4 => &self.config.ipv4_url,
            Family::V6 => &self.config.ipv6_url,
        }
    }

    /// Fetch one family's address
    async fn fetch<T>(&self, family: Family) -> Result<T>
    where
        T: FromStr,
    {
        let url = self.url(family);
        tracing::debug!(family = %family, url = %url, "Querying echo endpoint");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::network(family.to_string(), e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(Error::network(
                family.to_string(),
                format!("unacceptable status code: {}", status.as_u16()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|_| Error::network(family.to_string(), "failed to decode body"))?;

        let text = body.trim();
        text.parse::<T>().map_err(|_| {
            Error::decode(format!("{} endpoint returned {:?}, not an {} address", family, text, family))
        })
    }
}

#[async_trait::async_trait]
impl AddressResolver for HttpAddressResolver {
    async fn resolve(&self, mode: AddressingMode) -> Result<AddressSet> {
        let addresses = match mode {
            AddressingMode::Ipv4Only => AddressSet::v4(self.fetch::<Ipv4Addr>(Family::V4).await?),
            AddressingMode::Ipv6Only => AddressSet::v6(self.fetch::<Ipv6Addr>(Family::V6).await?),
            AddressingMode::Dual => {
                let (v4, v6) = tokio::join!(
                    self.fetch::<Ipv4Addr>(Family::V4),
                    self.fetch::<Ipv6Addr>(Family::V6)
                );
                AddressSet::dual(v4?, v6?)
            }
        };

        tracing::debug!(ipv4 = ?addresses.ipv4, ipv6 = ?addresses.ipv6, "Resolved public addresses");
        Ok(addresses)
    }
}
