//! Configuration types for the DDNS system
//!
//! These are the inputs of one reconciliation run. Loading them from files or
//! the environment is the daemon's job; this module only defines and validates
//! them.

use std::fmt;
use std::str::FromStr;

/// Input of one reconciliation run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationConfig {
    /// Provider credentials
    pub credentials: Credentials,

    /// Zone name, e.g. "example.com"
    pub domain: String,

    /// Hosts to keep in sync, processed in this order
    pub hosts: Vec<HostConfig>,

    /// Which address families are tracked
    pub addressing_mode: AddressingMode,
}

impl ReconciliationConfig {
    /// Create a new configuration
    pub fn new(
        credentials: Credentials,
        domain: impl Into<String>,
        hosts: Vec<HostConfig>,
        addressing_mode: AddressingMode,
    ) -> Self {
        Self {
            credentials,
            domain: domain.into(),
            hosts,
            addressing_mode,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.credentials.validate()?;

        if self.domain.trim().is_empty() {
            return Err(crate::Error::config("Domain cannot be empty"));
        }

        if self.hosts.is_empty() {
            return Err(crate::Error::config("No hosts configured"));
        }

        if let Some(host) = self.hosts.iter().find(|h| h.label.trim().is_empty()) {
            return Err(crate::Error::config(format!(
                "Host label cannot be empty (got {:?})",
                host.label
            )));
        }

        Ok(())
    }
}

/// Provider credentials
///
/// The Debug implementation does NOT expose the API token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account email, sent as the identity header
    pub email: String,

    /// API token, sent as a bearer token
    pub api_token: String,
}

impl Credentials {
    /// Create new credentials
    pub fn new(email: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            api_token: api_token.into(),
        }
    }

    /// Validate that both fields are present
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.email.trim().is_empty() {
            return Err(crate::Error::config("Email cannot be empty"));
        }
        if self.api_token.trim().is_empty() {
            return Err(crate::Error::config("API token cannot be empty"));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("api_token", &"<REDACTED>")
            .finish()
    }
}

/// One managed host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Label under the domain ("home" for home.example.com, "@" for the apex)
    pub label: String,
}

impl HostConfig {
    /// Create a new host configuration
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    /// Fully-qualified name of this host under `domain`
    pub fn fqdn(&self, domain: &str) -> String {
        fqdn(&self.label, domain)
    }
}

/// Join a host label and a domain; "@" addresses the domain itself
pub fn fqdn(label: &str, domain: &str) -> String {
    if label == "@" {
        domain.to_string()
    } else {
        format!("{}.{}", label, domain)
    }
}

/// Which address families are tracked and updated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    /// A records only
    Ipv4Only,
    /// AAAA records only
    Ipv6Only,
    /// Both A and AAAA records
    Dual,
}

impl FromStr for AddressingMode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ipv4" => Ok(AddressingMode::Ipv4Only),
            "ipv6" => Ok(AddressingMode::Ipv6Only),
            "dual" => Ok(AddressingMode::Dual),
            other => Err(crate::Error::config(format!(
                "unknown addressing mode: {:?} (expected ipv4, ipv6 or dual)",
                other
            ))),
        }
    }
}

impl fmt::Display for AddressingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AddressingMode::Ipv4Only => "ipv4",
            AddressingMode::Ipv6Only => "ipv6",
            AddressingMode::Dual => "dual",
        };
        f.write_str(name)
    }
}
