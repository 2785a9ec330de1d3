// # Cloudflare DNS Provider
//
// This crate provides a Cloudflare DNS provider implementation for the DDNS system.
//
// The client is stateless and single-shot: it caches nothing between calls,
// performs no retries and spawns no tasks. Deciding whether a write is needed
// is the engine's job.
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
// - Provider MUST fail fast if email or token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List Zones: GET `/zones?name=...`
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...`
// - Update DNS Record: PATCH `/zones/:zone_id/dns_records/:record_id`

use async_trait::async_trait;
use ddns_core::config::fqdn;
use ddns_core::traits::{DnsProvider, DnsProviderFactory, DnsRecord, RecordType, Zone};
use ddns_core::{Credentials, Error, Result};
use reqwest::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cloudflare API base URL
pub const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest response excerpt carried in an error
const MAX_EXCERPT_CHARS: usize = 200;

/// Envelope around every Cloudflare v4 response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    result: Option<T>,
    #[serde(default)]
    errors: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

impl<T> ApiResponse<T> {
    /// Provider error messages joined for logging
    fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return "no error details".to_string();
        }
        self.errors
            .iter()
            .map(|e| format!("{} ({})", e.message, e.code))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Deserialize)]
struct ZoneResult {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RecordResult {
    id: String,
    #[serde(default)]
    zone_id: Option<String>,
    #[serde(rename = "type")]
    record_type: RecordType,
    name: String,
    content: String,
    #[serde(default = "default_ttl")]
    ttl: u32,
    #[serde(default)]
    proxied: bool,
}

fn default_ttl() -> u32 {
    1
}

/// PATCH body; every field except `content` is copied from the existing record
#[derive(Debug, Serialize)]
struct UpdatePayload<'a> {
    #[serde(rename = "type")]
    record_type: &'a str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    proxied: bool,
}

/// Connection options shared by every client a factory builds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// API base URL, without trailing slash
    pub base_url: String,

    /// Upper bound for each request
    pub timeout: Duration,

    /// Dry-run mode: if true, perform GET requests but skip PATCH updates
    pub dry_run: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: CLOUDFLARE_API_BASE.to_string(),
            timeout: DEFAULT_HTTP_TIMEOUT,
            dry_run: false,
        }
    }
}

/// Cloudflare DNS client
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the client will:
/// - Perform all GET requests (zone lookup, record listing)
/// - Log the intended PATCH payload
/// - **NOT** actually modify DNS records
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose the API token.
pub struct CloudflareClient {
    /// Account email and API token
    /// ⚠️ NEVER log the token
    credentials: Credentials,

    base_url: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    dry_run: bool,
}

impl std::fmt::Debug for CloudflareClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareClient")
            .field("email", &self.credentials.email)
            .field("api_token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareClient {
    /// Create a new Cloudflare client
    ///
    /// # Parameters
    ///
    /// - `credentials`: account email and API token with Zone:DNS:Edit permissions
    /// - `options`: base URL, timeout and dry-run flag
    ///
    /// # Errors
    ///
    /// `Error::Config` if the credentials are incomplete or the HTTP client
    /// cannot be built.
    pub fn new(credentials: Credentials, options: &ClientOptions) -> Result<Self> {
        credentials.validate()?;

        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            credentials,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            client,
            dry_run: options.dry_run,
        })
    }

    /// Attach identity, auth and content-type headers
    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("X-Auth-Email", &self.credentials.email)
            .bearer_auth(&self.credentials.api_token)
            .header(CONTENT_TYPE, "application/json")
    }

    /// Send a GET and decode the response envelope
    ///
    /// Any status other than 200 is a `ProviderHttp` error.
    async fn get_json<T>(
        &self,
        context: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| Error::network(context, e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::provider_http(
                status.as_u16(),
                format!("{}: {}", context, excerpt(&body)),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::network(context, format!("failed to read body: {}", e)))?;

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl DnsProvider for CloudflareClient {
    /// Look up a zone by name
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones?name=example.com
    /// X-Auth-Email: <email>
    /// Authorization: Bearer <token>
    /// ```
    async fn get_zone(&self, domain: &str) -> Result<Zone> {
        tracing::debug!("Looking up zone ID for domain: {}", domain);

        let request = self
            .client
            .get(format!("{}/zones", self.base_url))
            .query(&[("name", domain)]);
        let response: ApiResponse<Vec<ZoneResult>> = self.get_json("zone lookup", request).await?;

        if !response.success {
            return Err(Error::zone_not_found(format!(
                "{}: {}",
                domain,
                response.error_summary()
            )));
        }

        // First match wins
        let zone = response
            .result
            .and_then(|zones| zones.into_iter().next())
            .ok_or_else(|| Error::zone_not_found(domain))?;

        tracing::debug!("Found zone ID: {}", zone.id);
        Ok(Zone {
            id: zone.id,
            name: zone.name,
        })
    }

    /// List the records named `host_label.domain`
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?name=home.example.com
    /// ```
    async fn get_records(
        &self,
        zone_id: &str,
        host_label: &str,
        domain: &str,
    ) -> Result<Vec<DnsRecord>> {
        let name = fqdn(host_label, domain);
        tracing::debug!("Listing records for {} in zone {}", name, zone_id);

        let request = self
            .client
            .get(format!("{}/zones/{}/dns_records", self.base_url, zone_id))
            .query(&[("name", name.as_str())]);
        let response: ApiResponse<Vec<RecordResult>> =
            self.get_json("record lookup", request).await?;

        if !response.success {
            return Err(Error::zone_not_found(format!(
                "records for {}: {}",
                name,
                response.error_summary()
            )));
        }

        let records: Vec<DnsRecord> = response
            .result
            .unwrap_or_default()
            .into_iter()
            .map(|r| DnsRecord {
                id: r.id,
                zone_id: r.zone_id.unwrap_or_else(|| zone_id.to_string()),
                record_type: r.record_type,
                name: r.name,
                content: r.content,
                ttl: r.ttl,
                proxied: r.proxied,
            })
            .collect();

        tracing::debug!("Found {} record(s) for {}", records.len(), name);
        Ok(records)
    }

    /// Replace a record's content
    ///
    /// Skipped (but logged) in dry-run mode.
    ///
    /// # API Call
    ///
    /// ```http
    /// PATCH /zones/:zone_id/dns_records/:record_id
    /// {
    ///   "type": "A",
    ///   "name": "home.example.com",
    ///   "content": "203.0.113.9",
    ///   "ttl": 1,
    ///   "proxied": false
    /// }
    /// ```
    async fn update_record(&self, record: &DnsRecord, new_content: &str) -> Result<()> {
        let url = format!(
            "{}/zones/{}/dns_records/{}",
            self.base_url, record.zone_id, record.id
        );
        let payload = UpdatePayload {
            record_type: record.record_type.as_str(),
            name: &record.name,
            content: new_content,
            ttl: record.ttl,
            proxied: record.proxied,
        };

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PATCH request to {} with payload: {}",
                url,
                serde_json::to_string(&payload)?
            );
            return Ok(());
        }

        let response = self
            .authorize(self.client.patch(&url))
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::network("record update", e.to_string()))?;

        // The status code alone confirms the write
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::update_failed(&record.name, status.as_u16(), excerpt(&body)));
        }

        tracing::info!("DNS record updated successfully: {} -> {}", record.name, new_content);
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}

/// First characters of a response body, for error messages
fn excerpt(body: &str) -> String {
    body.trim().chars().take(MAX_EXCERPT_CHARS).collect()
}

/// Factory for creating Cloudflare clients from run credentials
#[derive(Debug, Clone, Default)]
pub struct CloudflareFactory {
    options: ClientOptions,
}

impl CloudflareFactory {
    /// Create a factory with the given connection options
    pub fn new(options: ClientOptions) -> Self {
        if options.dry_run {
            tracing::warn!("Cloudflare provider running in DRY-RUN mode - no changes will be made");
        }
        Self { options }
    }
}

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, credentials: &Credentials) -> Result<Box<dyn DnsProvider>> {
        Ok(Box::new(CloudflareClient::new(
            credentials.clone(),
            &self.options,
        )?))
    }
}
