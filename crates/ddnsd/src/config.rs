// Daemon configuration
//
// Two sources are merged per field: the YAML file (`config.yaml`, or the path
// in `DDNS_CONFIG_FILE`) is read first, then environment variables fill any
// field the file left empty. Every validation message names the environment
// variable that fixes it.

use anyhow::{Context, Result, bail};
use ddns_core::scheduler::{DEFAULT_HEARTBEAT_SCHEDULE, DEFAULT_RECONCILE_SCHEDULE};
use ddns_core::{
    AddressingMode, Credentials, HostConfig, ReconciliationConfig, ScheduleSettings, Trigger,
};
use ddns_ip_http::{DEFAULT_IPV4_URL, DEFAULT_IPV6_URL, HttpResolverConfig};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// Config file looked up in the working directory when `DDNS_CONFIG_FILE` is unset
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Contents of the YAML config file; every field is optional
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub email: Option<String>,
    pub api_token: Option<String>,
    pub domain: Option<String>,
    pub hosts: Vec<String>,
    pub ip_stack: Option<String>,
    pub schedule: Option<String>,
    pub heartbeat_schedule: Option<String>,
    pub run_on_start: Option<bool>,
    pub ipv4_url: Option<String>,
    pub ipv6_url: Option<String>,
    pub http_timeout_secs: Option<u64>,
    pub mode: Option<String>,
    pub log_level: Option<String>,
}

impl FileConfig {
    /// Parse a YAML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }
}

/// Whether provider writes are performed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Records are updated
    Live,
    /// Updates are logged instead of sent
    DryRun,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "live" => Ok(Mode::Live),
            "dry-run" => Ok(Mode::DryRun),
            _ => bail!(
                "DDNS_MODE '{}' is not valid. Valid modes: live, dry-run",
                s
            ),
        }
    }
}

/// Fully validated daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Input of every reconciliation run
    pub reconciliation: ReconciliationConfig,

    /// Reconcile and heartbeat triggers
    pub schedule: ScheduleSettings,

    /// Echo endpoints and per-call timeout
    pub resolver: HttpResolverConfig,

    pub mode: Mode,

    pub log_level: Level,
}

impl DaemonConfig {
    /// Load from the config file (if any) and the process environment
    pub fn load() -> Result<Self> {
        let lookup = |key: &str| std::env::var(key).ok();

        let file = match config_file_path(&lookup) {
            Some(path) => FileConfig::load(&path)?,
            None => FileConfig::default(),
        };

        Self::from_sources(file, lookup)
    }

    /// Merge a parsed file with variables from `lookup` and validate the result
    ///
    /// File values win; `lookup` fills whatever the file left empty.
    pub fn from_sources(file: FileConfig, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let pick = |value: Option<String>, key: &str| {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .or_else(|| env(key))
        };

        let email = pick(file.email, "DDNS_EMAIL").context(
            "DDNS_EMAIL is required. Set it via: export DDNS_EMAIL=you@example.com",
        )?;
        let api_token = pick(file.api_token, "DDNS_API_TOKEN").context(
            "DDNS_API_TOKEN is required. Set it via: export DDNS_API_TOKEN=your_token",
        )?;
        let domain = pick(file.domain, "DDNS_DOMAIN")
            .context("DDNS_DOMAIN is required. Set it via: export DDNS_DOMAIN=example.com")?;
        validate_domain_name(&domain).context("DDNS_DOMAIN is not a valid domain name")?;

        let mut hosts: Vec<String> = file
            .hosts
            .iter()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();
        if hosts.is_empty() {
            hosts = env("DDNS_HOSTS")
                .unwrap_or_default()
                .split(',')
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .collect();
        }
        if hosts.is_empty() {
            bail!(
                "DDNS_HOSTS must contain at least one host. \
                Set it via: export DDNS_HOSTS=home,nas (use @ for the domain itself)"
            );
        }
        for host in &hosts {
            validate_host_label(host)?;
        }

        let ip_stack = pick(file.ip_stack, "DDNS_IP_STACK")
            .context("DDNS_IP_STACK is required. Set it to one of: ipv4, ipv6, dual")?;
        let addressing_mode = AddressingMode::from_str(&ip_stack)
            .map_err(|_| anyhow::anyhow!("DDNS_IP_STACK '{}' is not valid. Valid values: ipv4, ipv6, dual", ip_stack))?;

        let schedule = pick(file.schedule, "DDNS_SCHEDULE")
            .unwrap_or_else(|| DEFAULT_RECONCILE_SCHEDULE.to_string());
        let reconcile = Trigger::cron(&schedule).context("DDNS_SCHEDULE is not a valid cron expression")?;

        let heartbeat_schedule = pick(file.heartbeat_schedule, "DDNS_HEARTBEAT_SCHEDULE")
            .unwrap_or_else(|| DEFAULT_HEARTBEAT_SCHEDULE.to_string());
        let heartbeat = Trigger::cron(&heartbeat_schedule)
            .context("DDNS_HEARTBEAT_SCHEDULE is not a valid cron expression")?;

        let run_on_start = match file.run_on_start {
            Some(value) => value,
            None => match env("DDNS_RUN_ON_START") {
                Some(raw) => parse_bool(&raw).with_context(|| {
                    format!("DDNS_RUN_ON_START '{}' is not a valid boolean", raw)
                })?,
                None => true,
            },
        };

        let ipv4_url = pick(file.ipv4_url, "DDNS_IPV4_URL")
            .unwrap_or_else(|| DEFAULT_IPV4_URL.to_string());
        validate_url(&ipv4_url, "DDNS_IPV4_URL")?;
        let ipv6_url = pick(file.ipv6_url, "DDNS_IPV6_URL")
            .unwrap_or_else(|| DEFAULT_IPV6_URL.to_string());
        validate_url(&ipv6_url, "DDNS_IPV6_URL")?;

        let timeout_secs = match file.http_timeout_secs {
            Some(secs) => secs,
            None => match env("DDNS_HTTP_TIMEOUT_SECS") {
                Some(raw) => raw.parse().with_context(|| {
                    format!("DDNS_HTTP_TIMEOUT_SECS '{}' is not a number", raw)
                })?,
                None => DEFAULT_HTTP_TIMEOUT_SECS,
            },
        };
        if !(1..=120).contains(&timeout_secs) {
            bail!(
                "DDNS_HTTP_TIMEOUT_SECS must be between 1 and 120 seconds. Got: {}",
                timeout_secs
            );
        }

        let mode = match pick(file.mode, "DDNS_MODE") {
            Some(raw) => raw.parse()?,
            None => Mode::Live,
        };

        let log_level = match pick(file.log_level, "DDNS_LOG_LEVEL") {
            Some(raw) => Level::from_str(&raw).map_err(|_| {
                anyhow::anyhow!(
                    "DDNS_LOG_LEVEL '{}' is not valid. \
                    Valid levels: trace, debug, info, warn, error",
                    raw
                )
            })?,
            None => Level::INFO,
        };

        let reconciliation = ReconciliationConfig::new(
            Credentials::new(email, api_token),
            domain,
            hosts.into_iter().map(HostConfig::new).collect(),
            addressing_mode,
        );
        reconciliation.validate()?;

        Ok(Self {
            reconciliation,
            schedule: ScheduleSettings {
                reconcile,
                heartbeat,
                run_on_start,
            },
            resolver: HttpResolverConfig {
                ipv4_url,
                ipv6_url,
                timeout: Duration::from_secs(timeout_secs),
            },
            mode,
            log_level,
        })
    }
}

/// Config file to read, if any
///
/// An explicit `DDNS_CONFIG_FILE` is always returned (a missing file is then an
/// error); the default file is only used when it exists.
fn config_file_path(lookup: &impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    if let Some(path) = lookup("DDNS_CONFIG_FILE").filter(|p| !p.trim().is_empty()) {
        return Some(PathBuf::from(path.trim()));
    }

    let default = PathBuf::from(DEFAULT_CONFIG_FILE);
    default.is_file().then_some(default)
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "t" | "true" | "yes" => Ok(true),
        "0" | "f" | "false" | "no" => Ok(false),
        _ => bail!("expected true or false"),
    }
}

fn validate_url(url: &str, key: &str) -> Result<()> {
    if !url.starts_with("https://") && !url.starts_with("http://") {
        bail!("{} must use HTTP or HTTPS scheme. Got: {}", key, url);
    }
    Ok(())
}

/// Validate a host label; "@" stands for the domain itself
fn validate_host_label(label: &str) -> Result<()> {
    if label == "@" {
        return Ok(());
    }
    validate_domain_name(label)
        .with_context(|| format!("DDNS_HOSTS entry '{}' is not a valid host label", label))
}

/// Validate that a string is a valid domain name
///
/// This implements basic DNS domain name validation per RFC 1035.
/// It's not comprehensive but catches common errors.
fn validate_domain_name(domain: &str) -> Result<()> {
    if domain.is_empty() {
        bail!("Domain name cannot be empty");
    }

    // Total length limit (RFC 1035: 253 chars max)
    if domain.len() > 253 {
        bail!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        );
    }

    for label in domain.split('.') {
        if label.is_empty() {
            bail!("Domain name has empty label: '{}'", domain);
        }

        if label.len() > 63 {
            bail!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            );
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            bail!(
                "Domain label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric, hyphen and underscore only.",
                label
            );
        }

        if label.starts_with('-') || label.ends_with('-') {
            bail!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn minimal_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DDNS_EMAIL", "ops@example.com"),
            ("DDNS_API_TOKEN", "secret-token"),
            ("DDNS_DOMAIN", "example.com"),
            ("DDNS_HOSTS", "home, nas ,@"),
            ("DDNS_IP_STACK", "dual"),
        ]
    }

    fn error_text(result: Result<DaemonConfig>) -> String {
        format!("{:#}", result.unwrap_err())
    }

    #[test]
    fn env_only_config_with_defaults() {
        let config = DaemonConfig::from_sources(FileConfig::default(), env(&minimal_env())).unwrap();

        let labels: Vec<&str> = config
            .reconciliation
            .hosts
            .iter()
            .map(|h| h.label.as_str())
            .collect();
        assert_eq!(labels, vec!["home", "nas", "@"]);
        assert_eq!(config.reconciliation.addressing_mode, AddressingMode::Dual);
        assert_eq!(config.resolver.ipv4_url, DEFAULT_IPV4_URL);
        assert_eq!(config.resolver.timeout, Duration::from_secs(10));
        assert!(config.schedule.run_on_start);
        assert_eq!(config.schedule.reconcile.to_string(), "cron(0 */5 * * * *)");
        assert_eq!(config.mode, Mode::Live);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn file_values_win_and_env_fills_gaps() {
        let file = FileConfig {
            domain: Some("example.org".into()),
            hosts: vec!["www".into()],
            ip_stack: Some("ipv6".into()),
            mode: Some("dry-run".into()),
            ..FileConfig::default()
        };

        let config = DaemonConfig::from_sources(file, env(&minimal_env())).unwrap();

        assert_eq!(config.reconciliation.domain, "example.org");
        assert_eq!(config.reconciliation.hosts, vec![HostConfig::new("www")]);
        assert_eq!(config.reconciliation.addressing_mode, AddressingMode::Ipv6Only);
        assert_eq!(config.reconciliation.credentials.email, "ops@example.com");
        assert_eq!(config.mode, Mode::DryRun);
    }

    #[test]
    fn missing_required_field_names_env_var() {
        let vars: Vec<_> = minimal_env()
            .into_iter()
            .filter(|(k, _)| *k != "DDNS_API_TOKEN")
            .collect();

        let err = error_text(DaemonConfig::from_sources(FileConfig::default(), env(&vars)));
        assert!(err.contains("DDNS_API_TOKEN"), "got: {}", err);
    }

    #[test]
    fn blank_hosts_are_rejected() {
        let mut vars = minimal_env();
        vars.retain(|(k, _)| *k != "DDNS_HOSTS");
        vars.push(("DDNS_HOSTS", " , "));

        let err = error_text(DaemonConfig::from_sources(FileConfig::default(), env(&vars)));
        assert!(err.contains("DDNS_HOSTS"), "got: {}", err);
    }

    #[test]
    fn invalid_host_label_is_rejected() {
        let mut vars = minimal_env();
        vars.retain(|(k, _)| *k != "DDNS_HOSTS");
        vars.push(("DDNS_HOSTS", "home,-bad"));

        let err = error_text(DaemonConfig::from_sources(FileConfig::default(), env(&vars)));
        assert!(err.contains("-bad"), "got: {}", err);
    }

    #[test]
    fn unknown_ip_stack_is_rejected() {
        let mut vars = minimal_env();
        vars.retain(|(k, _)| *k != "DDNS_IP_STACK");
        vars.push(("DDNS_IP_STACK", "ipv5"));

        let err = error_text(DaemonConfig::from_sources(FileConfig::default(), env(&vars)));
        assert!(err.contains("DDNS_IP_STACK"), "got: {}", err);
    }

    #[test]
    fn timeout_out_of_range_is_rejected() {
        let mut vars = minimal_env();
        vars.push(("DDNS_HTTP_TIMEOUT_SECS", "0"));

        let err = error_text(DaemonConfig::from_sources(FileConfig::default(), env(&vars)));
        assert!(err.contains("DDNS_HTTP_TIMEOUT_SECS"), "got: {}", err);
    }

    #[test]
    fn invalid_cron_is_rejected() {
        let mut vars = minimal_env();
        vars.push(("DDNS_SCHEDULE", "every 5 minutes"));

        let err = error_text(DaemonConfig::from_sources(FileConfig::default(), env(&vars)));
        assert!(err.contains("DDNS_SCHEDULE"), "got: {}", err);
    }

    #[test]
    fn run_on_start_and_log_level_from_env() {
        let mut vars = minimal_env();
        vars.push(("DDNS_RUN_ON_START", "false"));
        vars.push(("DDNS_LOG_LEVEL", "debug"));

        let config = DaemonConfig::from_sources(FileConfig::default(), env(&vars)).unwrap();
        assert!(!config.schedule.run_on_start);
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn yaml_file_is_parsed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "email: ops@example.com\n\
             api_token: secret-token\n\
             domain: example.com\n\
             hosts:\n  - home\n  - nas\n\
             ip_stack: ipv4\n\
             run_on_start: false\n\
             http_timeout_secs: 5"
        )
        .unwrap();

        let parsed = FileConfig::load(file.path()).unwrap();
        assert_eq!(parsed.hosts, vec!["home", "nas"]);
        assert_eq!(parsed.run_on_start, Some(false));

        let config = DaemonConfig::from_sources(parsed, env(&[])).unwrap();
        assert_eq!(config.reconciliation.addressing_mode, AddressingMode::Ipv4Only);
        assert_eq!(config.resolver.timeout, Duration::from_secs(5));
    }

    #[test]
    fn unknown_yaml_key_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "emial: typo@example.com").unwrap();

        assert!(FileConfig::load(file.path()).is_err());
    }

    #[test]
    fn explicit_config_file_is_used() {
        let lookup = env(&[("DDNS_CONFIG_FILE", "/etc/ddns/config.yaml")]);
        assert_eq!(
            config_file_path(&lookup),
            Some(PathBuf::from("/etc/ddns/config.yaml"))
        );
    }
}
