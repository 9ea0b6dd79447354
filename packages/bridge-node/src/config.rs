//! Node configuration
//!
//! Loaded from the environment (and a `.env` file if present). Attester keys
//! are secrets and never appear in `Debug` output.

use alloy::primitives::Address;
use bridge_core::{
    AttestationSigner, DomainId, DomainTable, MultisigSpec, QuorumPolicy, BURN_MESSAGE_LEN,
};
use eyre::{eyre, Result, WrapErr};
use std::collections::HashSet;
use std::env;
use std::fmt;
use std::time::Duration;

use crate::retry::RetryConfig;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "pretty" | "" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(eyre!("Invalid LOG_FORMAT '{}': expected text or json", other)),
        }
    }

    /// Read `LOG_FORMAT` before the rest of the config so logging is up first.
    pub fn from_env() -> Self {
        env::var("LOG_FORMAT")
            .ok()
            .and_then(|v| Self::parse(&v).ok())
            .unwrap_or_default()
    }
}

#[derive(Clone)]
pub struct Config {
    /// Hex private keys, one per attester worker
    pub attester_keys: Vec<String>,

    /// Domains hosted by this devnet, in declaration order
    pub domains: Vec<(DomainId, String)>,
    /// Domains deployed with the fixed 3-of-5 oracle policy
    pub oracle_domains: Vec<DomainId>,

    /// k for non-oracle domains
    pub quorum_min_signatures: u32,
    /// n for non-oracle domains
    pub quorum_total: u32,

    /// Hex-encoded governance signer keys; defaults to the attester addresses
    pub governance_signers: Vec<String>,
    pub governance_threshold: u16,
    /// bech32 prefix the governance address is also rendered under
    pub governance_hrp: String,

    pub max_message_body_size: usize,

    /// Relayer poll interval in milliseconds
    pub poll_interval_ms: u64,
    pub retry_initial_backoff_ms: u64,
    pub retry_max_backoff_ms: u64,

    /// Settled-message dedupe cache
    pub settled_cache_size: usize,
    pub settled_cache_ttl_secs: u64,

    pub api_bind_address: String,
    pub api_port: u16,

    pub log_format: LogFormat,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field(
                "attester_keys",
                &format!("<{} redacted>", self.attester_keys.len()),
            )
            .field("domains", &self.domains)
            .field("oracle_domains", &self.oracle_domains)
            .field("quorum_min_signatures", &self.quorum_min_signatures)
            .field("quorum_total", &self.quorum_total)
            .field("governance_signers", &self.governance_signers)
            .field("governance_threshold", &self.governance_threshold)
            .field("governance_hrp", &self.governance_hrp)
            .field("max_message_body_size", &self.max_message_body_size)
            .field("poll_interval_ms", &self.poll_interval_ms)
            .field("retry_initial_backoff_ms", &self.retry_initial_backoff_ms)
            .field("retry_max_backoff_ms", &self.retry_max_backoff_ms)
            .field("settled_cache_size", &self.settled_cache_size)
            .field("settled_cache_ttl_secs", &self.settled_cache_ttl_secs)
            .field("api_bind_address", &self.api_bind_address)
            .field("api_port", &self.api_port)
            .field("log_format", &self.log_format)
            .finish()
    }
}

fn default_domains() -> &'static str {
    "1=ethereum,2=terra-classic"
}

fn default_quorum_min_signatures() -> u32 {
    3
}

fn default_quorum_total() -> u32 {
    5
}

fn default_governance_hrp() -> String {
    "terra".to_string()
}

fn default_max_message_body_size() -> usize {
    bridge_core::DEFAULT_MAX_MESSAGE_BODY_SIZE
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_retry_initial_backoff_ms() -> u64 {
    500
}

fn default_retry_max_backoff_ms() -> u64 {
    30_000
}

fn default_settled_cache_size() -> usize {
    10_000
}

fn default_settled_cache_ttl_secs() -> u64 {
    86_400
}

fn default_api_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    9092
}

/// Parse an optional numeric variable, falling back to `default` when unset.
fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(v) if !v.trim().is_empty() => v
            .trim()
            .parse()
            .map_err(|_| eyre!("Invalid {}: '{}'", name, v)),
        _ => Ok(default),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `"1=ethereum,2=terra-classic"`.
pub fn parse_domains(value: &str) -> Result<Vec<(DomainId, String)>> {
    split_list(value)
        .into_iter()
        .map(|entry| {
            let (id, name) = entry
                .split_once('=')
                .ok_or_else(|| eyre!("Invalid domain entry '{}': expected <id>=<name>", entry))?;
            let id: u32 = id
                .trim()
                .parse()
                .map_err(|_| eyre!("Invalid domain id in '{}'", entry))?;
            Ok((DomainId::from_u32(id), name.trim().to_string()))
        })
        .collect()
}

fn parse_domain_ids(value: &str) -> Result<Vec<DomainId>> {
    split_list(value)
        .into_iter()
        .map(|s| {
            s.parse::<u32>()
                .map(DomainId::from_u32)
                .map_err(|_| eyre!("Invalid domain id '{}'", s))
        })
        .collect()
}

impl Config {
    /// Load configuration from `.env` and the environment, then validate.
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded .env from {:?}", path);
        }
        let config = Self::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse the environment without loading `.env` or validating.
    pub fn from_env() -> Result<Self> {
        let attester_keys = split_list(
            &env::var("ATTESTER_KEYS").map_err(|_| eyre!("ATTESTER_KEYS required"))?,
        );

        let domains = parse_domains(
            &env::var("DOMAINS").unwrap_or_else(|_| default_domains().to_string()),
        )?;
        let oracle_domains = parse_domain_ids(&env::var("ORACLE_DOMAINS").unwrap_or_default())?;

        let quorum_min_signatures =
            parse_var("QUORUM_MIN_SIGNATURES", default_quorum_min_signatures())?;
        let quorum_total = parse_var("QUORUM_TOTAL", default_quorum_total())?;

        let governance_signers = match env::var("GOVERNANCE_SIGNERS") {
            Ok(v) if !v.trim().is_empty() => split_list(&v),
            _ => Self::default_governance_signers(&attester_keys)?,
        };
        let governance_threshold = parse_var(
            "GOVERNANCE_THRESHOLD",
            u16::try_from(quorum_min_signatures).unwrap_or(u16::MAX),
        )?;

        Ok(Self {
            attester_keys,
            domains,
            oracle_domains,
            quorum_min_signatures,
            quorum_total,
            governance_signers,
            governance_threshold,
            governance_hrp: env::var("GOVERNANCE_HRP").unwrap_or_else(|_| default_governance_hrp()),
            max_message_body_size: parse_var(
                "MAX_MESSAGE_BODY_SIZE",
                default_max_message_body_size(),
            )?,
            poll_interval_ms: parse_var("POLL_INTERVAL_MS", default_poll_interval_ms())?,
            retry_initial_backoff_ms: parse_var(
                "RETRY_INITIAL_BACKOFF_MS",
                default_retry_initial_backoff_ms(),
            )?,
            retry_max_backoff_ms: parse_var(
                "RETRY_MAX_BACKOFF_MS",
                default_retry_max_backoff_ms(),
            )?,
            settled_cache_size: parse_var("SETTLED_CACHE_SIZE", default_settled_cache_size())?,
            settled_cache_ttl_secs: parse_var(
                "SETTLED_CACHE_TTL_SECS",
                default_settled_cache_ttl_secs(),
            )?,
            api_bind_address: env::var("API_BIND_ADDRESS")
                .unwrap_or_else(|_| default_api_bind_address()),
            api_port: parse_var("API_PORT", default_api_port())?,
            log_format: LogFormat::parse(&env::var("LOG_FORMAT").unwrap_or_default())?,
        })
    }

    /// Attester addresses as hex signer keys, used when no governance set is configured.
    fn default_governance_signers(attester_keys: &[String]) -> Result<Vec<String>> {
        attester_keys
            .iter()
            .map(|k| {
                let signer = AttestationSigner::from_private_key(k)?;
                Ok(format!("0x{}", hex::encode(signer.address())))
            })
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        // Domains
        if self.domains.len() < 2 {
            return Err(eyre!("DOMAINS must list at least two domains"));
        }
        let table = self.domain_table()?;
        for id in &self.oracle_domains {
            if !table.contains(*id) {
                return Err(eyre!("ORACLE_DOMAINS entry {} is not in DOMAINS", id));
            }
        }

        // Quorum
        let policy = self.quorum_policy()?;

        // Attesters
        let signers = self.attester_signers()?;
        if signers.is_empty() {
            return Err(eyre!("ATTESTER_KEYS cannot be empty"));
        }
        let mut seen = HashSet::new();
        for signer in &signers {
            if !seen.insert(signer.address()) {
                return Err(eyre!("ATTESTER_KEYS contains duplicate key for {}", signer.address()));
            }
        }
        if signers.len() > policy.total_attesters() as usize {
            return Err(eyre!(
                "{} attester keys exceed QUORUM_TOTAL {}",
                signers.len(),
                policy.total_attesters()
            ));
        }
        if !self.oracle_domains.is_empty()
            && signers.len() > QuorumPolicy::ORACLE.total_attesters() as usize
        {
            return Err(eyre!(
                "{} attester keys exceed the oracle set size {}",
                signers.len(),
                QuorumPolicy::ORACLE.total_attesters()
            ));
        }

        // Governance
        self.governance_spec()?;
        if self.governance_hrp.trim().is_empty() {
            return Err(eyre!("GOVERNANCE_HRP cannot be empty"));
        }

        // Messaging
        if self.max_message_body_size < BURN_MESSAGE_LEN {
            return Err(eyre!(
                "MAX_MESSAGE_BODY_SIZE must be at least {} bytes to carry a burn",
                BURN_MESSAGE_LEN
            ));
        }

        // Relayer
        if self.poll_interval_ms == 0 {
            return Err(eyre!("POLL_INTERVAL_MS must be greater than zero"));
        }
        if self.retry_initial_backoff_ms == 0 {
            return Err(eyre!("RETRY_INITIAL_BACKOFF_MS must be greater than zero"));
        }
        if self.retry_initial_backoff_ms > self.retry_max_backoff_ms {
            return Err(eyre!(
                "RETRY_INITIAL_BACKOFF_MS ({}) exceeds RETRY_MAX_BACKOFF_MS ({})",
                self.retry_initial_backoff_ms,
                self.retry_max_backoff_ms
            ));
        }
        if self.settled_cache_size == 0 || self.settled_cache_ttl_secs == 0 {
            return Err(eyre!("SETTLED_CACHE_SIZE and SETTLED_CACHE_TTL_SECS must be non-zero"));
        }

        Ok(())
    }

    pub fn domain_table(&self) -> Result<DomainTable> {
        let mut table = DomainTable::new();
        for (id, name) in &self.domains {
            table
                .register(*id, name)
                .wrap_err("Invalid DOMAINS")?;
        }
        Ok(table)
    }

    /// Policy for non-oracle domains
    pub fn quorum_policy(&self) -> Result<QuorumPolicy> {
        QuorumPolicy::new(self.quorum_min_signatures, self.quorum_total)
            .wrap_err("Invalid QUORUM_MIN_SIGNATURES / QUORUM_TOTAL")
    }

    pub fn policy_for(&self, domain: DomainId) -> Result<QuorumPolicy> {
        if self.oracle_domains.contains(&domain) {
            Ok(QuorumPolicy::ORACLE)
        } else {
            self.quorum_policy()
        }
    }

    pub fn attester_signers(&self) -> Result<Vec<AttestationSigner>> {
        self.attester_keys
            .iter()
            .enumerate()
            .map(|(i, k)| {
                AttestationSigner::from_private_key(k)
                    .wrap_err_with(|| format!("Invalid ATTESTER_KEYS entry #{}", i))
            })
            .collect()
    }

    pub fn governance_spec(&self) -> Result<MultisigSpec> {
        MultisigSpec::from_hex_keys(&self.governance_signers, self.governance_threshold)
            .wrap_err("Invalid GOVERNANCE_SIGNERS / GOVERNANCE_THRESHOLD")
    }

    pub fn governance_address(&self) -> Result<Address> {
        Ok(self.governance_spec()?.derive().to_evm())
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            initial_backoff: Duration::from_millis(self.retry_initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry_max_backoff_ms),
            ..RetryConfig::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "ATTESTER_KEYS",
        "DOMAINS",
        "ORACLE_DOMAINS",
        "QUORUM_MIN_SIGNATURES",
        "QUORUM_TOTAL",
        "GOVERNANCE_SIGNERS",
        "GOVERNANCE_THRESHOLD",
        "GOVERNANCE_HRP",
        "MAX_MESSAGE_BODY_SIZE",
        "POLL_INTERVAL_MS",
        "RETRY_INITIAL_BACKOFF_MS",
        "RETRY_MAX_BACKOFF_MS",
        "SETTLED_CACHE_SIZE",
        "SETTLED_CACHE_TTL_SECS",
        "API_BIND_ADDRESS",
        "API_PORT",
        "LOG_FORMAT",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    fn keys(n: u8) -> String {
        (1..=n)
            .map(|i| format!("0x{}", hex::encode([i; 32])))
            .collect::<Vec<_>>()
            .join(",")
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_env();
        env::set_var("ATTESTER_KEYS", keys(5));

        let config = Config::from_env().unwrap();
        config.validate().unwrap();

        assert_eq!(config.attester_keys.len(), 5);
        assert_eq!(config.domains.len(), 2);
        assert_eq!(config.domains[1], (DomainId::from_u32(2), "terra-classic".to_string()));
        assert_eq!(config.quorum_policy().unwrap(), QuorumPolicy::ORACLE);
        assert_eq!(config.governance_signers.len(), 5);
        assert_eq!(config.governance_threshold, 3);
        assert_eq!(config.api_port, 9092);
        assert_eq!(config.log_format, LogFormat::Text);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_missing_attester_keys() {
        clear_env();
        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("ATTESTER_KEYS required"));
    }

    #[test]
    #[serial]
    fn test_explicit_values() {
        clear_env();
        env::set_var("ATTESTER_KEYS", keys(3));
        env::set_var("DOMAINS", "1=ethereum, 2=terra-classic, 3=bsc");
        env::set_var("ORACLE_DOMAINS", "1,3");
        env::set_var("QUORUM_MIN_SIGNATURES", "2");
        env::set_var("QUORUM_TOTAL", "3");
        env::set_var("POLL_INTERVAL_MS", "50");
        env::set_var("LOG_FORMAT", "json");

        let config = Config::from_env().unwrap();
        config.validate().unwrap();

        assert_eq!(config.domains.len(), 3);
        assert_eq!(config.policy_for(DomainId::from_u32(1)).unwrap(), QuorumPolicy::ORACLE);
        assert_eq!(
            config.policy_for(DomainId::from_u32(2)).unwrap(),
            QuorumPolicy::new(2, 3).unwrap()
        );
        assert_eq!(config.governance_threshold, 2);
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.log_format, LogFormat::Json);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_validation_failures() {
        clear_env();
        env::set_var("ATTESTER_KEYS", keys(3));

        env::set_var("QUORUM_MIN_SIGNATURES", "4");
        env::set_var("QUORUM_TOTAL", "3");
        assert!(Config::from_env().unwrap().validate().is_err());

        env::set_var("QUORUM_MIN_SIGNATURES", "2");
        env::set_var("QUORUM_TOTAL", "2");
        let err = Config::from_env().unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("exceed QUORUM_TOTAL"));

        env::set_var("QUORUM_TOTAL", "3");
        env::set_var("DOMAINS", "1=ethereum,2=ethereum");
        assert!(Config::from_env().unwrap().validate().is_err());

        env::set_var("DOMAINS", "1=ethereum,2=terra-classic");
        env::set_var("ORACLE_DOMAINS", "7");
        assert!(Config::from_env().unwrap().validate().is_err());

        env::remove_var("ORACLE_DOMAINS");
        env::set_var("RETRY_INITIAL_BACKOFF_MS", "5000");
        env::set_var("RETRY_MAX_BACKOFF_MS", "100");
        assert!(Config::from_env().unwrap().validate().is_err());

        env::remove_var("RETRY_INITIAL_BACKOFF_MS");
        env::remove_var("RETRY_MAX_BACKOFF_MS");
        env::set_var("GOVERNANCE_THRESHOLD", "9");
        assert!(Config::from_env().unwrap().validate().is_err());

        env::remove_var("GOVERNANCE_THRESHOLD");
        env::set_var("API_PORT", "not-a-port");
        assert!(Config::from_env().is_err());
        clear_env();
    }

    #[test]
    #[serial]
    fn test_duplicate_attester_keys_rejected() {
        clear_env();
        let key = format!("0x{}", hex::encode([1u8; 32]));
        env::set_var("ATTESTER_KEYS", format!("{},{}", key, key));
        env::set_var("GOVERNANCE_SIGNERS", format!("0x{}", hex::encode([9u8; 20])));
        env::set_var("GOVERNANCE_THRESHOLD", "1");
        let err = Config::from_env().unwrap().validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_debug_redacts_keys() {
        clear_env();
        env::set_var("ATTESTER_KEYS", keys(1));
        env::set_var("QUORUM_MIN_SIGNATURES", "1");
        let config = Config::from_env().unwrap();
        let debug = format!("{:?}", config);
        assert!(debug.contains("<1 redacted>"));
        assert!(!debug.contains(&hex::encode([1u8; 32])));
        clear_env();
    }

    #[test]
    fn test_parse_domains() {
        let domains = parse_domains("1=ethereum,56=bsc").unwrap();
        assert_eq!(domains[1].0, DomainId::from_u32(56));
        assert!(parse_domains("ethereum").is_err());
        assert!(parse_domains("x=ethereum").is_err());
    }
}
