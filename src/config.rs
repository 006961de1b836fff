//! Verifier configuration, loaded from environment variables.
//!
//! | Variable                        | Default            |
//! |---------------------------------|--------------------|
//! | `TON_PROOF_ALLOWED_DOMAINS`     | required           |
//! | `TON_PROOF_PAYLOAD_TTL_SECS`    | `900`              |
//! | `TON_PROOF_RESOLVER_TIMEOUT_MS` | `5000`             |
//! | `TON_PROOF_PAYLOAD_CHECK`       | `before_signature` |
//! | `TON_PROOF_PAYLOAD_SECRET`      | none (hex)         |
//! | `TONCENTER_API_KEY`             | none               |

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const ENV_ALLOWED_DOMAINS: &str = "TON_PROOF_ALLOWED_DOMAINS";
pub const ENV_PAYLOAD_TTL_SECS: &str = "TON_PROOF_PAYLOAD_TTL_SECS";
pub const ENV_RESOLVER_TIMEOUT_MS: &str = "TON_PROOF_RESOLVER_TIMEOUT_MS";
pub const ENV_PAYLOAD_CHECK: &str = "TON_PROOF_PAYLOAD_CHECK";
pub const ENV_PAYLOAD_SECRET: &str = "TON_PROOF_PAYLOAD_SECRET";
pub const ENV_TONCENTER_API_KEY: &str = "TONCENTER_API_KEY";

pub const DEFAULT_PAYLOAD_TTL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_RESOLVER_TIMEOUT: Duration = Duration::from_millis(5_000);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} not set")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Where the payload token gate sits in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadCheck {
    /// After the address check, before the signature
    #[default]
    BeforeSignature,
    /// Only once the signature is known good
    AfterSignature,
    Disabled,
}

impl FromStr for PayloadCheck {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "before_signature" | "before" => Ok(PayloadCheck::BeforeSignature),
            "after_signature" | "after" => Ok(PayloadCheck::AfterSignature),
            "disabled" | "off" | "none" => Ok(PayloadCheck::Disabled),
            other => Err(format!("unknown payload check mode '{}'", other)),
        }
    }
}

impl fmt::Display for PayloadCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PayloadCheck::BeforeSignature => "before_signature",
            PayloadCheck::AfterSignature => "after_signature",
            PayloadCheck::Disabled => "disabled",
        })
    }
}

// ============================================================================
// VERIFIER CONFIG
// ============================================================================

/// Read-only settings injected into the verifier
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Domain names a proof may be addressed to, matched exactly
    pub allowed_domains: HashSet<String>,
    pub payload_ttl: Duration,
    pub resolver_timeout: Duration,
    pub payload_check: PayloadCheck,
}

impl VerifierConfig {
    pub fn new<I, S>(allowed_domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_domains: allowed_domains
                .into_iter()
                .map(|d| d.as_ref().trim().to_string())
                .filter(|d| !d.is_empty())
                .collect(),
            payload_ttl: DEFAULT_PAYLOAD_TTL,
            resolver_timeout: DEFAULT_RESOLVER_TIMEOUT,
            payload_check: PayloadCheck::default(),
        }
    }

    pub fn with_payload_ttl(mut self, ttl: Duration) -> Self {
        self.payload_ttl = ttl;
        self
    }

    pub fn with_resolver_timeout(mut self, timeout: Duration) -> Self {
        self.resolver_timeout = timeout;
        self
    }

    pub fn with_payload_check(mut self, check: PayloadCheck) -> Self {
        self.payload_check = check;
        self
    }

    pub fn is_domain_allowed(&self, domain: &str) -> bool {
        self.allowed_domains.contains(domain)
    }

    /// Load from the process environment (after `.env`, if any)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load through an arbitrary lookup, one variable name at a time
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let domains = lookup(ENV_ALLOWED_DOMAINS).ok_or(ConfigError::Missing(ENV_ALLOWED_DOMAINS))?;
        let config = Self::new(domains.split(','));
        if config.allowed_domains.is_empty() {
            return Err(ConfigError::Invalid {
                name: ENV_ALLOWED_DOMAINS,
                reason: "no domains listed".to_string(),
            });
        }

        let payload_ttl = match lookup(ENV_PAYLOAD_TTL_SECS) {
            Some(v) => Duration::from_secs(parse_number(ENV_PAYLOAD_TTL_SECS, &v)?),
            None => DEFAULT_PAYLOAD_TTL,
        };
        let resolver_timeout = match lookup(ENV_RESOLVER_TIMEOUT_MS) {
            Some(v) => Duration::from_millis(parse_number(ENV_RESOLVER_TIMEOUT_MS, &v)?),
            None => DEFAULT_RESOLVER_TIMEOUT,
        };
        let payload_check = match lookup(ENV_PAYLOAD_CHECK) {
            Some(v) => v.parse().map_err(|reason| ConfigError::Invalid {
                name: ENV_PAYLOAD_CHECK,
                reason,
            })?,
            None => PayloadCheck::default(),
        };

        Ok(config
            .with_payload_ttl(payload_ttl)
            .with_resolver_timeout(resolver_timeout)
            .with_payload_check(payload_check))
    }
}

fn parse_number(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

// ============================================================================
// SERVICE SETTINGS
// ============================================================================

/// Secrets and credentials for the concrete collaborators
#[derive(Clone, Default)]
pub struct ServiceSettings {
    pub payload_secret: Option<Vec<u8>>,
    pub toncenter_api_key: Option<String>,
}

impl fmt::Debug for ServiceSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceSettings")
            .field("payload_secret", &self.payload_secret.as_ref().map(|_| "<redacted>"))
            .field("toncenter_api_key", &self.toncenter_api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ServiceSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let payload_secret = lookup(ENV_PAYLOAD_SECRET)
            .map(|v| {
                hex::decode(v.trim()).map_err(|e| ConfigError::Invalid {
                    name: ENV_PAYLOAD_SECRET,
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        Ok(Self {
            payload_secret,
            toncenter_api_key: lookup(ENV_TONCENTER_API_KEY).filter(|k| !k.trim().is_empty()),
        })
    }
}
