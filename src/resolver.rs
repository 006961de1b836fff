//! # Public key resolution over the network
//!
//! Used when a proof's state-init is not one of the built-in wallet
//! templates: the wallet contract itself is asked for its key through its
//! `get_public_key` get-method.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::proof::TonNetwork;
use crate::wallets::PUBLIC_KEY_LEN;

pub const TONCENTER_MAINNET: &str = "https://toncenter.com/api/v2";
pub const TONCENTER_TESTNET: &str = "https://testnet.toncenter.com/api/v2";

const GET_PUBLIC_KEY: &str = "get_public_key";

#[derive(Debug, Error)]
pub enum ResolveError {
    /// The contract exposes no readable key (not deployed, no such method)
    #[error("Public key not found for {0}")]
    NotFound(String),

    #[error("Resolver transport error: {0}")]
    Transport(String),

    #[error("Malformed resolver response: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait PublicKeyResolver: Send + Sync {
    /// Fetch the key controlling `address` (raw form) on `network`
    async fn resolve(
        &self,
        address: &str,
        network: TonNetwork,
    ) -> Result<[u8; PUBLIC_KEY_LEN], ResolveError>;
}

// ============================================================================
// TONCENTER
// ============================================================================

/// toncenter v2 HTTP API client
pub struct ToncenterResolver {
    http_client: reqwest::Client,
    mainnet_url: String,
    testnet_url: String,
    api_key: Option<String>,
}

impl ToncenterResolver {
    pub fn new(api_key: Option<String>, timeout: Duration) -> Result<Self, ResolveError> {
        Self::with_endpoints(TONCENTER_MAINNET, TONCENTER_TESTNET, api_key, timeout)
    }

    /// Client against custom endpoints (self-hosted API, local mock)
    pub fn with_endpoints(
        mainnet_url: impl Into<String>,
        testnet_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ResolveError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ResolveError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            mainnet_url: mainnet_url.into(),
            testnet_url: testnet_url.into(),
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    fn base_url(&self, network: TonNetwork) -> &str {
        match network {
            TonNetwork::Mainnet => &self.mainnet_url,
            TonNetwork::Testnet => &self.testnet_url,
        }
    }
}

#[async_trait]
impl PublicKeyResolver for ToncenterResolver {
    async fn resolve(
        &self,
        address: &str,
        network: TonNetwork,
    ) -> Result<[u8; PUBLIC_KEY_LEN], ResolveError> {
        let url = format!("{}/runGetMethod", self.base_url(network).trim_end_matches('/'));
        debug!("Resolving public key of {} via {}", address, url);

        let body = serde_json::json!({
            "address": address,
            "method": GET_PUBLIC_KEY,
            "stack": [],
        });

        let mut request = self.http_client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ResolveError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ResolveError::Transport(e.to_string()))?;

        // toncenter reports failed get-methods with a JSON body on non-2xx too
        match serde_json::from_str::<RunGetMethodResponse>(&text) {
            Ok(parsed) => parsed.into_public_key(address),
            Err(_) if !status.is_success() => {
                Err(ResolveError::Transport(format!("HTTP {}: {}", status, text)))
            }
            Err(e) => Err(ResolveError::Malformed(e.to_string())),
        }
    }
}

// ============================================================================
// RESPONSE PARSING
// ============================================================================

#[derive(Debug, Deserialize)]
struct RunGetMethodResponse {
    ok: bool,
    #[serde(default)]
    result: Option<RunGetMethodResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RunGetMethodResult {
    #[serde(default)]
    stack: Vec<Vec<serde_json::Value>>,
    exit_code: i32,
}

impl RunGetMethodResponse {
    fn into_public_key(self, address: &str) -> Result<[u8; PUBLIC_KEY_LEN], ResolveError> {
        if !self.ok {
            return Err(ResolveError::Transport(
                self.error.unwrap_or_else(|| "request not ok".to_string()),
            ));
        }
        let result = self
            .result
            .ok_or_else(|| ResolveError::Malformed("missing result".to_string()))?;

        // uninitialized accounts and contracts without the method exit non-zero
        if result.exit_code != 0 {
            debug!("get_public_key on {} exited with {}", address, result.exit_code);
            return Err(ResolveError::NotFound(address.to_string()));
        }

        let entry = result
            .stack
            .first()
            .ok_or_else(|| ResolveError::NotFound(address.to_string()))?;

        match (entry.first().and_then(|v| v.as_str()), entry.get(1).and_then(|v| v.as_str())) {
            (Some("num"), Some(value)) => parse_stack_number(value),
            _ => Err(ResolveError::Malformed(format!("unexpected stack entry: {:?}", entry))),
        }
    }
}

/// `0x`-prefixed big-endian integer, left-padded to 32 bytes
fn parse_stack_number(value: &str) -> Result<[u8; PUBLIC_KEY_LEN], ResolveError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| ResolveError::Malformed(format!("not a hex number: {}", value)))?;

    if digits.is_empty() || digits.len() > PUBLIC_KEY_LEN * 2 {
        return Err(ResolveError::Malformed(format!("key out of range: {}", value)));
    }

    let padded = format!("{:0>width$}", digits, width = PUBLIC_KEY_LEN * 2);
    let bytes = hex::decode(&padded).map_err(|e| ResolveError::Malformed(e.to_string()))?;

    let mut key = [0u8; PUBLIC_KEY_LEN];
    key.copy_from_slice(&bytes);
    Ok(key)
}
