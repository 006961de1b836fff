//! # Proof payload tokens
//!
//! Before asking a wallet for a proof, the service hands out an opaque
//! payload. The wallet signs it back inside the proof, and the verifier checks
//! that the token is one this service issued and that it has not expired.
//!
//! ```text
//! token = hex( nonce[8] || expires_at:u64be || hmac_sha256(secret, nonce || expires_at) )
//! ```
//!
//! Tokens are stateless: nothing is stored server-side, so a token can be
//! replayed until it expires. Single-use enforcement belongs to the caller.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 8;
const EXPIRY_LEN: usize = 8;
const MAC_LEN: usize = 32;
const BODY_LEN: usize = NONCE_LEN + EXPIRY_LEN;
pub const TOKEN_BYTES: usize = BODY_LEN + MAC_LEN;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Payload secret must not be empty")]
    EmptySecret,

    #[error("Invalid payload key: {0}")]
    InvalidKey(String),

    #[error("Payload TTL out of range: {0:?}")]
    InvalidTtl(Duration),
}

/// Issues and checks the opaque payload a wallet signs into its proof
#[async_trait]
pub trait PayloadIssuer: Send + Sync {
    async fn create_payload_token(&self, ttl: Duration) -> Result<String, PayloadError>;

    /// `true` only for an unexpired token this issuer produced
    async fn validate_token(&self, token: &str) -> bool;
}

/// Stateless HMAC-SHA256 token issuer
pub struct HmacPayloadIssuer {
    secret: Vec<u8>,
}

impl std::fmt::Debug for HmacPayloadIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacPayloadIssuer")
            .field("secret", &"<redacted>")
            .finish()
    }
}

impl HmacPayloadIssuer {
    pub fn new(secret: impl Into<Vec<u8>>) -> Result<Self, PayloadError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(PayloadError::EmptySecret);
        }
        Ok(Self { secret })
    }

    fn mac(&self) -> Result<HmacSha256, PayloadError> {
        HmacSha256::new_from_slice(&self.secret).map_err(|e| PayloadError::InvalidKey(e.to_string()))
    }

    /// Token that expires at the given unix second
    pub fn token_expiring_at(&self, expires_at: u64) -> Result<String, PayloadError> {
        let mut body = [0u8; BODY_LEN];
        OsRng.fill_bytes(&mut body[..NONCE_LEN]);
        body[NONCE_LEN..].copy_from_slice(&expires_at.to_be_bytes());

        let mut mac = self.mac()?;
        mac.update(&body);
        let tag = mac.finalize().into_bytes();

        let mut token = Vec::with_capacity(TOKEN_BYTES);
        token.extend_from_slice(&body);
        token.extend_from_slice(&tag);
        Ok(hex::encode(token))
    }

    /// Check a token against an explicit clock
    pub fn check_token_at(&self, token: &str, now: u64) -> bool {
        let Ok(bytes) = hex::decode(token) else {
            return false;
        };
        if bytes.len() != TOKEN_BYTES {
            return false;
        }

        let (body, tag) = bytes.split_at(BODY_LEN);
        let Ok(mut mac) = self.mac() else {
            return false;
        };
        mac.update(body);
        if mac.verify_slice(tag).is_err() {
            return false;
        }

        let mut expiry = [0u8; EXPIRY_LEN];
        expiry.copy_from_slice(&body[NONCE_LEN..]);
        now <= u64::from_be_bytes(expiry)
    }
}

#[async_trait]
impl PayloadIssuer for HmacPayloadIssuer {
    async fn create_payload_token(&self, ttl: Duration) -> Result<String, PayloadError> {
        let expires_at = unix_now()
            .checked_add(ttl.as_secs())
            .ok_or(PayloadError::InvalidTtl(ttl))?;
        self.token_expiring_at(expires_at)
    }

    async fn validate_token(&self, token: &str) -> bool {
        self.check_token_at(token, unix_now())
    }
}

/// Seconds since the unix epoch; a clock before 1970 reads as zero
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
