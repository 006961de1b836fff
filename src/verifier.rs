//! # Proof verification pipeline
//!
//! Gates run in a fixed order and the first failing gate decides the outcome:
//!
//! 1. address parses                      -> `InvalidAddress`
//! 2. state-init present and decodable    -> `InvalidInitState`
//! 3. domain is allow-listed              -> `DomainNotAllowed`
//! 4. `now <= timestamp + payload_ttl`    -> `ProofExpired`
//! 5. key from registry or resolver equals the claimed key
//!                                        -> `PublicKeyMismatch` / `KeyUnresolvable`
//! 6. state-init derives to the address   -> `AddressMismatch`
//! 7. payload token was issued by us      -> `InvalidPayload` (placement configurable)
//! 8. Ed25519 signature over the message  -> `Valid` / `HashMismatch`
//!
//! A failed authentication is a [`VerificationOutcome`], never an error. Only
//! infrastructure trouble in the resolver fallback surfaces as [`ServiceError`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::address::{self, ParsedAddress};
use crate::config::{PayloadCheck, VerifierConfig};
use crate::message::ProofMessage;
use crate::payload::{unix_now, PayloadIssuer};
use crate::proof::{ProofRequest, TonNetwork};
use crate::resolver::{PublicKeyResolver, ResolveError};
use crate::state_init::{self, DecodedStateInit};
use crate::wallets::{KnownWalletCodeRegistry, RegistryError, PUBLIC_KEY_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    Valid,
    InvalidAddress,
    InvalidInitState,
    DomainNotAllowed,
    ProofExpired,
    PublicKeyMismatch,
    AddressMismatch,
    HashMismatch,
    /// The contract behind the address exposes no public key
    KeyUnresolvable,
    InvalidPayload,
}

impl VerificationOutcome {
    pub fn is_valid(self) -> bool {
        self == VerificationOutcome::Valid
    }

    pub fn as_str(self) -> &'static str {
        match self {
            VerificationOutcome::Valid => "valid",
            VerificationOutcome::InvalidAddress => "invalid_address",
            VerificationOutcome::InvalidInitState => "invalid_init_state",
            VerificationOutcome::DomainNotAllowed => "domain_not_allowed",
            VerificationOutcome::ProofExpired => "proof_expired",
            VerificationOutcome::PublicKeyMismatch => "public_key_mismatch",
            VerificationOutcome::AddressMismatch => "address_mismatch",
            VerificationOutcome::HashMismatch => "hash_mismatch",
            VerificationOutcome::KeyUnresolvable => "key_unresolvable",
            VerificationOutcome::InvalidPayload => "invalid_payload",
        }
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Public key lookup failed: {0}")]
    LookupFailed(String),

    #[error("Public key lookup timed out after {0:?}")]
    Timeout(Duration),
}

/// Early exit from the pipeline
#[derive(Debug)]
enum Rejection {
    Outcome(VerificationOutcome),
    Service(ServiceError),
}

impl From<VerificationOutcome> for Rejection {
    fn from(outcome: VerificationOutcome) -> Self {
        Rejection::Outcome(outcome)
    }
}

impl From<ServiceError> for Rejection {
    fn from(err: ServiceError) -> Self {
        Rejection::Service(err)
    }
}

type Gate<T> = Result<T, Rejection>;

// ============================================================================
// VERIFIER
// ============================================================================

/// Stateless across calls; share it behind an `Arc`
pub struct ProofVerifier {
    config: VerifierConfig,
    registry: KnownWalletCodeRegistry,
    resolver: Arc<dyn PublicKeyResolver>,
    payloads: Option<Arc<dyn PayloadIssuer>>,
}

impl ProofVerifier {
    pub fn new(config: VerifierConfig, resolver: Arc<dyn PublicKeyResolver>) -> Self {
        Self {
            config,
            registry: KnownWalletCodeRegistry::new(),
            resolver,
            payloads: None,
        }
    }

    /// Enable the payload gate with this issuer
    pub fn with_payload_issuer(mut self, issuer: Arc<dyn PayloadIssuer>) -> Self {
        self.payloads = Some(issuer);
        self
    }

    pub fn with_registry(mut self, registry: KnownWalletCodeRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub async fn verify(&self, request: &ProofRequest) -> Result<VerificationOutcome, ServiceError> {
        self.verify_at(request, unix_now()).await
    }

    /// Run the pipeline with `now` as the current unix time
    pub async fn verify_at(
        &self,
        request: &ProofRequest,
        now: u64,
    ) -> Result<VerificationOutcome, ServiceError> {
        match self.run(request, now).await {
            Ok(()) => {
                info!("✅ ton_proof valid for {}", request.address);
                Ok(VerificationOutcome::Valid)
            }
            Err(Rejection::Outcome(outcome)) => {
                info!("❌ ton_proof rejected for {}: {}", request.address, outcome);
                Ok(outcome)
            }
            Err(Rejection::Service(err)) => {
                warn!("⚠️ ton_proof check for {} aborted: {}", request.address, err);
                Err(err)
            }
        }
    }

    async fn run(&self, request: &ProofRequest, now: u64) -> Gate<()> {
        let proof = &request.proof;

        let address = address::parse(&request.address).map_err(|e| {
            debug!("Address {:?} rejected: {}", request.address, e);
            VerificationOutcome::InvalidAddress
        })?;

        let blob = proof
            .state_init
            .as_deref()
            .ok_or(VerificationOutcome::InvalidInitState)?;
        let decoded = state_init::decode(blob).map_err(|e| {
            debug!("State-init rejected: {}", e);
            VerificationOutcome::InvalidInitState
        })?;

        if !self.config.is_domain_allowed(&proof.domain.value) {
            debug!("Domain {:?} is not allow-listed", proof.domain.value);
            return Err(VerificationOutcome::DomainNotAllowed.into());
        }

        let expires_at = proof
            .timestamp
            .saturating_add(self.config.payload_ttl.as_secs());
        if now > expires_at {
            debug!("Proof from {} expired at {} (now {})", proof.timestamp, expires_at, now);
            return Err(VerificationOutcome::ProofExpired.into());
        }

        let key = self.resolve_key(&address, request.network, &decoded).await?;
        if !hex::encode(key).eq_ignore_ascii_case(request.public_key.trim()) {
            debug!("Claimed key {} does not control {}", request.public_key, address);
            return Err(VerificationOutcome::PublicKeyMismatch.into());
        }

        let derived = state_init::derive_address(&decoded.state_init, address.workchain)
            .map_err(|e| {
                debug!("State-init could not be re-encoded: {}", e);
                VerificationOutcome::AddressMismatch
            })?;
        if derived.to_raw() != address.to_raw() {
            debug!("State-init deploys to {}, not {}", derived, address);
            return Err(VerificationOutcome::AddressMismatch.into());
        }

        if self.config.payload_check == PayloadCheck::BeforeSignature {
            self.check_payload(&proof.payload).await?;
        }

        self.check_signature(request, &address, &key)?;

        if self.config.payload_check == PayloadCheck::AfterSignature {
            self.check_payload(&proof.payload).await?;
        }

        Ok(())
    }

    /// Registry first; the resolver only for code the registry does not know
    async fn resolve_key(
        &self,
        address: &ParsedAddress,
        network: TonNetwork,
        decoded: &DecodedStateInit,
    ) -> Gate<[u8; PUBLIC_KEY_LEN]> {
        if let (Some(fingerprint), Some(data)) = (&decoded.fingerprint, &decoded.state_init.data) {
            match self.registry.lookup(fingerprint, data) {
                Ok((template, key)) => {
                    debug!("Known wallet code {} for {}", template, address);
                    return Ok(key);
                }
                Err(RegistryError::UnknownCode) => {}
                Err(e @ RegistryError::MalformedData { .. }) => {
                    debug!("{}", e);
                    return Err(VerificationOutcome::InvalidInitState.into());
                }
            }
        }

        let raw = address.to_raw();
        info!("🔎 Unknown wallet code, asking {} network for the key of {}", network, raw);

        let timeout = self.config.resolver_timeout;
        match tokio::time::timeout(timeout, self.resolver.resolve(&raw, network)).await {
            Err(_) => Err(ServiceError::Timeout(timeout).into()),
            Ok(Ok(key)) => Ok(key),
            Ok(Err(ResolveError::NotFound(_))) => Err(VerificationOutcome::KeyUnresolvable.into()),
            Ok(Err(e)) => Err(ServiceError::LookupFailed(e.to_string()).into()),
        }
    }

    fn check_signature(
        &self,
        request: &ProofRequest,
        address: &ParsedAddress,
        key: &[u8; PUBLIC_KEY_LEN],
    ) -> Gate<()> {
        let proof = &request.proof;

        if !proof.domain.is_consistent() {
            debug!(
                "Domain length {} does not match {:?}",
                proof.domain.length_bytes, proof.domain.value
            );
            return Err(VerificationOutcome::HashMismatch.into());
        }

        let signature = STANDARD
            .decode(proof.signature.trim())
            .map_err(|_| VerificationOutcome::HashMismatch)?;

        let message = ProofMessage::new(address, &proof.domain.value, proof.timestamp, &proof.payload);
        if !message.verify(&signature, key) {
            return Err(VerificationOutcome::HashMismatch.into());
        }
        Ok(())
    }

    async fn check_payload(&self, payload: &str) -> Gate<()> {
        let Some(issuer) = &self.payloads else {
            return Ok(());
        };
        if !issuer.validate_token(payload).await {
            debug!("Payload token not issued here or expired");
            return Err(VerificationOutcome::InvalidPayload.into());
        }
        Ok(())
    }
}
