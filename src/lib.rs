//! TON Connect `ton_proof` verification
//!
//! Confirms that a client controls the TON wallet address it claims, using
//! the signed `ton_proof` a wallet returns during connect.
//!
//! ## Architecture
//!
//! - **Cells**: bag-of-cells codec and representation hashes (`boc`)
//! - **Wallets**: state-init decoding, address derivation, known wallet code
//! - **Keys**: built-in wallet templates first, toncenter `get_public_key` as fallback
//! - **Auth**: Ed25519 over the TON Connect message, HMAC payload tokens

// Cell layer
pub mod boc;

// Chain types
pub mod address;
pub mod state_init;
pub mod wallets;

// Proof checking
pub mod message;
pub mod proof;
pub mod payload;
pub mod resolver;
pub mod verifier;

// Infrastructure
pub mod config;

// ============================================================================
// PUBLIC API
// ============================================================================

// Cells
pub use boc::{BocError, Cell, CellBuilder, CellSlice};

// Addresses and state-init
pub use address::{AddressError, ParsedAddress};
pub use state_init::{derive_address, DecodedStateInit, Fingerprint, StateInit, StateInitError};
pub use wallets::{KnownWalletCodeRegistry, RegistryError, WalletTemplate};

// Verification
pub use message::{verify_signature, ProofMessage};
pub use proof::{ProofRequest, TonDomain, TonNetwork, TonProof};
pub use payload::{HmacPayloadIssuer, PayloadError, PayloadIssuer};
pub use resolver::{PublicKeyResolver, ResolveError, ToncenterResolver};
pub use verifier::{ProofVerifier, ServiceError, VerificationOutcome};

// Configuration
pub use config::{ConfigError, PayloadCheck, ServiceSettings, VerifierConfig};
