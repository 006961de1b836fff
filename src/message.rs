//! TON Connect `ton_proof` message construction and signature check.
//!
//! ```text
//! message   = "ton-proof-item-v2/" || wc:i32be || hash[32]
//!             || domain_len:u32le || domain || timestamp:u64le || payload
//! signed    = 0xffff || "ton-connect" || sha256(message)
//! signature = ed25519(sha256(signed))
//! ```

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::address::ParsedAddress;

pub const TON_PROOF_PREFIX: &[u8] = b"ton-proof-item-v2/";
pub const TON_CONNECT_PREFIX: &[u8] = b"ton-connect";
pub const SIGNATURE_LEN: usize = 64;

/// The fields of a proof that the wallet signs
#[derive(Debug, Clone, Copy)]
pub struct ProofMessage<'a> {
    pub address: &'a ParsedAddress,
    pub domain: &'a str,
    pub timestamp: u64,
    pub payload: &'a str,
}

impl<'a> ProofMessage<'a> {
    pub fn new(address: &'a ParsedAddress, domain: &'a str, timestamp: u64, payload: &'a str) -> Self {
        Self {
            address,
            domain,
            timestamp,
            payload,
        }
    }

    /// The inner message, field order fixed
    pub fn message_bytes(&self) -> Vec<u8> {
        let domain = self.domain.as_bytes();
        let payload = self.payload.as_bytes();
        let mut bytes = Vec::with_capacity(
            TON_PROOF_PREFIX.len() + 4 + 32 + 4 + domain.len() + 8 + payload.len(),
        );

        bytes.extend_from_slice(TON_PROOF_PREFIX);
        bytes.extend_from_slice(&i32::from(self.address.workchain).to_be_bytes());
        bytes.extend_from_slice(&self.address.hash);
        bytes.extend_from_slice(&(domain.len() as u32).to_le_bytes());
        bytes.extend_from_slice(domain);
        bytes.extend_from_slice(&self.timestamp.to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    pub fn message_hash(&self) -> [u8; 32] {
        Sha256::digest(self.message_bytes()).into()
    }

    /// The buffer whose hash the wallet actually signs
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(2 + TON_CONNECT_PREFIX.len() + 32);
        bytes.extend_from_slice(&[0xff, 0xff]);
        bytes.extend_from_slice(TON_CONNECT_PREFIX);
        bytes.extend_from_slice(&self.message_hash());
        bytes
    }

    pub fn signing_hash(&self) -> [u8; 32] {
        Sha256::digest(self.signing_bytes()).into()
    }

    /// Sign as a wallet would (fixtures and client tooling)
    pub fn sign(&self, key: &SigningKey) -> [u8; SIGNATURE_LEN] {
        key.sign(&self.signing_hash()).to_bytes()
    }

    pub fn verify(&self, signature: &[u8], public_key: &[u8]) -> bool {
        verify_signature(&self.signing_hash(), signature, public_key)
    }
}

/// Ed25519 check; any malformed key or signature is simply `false`
pub fn verify_signature(message: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
    let Ok(key_bytes) = <[u8; 32]>::try_from(public_key) else {
        return false;
    };
    let Ok(sig_bytes) = <[u8; SIGNATURE_LEN]>::try_from(signature) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    let signature = Signature::from_bytes(&sig_bytes);
    verifying_key.verify(message, &signature).is_ok()
}
