//! Wire shape of a `ton_proof` check request.
//!
//! ```json
//! {
//!   "address": "0:f63660ff947e5fe6ed4a8f729f1b24ef859497d0483aaa9d9ae48414297c4e1b",
//!   "network": "-239",
//!   "public_key": "b3a5...",
//!   "proof": {
//!     "timestamp": 1668094767,
//!     "domain": { "lengthBytes": 21, "value": "ton-connect.github.io" },
//!     "signature": "28tWSg8RDB3P/iIYupySINq1o3F5xLodndzNFHOtdi16Z+MuII8LAPnHLT3E6WTB27//qY4psU5Rf5/aJaIIAA==",
//!     "payload": "E5B4ARS6CdOI2b5e1jz0jnS-x-a3DgfNXprrg_3pec0=",
//!     "state_init": "te6cck..."
//!   }
//! }
//! ```
//!
//! Everything here is untrusted input.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TonNetwork {
    #[serde(rename = "-239")]
    Mainnet,
    #[serde(rename = "-3")]
    Testnet,
}

impl TonNetwork {
    pub fn chain_id(self) -> &'static str {
        match self {
            TonNetwork::Mainnet => "-239",
            TonNetwork::Testnet => "-3",
        }
    }
}

impl fmt::Display for TonNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.chain_id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TonDomain {
    /// Byte length the wallet claims for `value`
    #[serde(rename = "lengthBytes", alias = "LengthBytes")]
    pub length_bytes: u32,
    pub value: String,
}

impl TonDomain {
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            length_bytes: value.len() as u32,
            value,
        }
    }

    /// Claimed length equals the UTF-8 byte length of the value
    pub fn is_consistent(&self) -> bool {
        self.value.len() == self.length_bytes as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TonProof {
    pub timestamp: u64,
    pub domain: TonDomain,
    /// Opaque token previously handed out by the payload issuer
    pub payload: String,
    /// Base64 Ed25519 signature
    pub signature: String,
    /// Base64 bag of cells
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_init: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofRequest {
    pub address: String,
    pub network: TonNetwork,
    /// Hex public key the client claims controls `address`
    pub public_key: String,
    pub proof: TonProof,
}
