//! # Known wallet-contract templates
//!
//! Standard wallet contracts keep the owner's Ed25519 key at a fixed bit
//! offset of their persistent data. When a proof's state-init carries one of
//! these exact code cells, the key is read straight out of the data cell and
//! no network lookup is needed.
//!
//! | Template | Data layout                                   | Key offset |
//! |----------|-----------------------------------------------|------------|
//! | v2 R2    | `seqno:uint32 public_key:bits256`             | 32         |
//! | v3 R1    | `seqno:uint32 subwallet:uint32 public_key:bits256` | 64    |
//! | v3 R2    | `seqno:uint32 subwallet:uint32 public_key:bits256` | 64    |

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::boc::{self, BocError, Cell, CellBuilder};
use crate::state_init::{Fingerprint, StateInit};

/// Width of an Ed25519 public key
pub const PUBLIC_KEY_LEN: usize = 32;

/// Default subwallet id used by wallet v3 on the basic workchain
pub const DEFAULT_SUBWALLET_ID: u32 = 698_983_191;

#[derive(Debug, Error)]
pub enum RegistryError {
    /// Not one of the built-in templates; the caller falls back to the network
    #[error("Unknown wallet code")]
    UnknownCode,

    #[error("Wallet data too short for {template}: {source}")]
    MalformedData {
        template: WalletTemplate,
        #[source]
        source: BocError,
    },
}

// ============================================================================
// TEMPLATES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum WalletTemplate {
    V2R2,
    V3R1,
    V3R2,
}

/// Where the public key sits inside a template's data cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyExtraction {
    pub skip_bits: usize,
    pub key_bits: usize,
}

impl WalletTemplate {
    pub const ALL: [WalletTemplate; 3] = [
        WalletTemplate::V2R2,
        WalletTemplate::V3R1,
        WalletTemplate::V3R2,
    ];

    pub fn name(self) -> &'static str {
        match self {
            WalletTemplate::V2R2 => "wallet_v2r2",
            WalletTemplate::V3R1 => "wallet_v3r1",
            WalletTemplate::V3R2 => "wallet_v3r2",
        }
    }

    /// Canonical serialized code cell, base64
    pub fn code_boc(self) -> &'static str {
        match self {
            WalletTemplate::V2R2 => "te6cckEBAQEAYwAAwv8AIN0gggFMl7ohggEznLqxnHGw7UTQ0x/XC//jBOCk8mCDCNcYINMf0x8B+CO78mPtRNDTH9P/0VExuvKhA/kBVBBC+RDyovgAApMg10qW0wfUAvsA6NGkyMsfy//J7VQETNeh",
            WalletTemplate::V3R1 => "te6cckEBAQEAYgAAwP8AIN0gggFMl7qXMO1E0NcLH+Ck8mCDCNcYINMf0x/TH/gjE7vyY+1E0NMf0x/T/9FRMrryoVFEuvKiBPkBVBBV+RDyo/gAkyDXSpbTB9QC+wDo0QGkyMsfyx/L/8ntVD++buA=",
            WalletTemplate::V3R2 => "te6cckEBAQEAcQAA3v8AIN0gggFMl7ohggEznLqxn3Gw7UTQ0x/THzHXC//jBOCk8mCDCNcYINMf0x/TH/gjE7vyY+1E0NMf0x/T/9FRMrryoVFEuvKiBPkBVBBV+RDyo/gAkyDXSpbTB9QC+wDo0QGkyMsfyx/L/8ntVBC9ba0=",
        }
    }

    pub fn key_extraction(self) -> KeyExtraction {
        let skip_bits = match self {
            WalletTemplate::V2R2 => 32,
            WalletTemplate::V3R1 | WalletTemplate::V3R2 => 64,
        };
        KeyExtraction {
            skip_bits,
            key_bits: PUBLIC_KEY_LEN * 8,
        }
    }

    pub fn code_cell(self) -> Result<Arc<Cell>, BocError> {
        boc::from_base64(self.code_boc())
    }

    /// Initial data cell for a fresh wallet owned by `public_key`
    pub fn initial_data(self, public_key: &[u8; PUBLIC_KEY_LEN], workchain: i8) -> Result<Cell, BocError> {
        let mut b = CellBuilder::new();
        b.store_uint(0, 32)?; // seqno
        if self.key_extraction().skip_bits == 64 {
            let subwallet = DEFAULT_SUBWALLET_ID.wrapping_add(workchain as i32 as u32);
            b.store_uint(u64::from(subwallet), 32)?;
        }
        b.store_bytes(public_key)?;
        b.build()
    }

    /// State-init that deploys a fresh wallet of this template
    pub fn state_init(self, public_key: &[u8; PUBLIC_KEY_LEN], workchain: i8) -> Result<StateInit, BocError> {
        Ok(StateInit {
            code: Some(self.code_cell()?),
            data: Some(Arc::new(self.initial_data(public_key, workchain)?)),
            ..Default::default()
        })
    }
}

impl std::fmt::Display for WalletTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

/// Exact-match table from code fingerprint to template
#[derive(Debug, Clone)]
pub struct KnownWalletCodeRegistry {
    templates: HashMap<Fingerprint, WalletTemplate>,
}

impl Default for KnownWalletCodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl KnownWalletCodeRegistry {
    /// Registry of all built-in templates
    pub fn new() -> Self {
        let templates = WalletTemplate::ALL
            .iter()
            .map(|t| (Fingerprint::from_boc(t.code_boc()), *t))
            .collect();
        Self { templates }
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn template_for(&self, fingerprint: &Fingerprint) -> Option<WalletTemplate> {
        self.templates.get(fingerprint).copied()
    }

    /// Read the owner's public key out of `data` for a known code fingerprint
    pub fn lookup(
        &self,
        fingerprint: &Fingerprint,
        data: &Cell,
    ) -> Result<(WalletTemplate, [u8; PUBLIC_KEY_LEN]), RegistryError> {
        let template = self
            .template_for(fingerprint)
            .ok_or(RegistryError::UnknownCode)?;
        let key = extract_key(template.key_extraction(), data)
            .map_err(|source| RegistryError::MalformedData { template, source })?;
        Ok((template, key))
    }
}

fn extract_key(rule: KeyExtraction, data: &Cell) -> Result<[u8; PUBLIC_KEY_LEN], BocError> {
    let mut s = data.parser();
    s.skip_bits(rule.skip_bits)?;
    s.load_array::<PUBLIC_KEY_LEN>()
}
