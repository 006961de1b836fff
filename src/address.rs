//! Raw wallet addresses: `<workchain>:<64 hex chars>`.
//!
//! Comparison always happens on the raw form produced by [`compose`]; the
//! user-friendly (bounceable / url-safe) encodings are never compared.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Width of an account id on the basic and master workchains
pub const ADDRESS_HASH_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("Address has no workchain separator")]
    MissingSeparator,

    #[error("Invalid workchain id: {0}")]
    InvalidWorkchain(String),

    #[error("Invalid account hash: {0}")]
    InvalidHash(String),
}

/// A parsed raw address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParsedAddress {
    pub workchain: i8,
    pub hash: [u8; ADDRESS_HASH_LEN],
}

impl ParsedAddress {
    pub fn new(workchain: i8, hash: [u8; ADDRESS_HASH_LEN]) -> Self {
        Self { workchain, hash }
    }

    /// Canonical raw form of this address
    pub fn to_raw(&self) -> String {
        compose(self.workchain, &self.hash)
    }
}

impl fmt::Display for ParsedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_raw())
    }
}

impl FromStr for ParsedAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

/// Parse `<signed decimal workchain>:<hex hash>`.
///
/// The split happens at the first colon. The workchain must fit in an `i8`
/// and the hash must decode to exactly 32 bytes.
pub fn parse(address: &str) -> Result<ParsedAddress, AddressError> {
    let (wc, hash_hex) = address
        .split_once(':')
        .ok_or(AddressError::MissingSeparator)?;

    // i8::from_str accepts a leading '+', which is not a raw address
    if wc.is_empty() || wc.starts_with('+') {
        return Err(AddressError::InvalidWorkchain(wc.to_string()));
    }
    let workchain = wc
        .parse::<i8>()
        .map_err(|_| AddressError::InvalidWorkchain(wc.to_string()))?;

    let bytes = hex::decode(hash_hex).map_err(|e| AddressError::InvalidHash(e.to_string()))?;
    let hash: [u8; ADDRESS_HASH_LEN] = bytes.try_into().map_err(|b: Vec<u8>| {
        AddressError::InvalidHash(format!("expected {} bytes, got {}", ADDRESS_HASH_LEN, b.len()))
    })?;

    Ok(ParsedAddress { workchain, hash })
}

/// Build the canonical raw form `{workchain}:{lowercase hex hash}`
pub fn compose(workchain: i8, hash: &[u8]) -> String {
    format!("{}:{}", workchain, hex::encode(hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "61bdf322e357500f6ca7e60a7f5ba38c86404341662b0013933914adf25e338a";

    #[test]
    fn test_parse_basechain_and_masterchain() {
        let a = parse(&format!("0:{}", HASH)).unwrap();
        assert_eq!(a.workchain, 0);
        assert_eq!(hex::encode(a.hash), HASH);

        let m = parse(&format!("-1:{}", HASH)).unwrap();
        assert_eq!(m.workchain, -1);
    }

    #[test]
    fn test_compose_is_lowercase_canonical() {
        let upper = parse(&format!("0:{}", HASH.to_uppercase())).unwrap();
        assert_eq!(upper.to_raw(), format!("0:{}", HASH));
        assert_eq!(compose(-1, &upper.hash), format!("-1:{}", HASH));
    }

    #[test]
    fn test_rejects_malformed_addresses() {
        let bad = [
            String::new(),
            HASH.to_string(),
            format!(":{}", HASH),
            format!("+0:{}", HASH),
            format!("x:{}", HASH),
            format!("300:{}", HASH),
            format!("0:{}", &HASH[..62]),
            format!("0:{}00", HASH),
            format!("0:{}", HASH.replace('a', "g")),
            // user-friendly form is not accepted here
            "EQBhvfMi41dQD2yn5gp_W6OMhkBDQWYrABOTORSt8l4zihAA".to_string(),
        ];
        for address in bad {
            assert!(parse(&address).is_err(), "should reject {:?}", address);
        }
    }

    #[test]
    fn test_from_str_round_trip() {
        let raw = format!("0:{}", HASH);
        let parsed: ParsedAddress = raw.parse().unwrap();
        assert_eq!(parsed.to_string(), raw);
    }
}
