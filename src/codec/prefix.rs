//! Primitive identifiers (§3): base64url-alphabet strings, each tagged with
//! a derivation code that names the suite/algorithm that produced it.
//!
//! The text encoding follows the teacher's own CESR convention: raw bytes
//! are left-padded with as many zero bytes as the code is characters long,
//! base64url-encoded, and then that many leading characters are dropped and
//! replaced by the code itself — so `code.len() + encoded.len()` stays a
//! multiple of 4 without ever emitting `=` padding.

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum PrefixError {
    #[error("unknown derivation code in {0:?}")]
    UnknownCode(String),
    #[error("prefix {0:?} has incorrect length for its code")]
    IncorrectLength(String),
    #[error("invalid base64url text")]
    InvalidText,
    #[error("wrong signature suite for this key")]
    WrongSuite,
}

fn from_text_to_bytes(text: &[u8]) -> Result<Vec<u8>, PrefixError> {
    let lead = (4 - (text.len() % 4)) % 4;
    let padded = ["A".repeat(lead).as_bytes(), text].concat();
    base64::decode_config(padded, base64::URL_SAFE).map_err(|_| PrefixError::InvalidText)
}

fn from_bytes_to_text(bytes: &[u8]) -> String {
    let lead = (3 - (bytes.len() % 3)) % 3;
    let padded: Vec<u8> = std::iter::repeat(0u8).take(lead).chain(bytes.iter().copied()).collect();
    base64::encode_config(padded, base64::URL_SAFE)
}

/// Shared serialization for every prefix kind: `code + (base64url data with
/// the leading `code.len()` characters dropped)`.
pub trait Prefix: Sized {
    fn derivative(&self) -> Vec<u8>;
    fn derivation_code(&self) -> &'static str;
    fn full_size(&self) -> usize;

    fn to_text(&self) -> String {
        let data = self.derivative();
        if data.is_empty() {
            return String::new();
        }
        let code = self.derivation_code();
        let text = from_bytes_to_text(&data);
        [code, &text[code.len()..]].concat()
    }
}

/// Digest family behind a SAID (§4.1). `Blake3_256` is the default (§6);
/// the others are carried so the codec's family-prefix-encoding is
/// actually exercised by more than one suite, matching how the teacher's
/// `SelfAddressing` enum offers a family of interchangeable digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestAlgorithm {
    Blake3_256,
    Sha2_256,
    Sha3_256,
}

impl DigestAlgorithm {
    pub fn code(&self) -> &'static str {
        match self {
            DigestAlgorithm::Blake3_256 => "E",
            DigestAlgorithm::Sha2_256 => "I",
            DigestAlgorithm::Sha3_256 => "H",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "E" => Some(DigestAlgorithm::Blake3_256),
            "I" => Some(DigestAlgorithm::Sha2_256),
            "H" => Some(DigestAlgorithm::Sha3_256),
            _ => None,
        }
    }

    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Blake3_256 => blake3::hash(data).as_bytes().to_vec(),
            DigestAlgorithm::Sha2_256 => {
                use sha2::{Digest, Sha256};
                Sha256::digest(data).to_vec()
            }
            DigestAlgorithm::Sha3_256 => {
                use sha3::{Digest, Sha3_256};
                Sha3_256::digest(data).to_vec()
            }
        }
    }
}

/// Non-transferable/verifier-derived public key prefix. `D…` (§6): one
/// code char plus 43 base64url chars for a 256-bit key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BasicPrefix {
    Ed25519(Vec<u8>),
}

impl Prefix for BasicPrefix {
    fn derivative(&self) -> Vec<u8> {
        match self {
            BasicPrefix::Ed25519(k) => k.clone(),
        }
    }
    fn derivation_code(&self) -> &'static str {
        "D"
    }
    fn full_size(&self) -> usize {
        44
    }
}

impl FromStr for BasicPrefix {
    type Err = PrefixError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.starts_with('D') {
            return Err(PrefixError::UnknownCode(s.to_string()));
        }
        if s.len() != 44 {
            return Err(PrefixError::IncorrectLength(s.to_string()));
        }
        let decoded = from_text_to_bytes(s.as_bytes())?[1..].to_vec();
        Ok(BasicPrefix::Ed25519(decoded))
    }
}

/// Self-Addressing IDentifier prefix (§3, §4.1): a content digest, always
/// `E…`-tagged for the default Blake3-256 family (or the matching letter
/// for an alternate digest family).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SelfAddressingPrefix {
    pub algorithm: DigestAlgorithm,
    pub digest: Vec<u8>,
}

impl SelfAddressingPrefix {
    pub fn new(algorithm: DigestAlgorithm, digest: Vec<u8>) -> Self {
        Self { algorithm, digest }
    }

    pub fn derive(algorithm: DigestAlgorithm, data: &[u8]) -> Self {
        Self {
            algorithm,
            digest: algorithm.digest(data),
        }
    }

    pub fn verify_binding(&self, data: &[u8]) -> bool {
        self.algorithm.digest(data) == self.digest
    }
}

impl Prefix for SelfAddressingPrefix {
    fn derivative(&self) -> Vec<u8> {
        self.digest.clone()
    }
    fn derivation_code(&self) -> &'static str {
        self.algorithm.code()
    }
    fn full_size(&self) -> usize {
        44
    }
}

impl FromStr for SelfAddressingPrefix {
    type Err = PrefixError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 44 {
            return Err(PrefixError::IncorrectLength(s.to_string()));
        }
        let code = &s[..1];
        let algorithm =
            DigestAlgorithm::from_code(code).ok_or_else(|| PrefixError::UnknownCode(s.to_string()))?;
        let decoded = from_text_to_bytes(s.as_bytes())?[1..].to_vec();
        Ok(SelfAddressingPrefix::new(algorithm, decoded))
    }
}

/// Signature suite prefix (§3). `0B…` for an Ed25519 signature, 88 chars
/// total with the code (§6).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SelfSigningPrefix {
    Ed25519Sha512(Vec<u8>),
}

impl Prefix for SelfSigningPrefix {
    fn derivative(&self) -> Vec<u8> {
        match self {
            SelfSigningPrefix::Ed25519Sha512(s) => s.clone(),
        }
    }
    fn derivation_code(&self) -> &'static str {
        "0B"
    }
    fn full_size(&self) -> usize {
        88
    }
}

impl FromStr for SelfSigningPrefix {
    type Err = PrefixError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !s.starts_with("0B") {
            return Err(PrefixError::UnknownCode(s.to_string()));
        }
        if s.len() != 88 {
            return Err(PrefixError::IncorrectLength(s.to_string()));
        }
        let decoded = from_text_to_bytes(s.as_bytes())?[2..].to_vec();
        Ok(SelfSigningPrefix::Ed25519Sha512(decoded))
    }
}

/// An AID (§3): either verifier-derived (`D…`, non-transferable) or
/// event-derived/self-addressing (`E…`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentifierPrefix {
    Basic(BasicPrefix),
    SelfAddressing(SelfAddressingPrefix),
}

impl Prefix for IdentifierPrefix {
    fn derivative(&self) -> Vec<u8> {
        match self {
            IdentifierPrefix::Basic(b) => b.derivative(),
            IdentifierPrefix::SelfAddressing(s) => s.derivative(),
        }
    }
    fn derivation_code(&self) -> &'static str {
        match self {
            IdentifierPrefix::Basic(b) => b.derivation_code(),
            IdentifierPrefix::SelfAddressing(s) => s.derivation_code(),
        }
    }
    fn full_size(&self) -> usize {
        44
    }
}

impl Display for IdentifierPrefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

impl FromStr for IdentifierPrefix {
    type Err = PrefixError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with('D') {
            Ok(IdentifierPrefix::Basic(BasicPrefix::from_str(s)?))
        } else {
            Ok(IdentifierPrefix::SelfAddressing(SelfAddressingPrefix::from_str(s)?))
        }
    }
}

impl Serialize for IdentifierPrefix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_text())
    }
}

impl<'de> Deserialize<'de> for IdentifierPrefix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        IdentifierPrefix::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// An indexed signature attachment (§4.1): a signing-key index plus the
/// signature itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedSignaturePrefix {
    pub index: u16,
    pub signature: SelfSigningPrefix,
}

impl AttachedSignaturePrefix {
    pub fn new(index: u16, signature: SelfSigningPrefix) -> Self {
        Self { index, signature }
    }
}

impl Serialize for SelfAddressingPrefix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_text())
    }
}

impl<'de> Deserialize<'de> for SelfAddressingPrefix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        SelfAddressingPrefix::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl Serialize for BasicPrefix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_text())
    }
}

impl<'de> Deserialize<'de> for BasicPrefix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        BasicPrefix::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_prefix_roundtrip() {
        let bp = BasicPrefix::Ed25519(vec![0u8; 32]);
        let text = bp.to_text();
        assert_eq!(text.len(), 44);
        assert!(text.starts_with('D'));
        assert_eq!(BasicPrefix::from_str(&text).unwrap(), bp);
    }

    #[test]
    fn self_addressing_roundtrip() {
        let sap = SelfAddressingPrefix::derive(DigestAlgorithm::Blake3_256, b"hello there");
        let text = sap.to_text();
        assert_eq!(text.len(), 44);
        assert!(text.starts_with('E'));
        assert_eq!(SelfAddressingPrefix::from_str(&text).unwrap(), sap);
        assert!(sap.verify_binding(b"hello there"));
        assert!(!sap.verify_binding(b"goodbye"));
    }

    #[test]
    fn self_signing_roundtrip() {
        let ssp = SelfSigningPrefix::Ed25519Sha512(vec![0u8; 64]);
        let text = ssp.to_text();
        assert_eq!(text.len(), 88);
        assert!(text.starts_with("0B"));
        assert_eq!(SelfSigningPrefix::from_str(&text).unwrap(), ssp);
    }

    #[test]
    fn identifier_prefix_dispatches_on_code() {
        let d: IdentifierPrefix = ["D".to_string(), "A".repeat(43)].concat().parse().unwrap();
        assert!(matches!(d, IdentifierPrefix::Basic(_)));
        let e: IdentifierPrefix = ["E".to_string(), "A".repeat(43)].concat().parse().unwrap();
        assert!(matches!(e, IdentifierPrefix::SelfAddressing(_)));
    }
}
