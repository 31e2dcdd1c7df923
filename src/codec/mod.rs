//! The CESR codec (§4.1): version strings, derivation-coded prefixes, the
//! SAID algorithm, and frame encode/decode/signing.

pub mod error;
pub mod frame;
pub mod prefix;
pub mod said;
pub mod version;

pub use error::Error;
pub use frame::{
    attached_signatures, decode, encode, encode_saidified, parse_indexed_signatures, scan_frames,
    sign_event, DecodedFrame,
};
pub use prefix::{
    AttachedSignaturePrefix, BasicPrefix, DigestAlgorithm, IdentifierPrefix, Prefix, PrefixError,
    SelfAddressingPrefix, SelfSigningPrefix,
};
pub use said::{compute_said, compute_said_multi, saidify, saidify_multi, verify_said, verify_said_multi};
pub use version::{Family, VersionString};
