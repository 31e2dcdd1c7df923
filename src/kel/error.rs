use thiserror::Error;

use crate::capability::crypto::KeyManagerError;
use crate::codec::Error as CodecError;
use crate::event::EventError;
use crate::store::Error as StoreError;

/// KEL engine failure modes (§4.3, §7).
#[derive(Error, Debug)]
pub enum Error {
    #[error("event `p` is {actual:?}, expected prior SAID {expected:?}")]
    PriorMismatch { expected: String, actual: String },

    #[error("event `s` is {actual}, expected {expected}")]
    SequenceGap { expected: u64, actual: u64 },

    #[error("rotation key does not match any prior next-key digest")]
    PreRotationMismatch,

    #[error("signature does not verify against the signing key it claims")]
    SignatureInvalid,

    #[error("signing threshold {required} not met ({got} valid signatures)")]
    ThresholdUnmet { required: usize, got: usize },

    #[error("KEL for {0} already has an inception event")]
    AlreadyIncepted(String),

    #[error("no inception event found for {0}")]
    NotIncepted(String),

    #[error(transparent)]
    KeyManager(#[from] KeyManagerError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
