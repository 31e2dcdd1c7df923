use thiserror::Error;

use crate::capability::crypto::KeyManagerError;
use crate::codec::Error as CodecError;
use crate::event::EventError;
use crate::kel::Error as KelError;
use crate::store::Error as StoreError;

/// TEL engine failure modes (§4.4, §7).
#[derive(Error, Debug)]
pub enum Error {
    #[error("credential {0} already has a `rev` event")]
    AlreadyRevoked(String),

    #[error("credential {0} has no prior `iss` event to revoke")]
    NotIssued(String),

    #[error("edge target {0} does not exist in the store")]
    EdgeTargetMissing(String),

    #[error("edge {label:?} requires schema {expected}, target has {actual}")]
    EdgeSchemaMismatch { label: String, expected: String, actual: String },

    #[error("registry {0} has no anchoring `ixn` seal in its issuer's KEL")]
    Unanchored(String),

    #[error(transparent)]
    KeyManager(#[from] KeyManagerError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Kel(#[from] KelError),
}
