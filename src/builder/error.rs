use thiserror::Error;

use crate::codec::Error as CodecError;
use crate::event::EventError;
use crate::indexer::Error as IndexerError;
use crate::kel::Error as KelError;
use crate::store::Error as StoreError;
use crate::tel::Error as TelError;

/// Builder-surface failure modes (§6, §7): on top of the engine errors it
/// wraps, an unresolvable alias (account, registry, or contact) and an
/// unsupported cipher suite request (§7 Policy kind `UnsupportedSuite`).
#[derive(Error, Debug)]
pub enum Error {
    #[error("no account bound to alias {0:?}")]
    UnknownAccount(String),

    #[error("no registry bound to alias {0:?}")]
    UnknownRegistry(String),

    #[error("unsupported cipher suite {0:?}")]
    UnsupportedSuite(String),

    #[error("bundle entry {index} malformed: {reason}")]
    MalformedBundleEntry { index: usize, reason: String },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Kel(#[from] KelError),

    #[error(transparent)]
    Tel(#[from] TelError),

    #[error(transparent)]
    Indexer(#[from] IndexerError),
}
