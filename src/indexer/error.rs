use thiserror::Error;

use crate::codec::Error as CodecError;
use crate::event::EventError;
use crate::store::Error as StoreError;

/// Indexer failure modes (§4.5, §7).
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} is not a registry")]
    NotARegistry(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
