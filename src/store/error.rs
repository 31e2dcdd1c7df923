use thiserror::Error;

use crate::capability::kv::KvError;
use crate::codec::Error as CodecError;
use crate::event::EventError;

/// Ordering, reference, and backend failure modes of the store (§7).
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Kv(#[from] KvError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error("event {said} already stored with different content")]
    SaidConflict { said: String },

    #[error("no event stored under {0}")]
    NotFound(String),

    #[error("alias {alias:?} already bound in namespace {namespace:?}")]
    AliasConflict { namespace: String, alias: String },

    #[error("no alias {alias:?} bound in namespace {namespace:?}")]
    AliasNotFound { namespace: String, alias: String },

    #[error("schema uses the legacy `d`-labeled SAID convention instead of `$id`")]
    SchemaConflict,
}
