use thiserror::Error;

use crate::{builder, codec, event, indexer, kel, store, tel};

/// Aggregate error type for the builder-facing surface.
///
/// Every public operation returns either a successful result or exactly one
/// of these variants — never a silent failure. Each nested error enum is
/// scoped to the component that raises it (structural/cryptographic errors
/// in [`codec::Error`], ordering/reference errors in [`store::Error`],
/// [`kel::Error`] and [`tel::Error`], policy errors in [`builder::Error`]).
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Codec(#[from] codec::Error),

    #[error(transparent)]
    Event(#[from] event::EventError),

    #[error(transparent)]
    Store(#[from] store::Error),

    #[error(transparent)]
    Kel(#[from] kel::Error),

    #[error(transparent)]
    Tel(#[from] tel::Error),

    #[error(transparent)]
    Indexer(#[from] indexer::Error),

    #[error(transparent)]
    Builder(#[from] builder::Error),
}
