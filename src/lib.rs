//! Event substrate for local-first KERI/ACDC verifiable credentials.
//!
//! Five cooperating components, leaves first: [`codec`] (CESR framing and
//! SAID computation), [`store`] (content-addressed persistence over a
//! [`capability::kv::Kv`] backend), [`kel`] (the Key Event Log engine),
//! [`tel`] (the Transaction Event Log / registry engine), and [`indexer`]
//! (query-time replay). [`builder`] aggregates all of these behind an
//! account/registry/schema/credential facade.

pub mod builder;
pub mod capability;
pub mod codec;
pub mod error;
pub mod event;
pub mod indexer;
pub mod kel;
pub mod store;
pub mod tel;

pub use error::Error;
