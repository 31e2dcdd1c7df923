//! External capabilities the core consumes but does not own.
//!
//! `Kv` is the persistent key-value backend (§6); `Crypto` is the signature
//! and digest suite (§6). Both are small, blocking traits — the engines
//! suspend only at these boundaries (§5) and the crate takes on no async
//! runtime to cross them, matching the teacher's own non-`async`-feature
//! default build.

pub mod crypto;
pub mod kv;

pub use crypto::{Crypto, Ed25519Blake3, KeyManager, KeyRing};
pub use kv::{Kv, MemoryKv};

#[cfg(feature = "sled-db")]
pub use kv::SledKv;
