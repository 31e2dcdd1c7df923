//! The `Kv` capability (§6): a minimal, byte-clean, transactionless
//! key-value store. The core assumes nothing stronger than single-key
//! atomicity from whatever backs it (§5).

use std::collections::BTreeMap;
use std::sync::RwLock;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KvError {
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Capability consumed from an external collaborator (§6).
///
/// Keys and values are arbitrary bytes; no transactions are required.
/// Implementations MUST make a single `put`/`del` visible to a subsequent
/// `get`/`list` on the same handle.
pub trait Kv: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError>;
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError>;
    fn del(&self, key: &[u8]) -> Result<(), KvError>;
    /// Returns every stored key with the given prefix, in ascending order.
    fn list(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, KvError>;
}

/// In-memory `Kv` adapter, `BTreeMap`-backed so `list` returns keys in
/// lexicographic (and therefore numeric, for zero-padded `sn` segments)
/// order without an extra sort. Used for tests and for embedding the
/// core without a durable backend.
#[derive(Default)]
pub struct MemoryKv {
    inner: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Kv for MemoryKv {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        let map = self
            .inner
            .read()
            .map_err(|_| KvError::Backend("poisoned lock".into()))?;
        Ok(map.get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| KvError::Backend("poisoned lock".into()))?;
        map.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn del(&self, key: &[u8]) -> Result<(), KvError> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| KvError::Backend("poisoned lock".into()))?;
        map.remove(key);
        Ok(())
    }

    fn list(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, KvError> {
        let map = self
            .inner
            .read()
            .map_err(|_| KvError::Backend("poisoned lock".into()))?;
        Ok(map
            .range(prefix.to_vec()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

/// `sled`-backed `Kv` adapter, the same storage engine the teacher uses
/// under `database::sled`. A single tree (`"kv"`) holds every logical
/// table the [`crate::store::Store`] defines; table separation lives in
/// the byte-safe key paths, not in separate trees, since the `Kv`
/// contract in §6 exposes only one flat namespace.
#[cfg(feature = "sled-db")]
pub struct SledKv {
    tree: sled::Tree,
    db: sled::Db,
}

#[cfg(feature = "sled-db")]
impl SledKv {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, KvError> {
        let db = sled::open(path).map_err(|e| KvError::Backend(e.to_string()))?;
        let tree = db
            .open_tree(b"kv")
            .map_err(|e| KvError::Backend(e.to_string()))?;
        Ok(Self { tree, db })
    }

    pub fn flush(&self) -> Result<(), KvError> {
        self.db
            .flush()
            .map(|_| ())
            .map_err(|e| KvError::Backend(e.to_string()))
    }
}

#[cfg(feature = "sled-db")]
impl Kv for SledKv {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KvError> {
        self.tree
            .get(key)
            .map(|opt| opt.map(|v| v.to_vec()))
            .map_err(|e| KvError::Backend(e.to_string()))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KvError> {
        self.tree
            .insert(key, value)
            .map_err(|e| KvError::Backend(e.to_string()))?;
        self.flush()
    }

    fn del(&self, key: &[u8]) -> Result<(), KvError> {
        self.tree
            .remove(key)
            .map_err(|e| KvError::Backend(e.to_string()))?;
        self.flush()
    }

    fn list(&self, prefix: &[u8]) -> Result<Vec<Vec<u8>>, KvError> {
        self.tree
            .scan_prefix(prefix)
            .keys()
            .map(|r| r.map(|k| k.to_vec()).map_err(|e| KvError::Backend(e.to_string())))
            .collect()
    }
}
