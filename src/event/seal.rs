use serde::{Deserialize, Serialize};

/// An anchor seal (§3, glossary): a reference tuple placed in an `ixn`'s
/// `a[]` to commit a KEL to off-KEL content, such as a registry's `vcp` or
/// a TEL event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seal {
    pub i: String,
    pub s: String,
    pub d: String,
}

impl Seal {
    pub fn new(i: impl Into<String>, s: impl Into<String>, d: impl Into<String>) -> Self {
        Self {
            i: i.into(),
            s: s.into(),
            d: d.into(),
        }
    }
}

/// `e.parent` on a sub-registry's `vcp` (§4.4): the parent registry's ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentSeal {
    pub n: String,
}
