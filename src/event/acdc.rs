//! Authentic Chained Data Container: the credential object (§3) and its
//! edge graph.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::version::VersionString;
use crate::event::error::EventError;
use crate::event::{from_envelope_acdc, to_envelope_acdc};

/// A typed, directed link to another ACDC by SAID (glossary: Edge).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub n: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub s: Option<String>,
}

/// A credential (§3): `{v, d, i issuer, ri registry, s schemaSAID, a
/// attributes, e? edges}`. Edge labels are stored in lexicographic order —
/// the SAID only needs to be stable under this crate's own re-hash, not
/// byte-identical to another KERI implementation's canonicalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acdc {
    pub v: VersionString,
    pub d: String,
    pub i: String,
    pub ri: String,
    pub s: String,
    pub a: Value,
    pub e: Option<BTreeMap<String, Edge>>,
}

impl Acdc {
    /// The holder AID, read out of `a.i` (§3).
    pub fn holder(&self) -> Option<&str> {
        self.a.get("i").and_then(Value::as_str)
    }

    pub fn to_value(&self) -> Result<Value, EventError> {
        to_envelope_acdc(self)
    }

    pub fn from_value(value: &Value) -> Result<Self, EventError> {
        from_envelope_acdc(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::version::Family;
    use serde_json::json;

    #[test]
    fn holder_reads_subject_i() {
        let acdc = Acdc {
            v: VersionString::new(Family::Acdc, 0),
            d: "Ecred".to_string(),
            i: "Dissuer".to_string(),
            ri: "Eregistry".to_string(),
            s: "Eschema".to_string(),
            a: json!({"i": "Dholder", "name": "BS"}),
            e: None,
        };
        assert_eq!(acdc.holder(), Some("Dholder"));
    }

    #[test]
    fn roundtrips_with_edges() {
        let mut edges = BTreeMap::new();
        edges.insert(
            "parent".to_string(),
            Edge {
                n: "Eroot".to_string(),
                s: None,
            },
        );
        let acdc = Acdc {
            v: VersionString::new(Family::Acdc, 0),
            d: "Echild".to_string(),
            i: "Dissuer".to_string(),
            ri: "Eregistry".to_string(),
            s: "Eschema".to_string(),
            a: json!({"i": "Dholder"}),
            e: Some(edges),
        };
        let value = acdc.to_value().unwrap();
        let parsed = Acdc::from_value(&value).unwrap();
        assert_eq!(parsed, acdc);
    }
}
