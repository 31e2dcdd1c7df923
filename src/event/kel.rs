//! Key Event Log event bodies (§3 KEL table, §9 tagged-variant design note).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::version::VersionString;
use crate::event::error::EventError;
use crate::event::seal::Seal;
use crate::event::{from_envelope, to_envelope};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IcpData {
    pub i: String,
    pub s: String,
    pub kt: String,
    pub k: Vec<String>,
    pub nt: String,
    pub n: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotData {
    pub i: String,
    pub s: String,
    pub p: String,
    pub kt: String,
    pub k: Vec<String>,
    pub nt: String,
    pub n: Vec<String>,
    pub a: Vec<Seal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IxnData {
    pub i: String,
    pub s: String,
    pub p: String,
    pub a: Vec<Seal>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KelEventData {
    Icp(IcpData),
    Rot(RotData),
    Ixn(IxnData),
}

impl KelEventData {
    pub fn type_tag(&self) -> &'static str {
        match self {
            KelEventData::Icp(_) => "icp",
            KelEventData::Rot(_) => "rot",
            KelEventData::Ixn(_) => "ixn",
        }
    }

    pub fn identifier(&self) -> &str {
        match self {
            KelEventData::Icp(d) => &d.i,
            KelEventData::Rot(d) => &d.i,
            KelEventData::Ixn(d) => &d.i,
        }
    }

    pub fn sequence(&self) -> &str {
        match self {
            KelEventData::Icp(d) => &d.s,
            KelEventData::Rot(d) => &d.s,
            KelEventData::Ixn(d) => &d.s,
        }
    }

    pub fn prior(&self) -> Option<&str> {
        match self {
            KelEventData::Icp(_) => None,
            KelEventData::Rot(d) => Some(&d.p),
            KelEventData::Ixn(d) => Some(&d.p),
        }
    }

    pub fn seals(&self) -> &[Seal] {
        match self {
            KelEventData::Icp(_) => &[],
            KelEventData::Rot(d) => &d.a,
            KelEventData::Ixn(d) => &d.a,
        }
    }
}

/// A KEL event (§3): version string, type tag, SAID, and the type-specific
/// body. `v`/`t`/`d` always occupy the first three JSON keys, matching
/// every real-world KERI event this crate has seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KelEvent {
    pub v: VersionString,
    pub d: String,
    pub data: KelEventData,
}

impl KelEvent {
    pub fn to_value(&self) -> Result<Value, EventError> {
        match &self.data {
            KelEventData::Icp(d) => to_envelope(&self.v, "icp", &self.d, d),
            KelEventData::Rot(d) => to_envelope(&self.v, "rot", &self.d, d),
            KelEventData::Ixn(d) => to_envelope(&self.v, "ixn", &self.d, d),
        }
    }

    pub fn from_value(value: &Value) -> Result<Self, EventError> {
        let (v, t, d) = from_envelope(value)?;
        let data = match t.as_str() {
            "icp" => KelEventData::Icp(
                serde_json::from_value(value.clone()).map_err(|e| EventError::BadField(e.to_string()))?,
            ),
            "rot" => KelEventData::Rot(
                serde_json::from_value(value.clone()).map_err(|e| EventError::BadField(e.to_string()))?,
            ),
            "ixn" => KelEventData::Ixn(
                serde_json::from_value(value.clone()).map_err(|e| EventError::BadField(e.to_string()))?,
            ),
            other => return Err(EventError::UnknownType(other.to_string())),
        };
        Ok(KelEvent { v, d, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::version::Family;

    #[test]
    fn icp_roundtrips_through_value() {
        let event = KelEvent {
            v: VersionString::new(Family::Keri, 0),
            d: "Eplaceholder".to_string(),
            data: KelEventData::Icp(IcpData {
                i: "Dsomething".to_string(),
                s: "0".to_string(),
                kt: "1".to_string(),
                k: vec!["Dkey".to_string()],
                nt: "1".to_string(),
                n: vec!["Enext".to_string()],
            }),
        };
        let value = event.to_value().unwrap();
        assert_eq!(value["t"], "icp");
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys[0], "v");
        assert_eq!(keys[1], "t");
        assert_eq!(keys[2], "d");

        let parsed = KelEvent::from_value(&value).unwrap();
        assert_eq!(parsed, event);
    }
}
