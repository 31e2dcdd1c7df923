//! Transaction Event Log event bodies (§3 TEL table, §4.4).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::codec::version::VersionString;
use crate::event::error::EventError;
use crate::event::seal::ParentSeal;
use crate::event::{from_envelope, to_envelope};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcpEdges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentSeal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VcpData {
    pub i: String,
    pub ii: String,
    pub s: String,
    pub b: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<VcpEdges>,
}

impl VcpData {
    pub fn parent_registry(&self) -> Option<&str> {
        self.e.as_ref().and_then(|e| e.parent.as_ref()).map(|p| p.n.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssData {
    pub i: String,
    pub s: String,
    pub ri: String,
    pub dt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevData {
    pub i: String,
    pub s: String,
    pub p: String,
    pub ri: String,
    pub dt: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelEventData {
    Vcp(VcpData),
    Iss(IssData),
    Rev(RevData),
}

impl TelEventData {
    pub fn type_tag(&self) -> &'static str {
        match self {
            TelEventData::Vcp(_) => "vcp",
            TelEventData::Iss(_) => "iss",
            TelEventData::Rev(_) => "rev",
        }
    }

    /// The registry this event belongs to (itself, for `vcp`).
    pub fn registry_id<'a>(&'a self, this_said: &'a str) -> &'a str {
        match self {
            TelEventData::Vcp(_) => this_said,
            TelEventData::Iss(d) => &d.ri,
            TelEventData::Rev(d) => &d.ri,
        }
    }

    pub fn sequence(&self) -> &str {
        match self {
            TelEventData::Vcp(d) => &d.s,
            TelEventData::Iss(d) => &d.s,
            TelEventData::Rev(d) => &d.s,
        }
    }

    pub fn credential_id(&self) -> Option<&str> {
        match self {
            TelEventData::Vcp(_) => None,
            TelEventData::Iss(d) => Some(&d.i),
            TelEventData::Rev(d) => Some(&d.i),
        }
    }
}

/// A TEL event (§3, §4.4): version string, type tag, SAID, and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelEvent {
    pub v: VersionString,
    pub d: String,
    pub data: TelEventData,
}

impl TelEvent {
    pub fn to_value(&self) -> Result<Value, EventError> {
        match &self.data {
            TelEventData::Vcp(d) => to_envelope(&self.v, "vcp", &self.d, d),
            TelEventData::Iss(d) => to_envelope(&self.v, "iss", &self.d, d),
            TelEventData::Rev(d) => to_envelope(&self.v, "rev", &self.d, d),
        }
    }

    pub fn from_value(value: &Value) -> Result<Self, EventError> {
        let (v, t, d) = from_envelope(value)?;
        let data = match t.as_str() {
            "vcp" => TelEventData::Vcp(
                serde_json::from_value(value.clone()).map_err(|e| EventError::BadField(e.to_string()))?,
            ),
            "iss" => TelEventData::Iss(
                serde_json::from_value(value.clone()).map_err(|e| EventError::BadField(e.to_string()))?,
            ),
            "rev" => TelEventData::Rev(
                serde_json::from_value(value.clone()).map_err(|e| EventError::BadField(e.to_string()))?,
            ),
            other => return Err(EventError::UnknownType(other.to_string())),
        };
        Ok(TelEvent { v, d, data })
    }
}
