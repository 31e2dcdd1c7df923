//! Typed event bodies (§9: "represent events as tagged variants... plus a
//! `RawEvent` for pre-classification"). Each event family owns its own
//! envelope helpers so the canonical field order documented in §3 is
//! reproduced exactly, independent of whatever order a derived
//! `Serialize` impl would otherwise choose.

pub mod acdc;
pub mod error;
pub mod kel;
pub mod raw;
pub mod schema;
pub mod seal;
pub mod tel;

pub use acdc::{Acdc, Edge};
pub use error::EventError;
pub use kel::{IcpData, IxnData, KelEvent, KelEventData, RotData};
pub use raw::RawEvent;
pub use seal::{ParentSeal, Seal};
pub use tel::{IssData, RevData, TelEvent, TelEventData, VcpData, VcpEdges};

use serde::Serialize;
use serde_json::Value;

use crate::codec::version::VersionString;

/// Which of the seven event shapes a frame's `t` tag (or, for ACDC, its
/// absence) names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Icp,
    Rot,
    Ixn,
    Vcp,
    Iss,
    Rev,
    Acdc,
}

impl EventKind {
    /// Classifies a decoded JSON body by its `t` field, or as an ACDC if
    /// `t` is absent (ACDCs carry no type tag, §3).
    pub fn classify(value: &Value) -> Result<Self, EventError> {
        match value.get("t").and_then(Value::as_str) {
            Some("icp") => Ok(EventKind::Icp),
            Some("rot") => Ok(EventKind::Rot),
            Some("ixn") => Ok(EventKind::Ixn),
            Some("vcp") => Ok(EventKind::Vcp),
            Some("iss") => Ok(EventKind::Iss),
            Some("rev") => Ok(EventKind::Rev),
            Some(other) => Err(EventError::UnknownType(other.to_string())),
            None if value.get("i").is_some() && value.get("ri").is_some() => Ok(EventKind::Acdc),
            None => Err(EventError::MissingField("t")),
        }
    }
}

pub(crate) fn to_envelope(
    v: &VersionString,
    t: &str,
    d: &str,
    data: impl Serialize,
) -> Result<Value, EventError> {
    let mut map = serde_json::Map::new();
    map.insert(
        "v".to_string(),
        serde_json::to_value(v).map_err(|e| EventError::BadField(e.to_string()))?,
    );
    map.insert("t".to_string(), Value::String(t.to_string()));
    map.insert("d".to_string(), Value::String(d.to_string()));
    let data_value = serde_json::to_value(data).map_err(|e| EventError::BadField(e.to_string()))?;
    if let Value::Object(fields) = data_value {
        for (k, v) in fields {
            map.insert(k, v);
        }
    }
    Ok(Value::Object(map))
}

pub(crate) fn from_envelope(value: &Value) -> Result<(VersionString, String, String), EventError> {
    let obj = value
        .as_object()
        .ok_or_else(|| EventError::BadField("event is not a JSON object".into()))?;
    let v: VersionString = serde_json::from_value(
        obj.get("v").cloned().ok_or(EventError::MissingField("v"))?,
    )
    .map_err(|e| EventError::BadField(e.to_string()))?;
    let t = obj
        .get("t")
        .and_then(Value::as_str)
        .ok_or(EventError::MissingField("t"))?
        .to_string();
    let d = obj
        .get("d")
        .and_then(Value::as_str)
        .ok_or(EventError::MissingField("d"))?
        .to_string();
    Ok((v, t, d))
}

pub(crate) fn to_envelope_acdc(acdc: &Acdc) -> Result<Value, EventError> {
    let mut map = serde_json::Map::new();
    map.insert(
        "v".to_string(),
        serde_json::to_value(&acdc.v).map_err(|e| EventError::BadField(e.to_string()))?,
    );
    map.insert("d".to_string(), Value::String(acdc.d.clone()));
    map.insert("i".to_string(), Value::String(acdc.i.clone()));
    map.insert("ri".to_string(), Value::String(acdc.ri.clone()));
    map.insert("s".to_string(), Value::String(acdc.s.clone()));
    map.insert("a".to_string(), acdc.a.clone());
    if let Some(edges) = &acdc.e {
        let edges_value =
            serde_json::to_value(edges).map_err(|e| EventError::BadField(e.to_string()))?;
        map.insert("e".to_string(), edges_value);
    }
    Ok(Value::Object(map))
}

pub(crate) fn from_envelope_acdc(value: &Value) -> Result<Acdc, EventError> {
    let obj = value
        .as_object()
        .ok_or_else(|| EventError::BadField("ACDC is not a JSON object".into()))?;
    let v: VersionString = serde_json::from_value(
        obj.get("v").cloned().ok_or(EventError::MissingField("v"))?,
    )
    .map_err(|e| EventError::BadField(e.to_string()))?;
    let field = |name: &'static str| -> Result<String, EventError> {
        obj.get(name)
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or(EventError::MissingField(name))
    };
    let d = field("d")?;
    let i = field("i")?;
    let ri = field("ri")?;
    let s = field("s")?;
    let a = obj.get("a").cloned().ok_or(EventError::MissingField("a"))?;
    let e = match obj.get("e") {
        Some(v) => Some(
            serde_json::from_value(v.clone()).map_err(|e| EventError::BadField(e.to_string()))?,
        ),
        None => None,
    };
    Ok(Acdc { v, d, i, ri, s, a, e })
}
