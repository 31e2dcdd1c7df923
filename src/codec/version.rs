//! Event version strings (§6): a fixed 10-character family tag, a 6-hex
//! digit zero-padded size, and a literal `_` separator — 17 characters
//! total, carried as the value of every event's `v` field.

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::codec::error::Error;

/// Which event family a frame belongs to (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    /// KEL/TEL events.
    Keri,
    /// ACDC credentials.
    Acdc,
}

impl Family {
    fn tag(&self) -> &'static str {
        match self {
            Family::Keri => "KERI10JSON",
            Family::Acdc => "ACDC10JSON",
        }
    }

    fn from_tag(tag: &str) -> Result<Self, Error> {
        match tag {
            "KERI10JSON" => Ok(Family::Keri),
            "ACDC10JSON" => Ok(Family::Acdc),
            other => Err(Error::UnknownFamily(other.to_string())),
        }
    }
}

/// The parsed `v` field: family plus the framed body's declared size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionString {
    pub family: Family,
    pub size: usize,
}

const TAG_LEN: usize = 10;
const SIZE_LEN: usize = 6;
pub const VERSION_STRING_LEN: usize = TAG_LEN + SIZE_LEN + 1;

impl VersionString {
    pub fn new(family: Family, size: usize) -> Self {
        Self { family, size }
    }

    /// A placeholder version string with `size` zeroed out, used while the
    /// real size is not yet known (before the final re-serialization).
    pub fn empty(family: Family) -> Self {
        Self { family, size: 0 }
    }
}

impl Display for VersionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{:06x}_", self.family.tag(), self.size)
    }
}

impl FromStr for VersionString {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != VERSION_STRING_LEN {
            return Err(Error::MalformedFrame(format!(
                "version string {:?} has length {}, expected {}",
                s,
                s.len(),
                VERSION_STRING_LEN
            )));
        }
        let tag = &s[..TAG_LEN];
        let size_str = &s[TAG_LEN..TAG_LEN + SIZE_LEN];
        let sep = &s[TAG_LEN + SIZE_LEN..];
        if sep != "_" {
            return Err(Error::MalformedFrame(format!(
                "version string {:?} missing `_` separator",
                s
            )));
        }
        let family = Family::from_tag(tag)?;
        let size = usize::from_str_radix(size_str, 16)
            .map_err(|_| Error::MalformedFrame(format!("bad size field in {:?}", s)))?;
        Ok(VersionString { family, size })
    }
}

impl Serialize for VersionString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for VersionString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        VersionString::from_str(&s).map_err(serde::de::Error::custom)
    }
}
