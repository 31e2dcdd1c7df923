//! Pre-classification event shape (§9): the version and JSON body as
//! decoded off the wire, before the `t` tag (or its absence) picks a
//! typed variant.

use serde_json::Value;

use crate::codec::frame::DecodedFrame;
use crate::codec::version::VersionString;

#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub version: VersionString,
    pub body: Value,
    pub attachments: Vec<u8>,
}

impl From<DecodedFrame> for RawEvent {
    fn from(decoded: DecodedFrame) -> Self {
        RawEvent {
            version: decoded.version,
            body: decoded.json,
            attachments: decoded.attachments,
        }
    }
}
