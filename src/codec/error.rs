use thiserror::Error;

use crate::codec::prefix::PrefixError;

/// Structural and cryptographic failure modes of the codec (§4.1, §7).
#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed CESR frame: {0}")]
    MalformedFrame(String),

    #[error("frame declares size {declared} but body is {actual} bytes")]
    SizeMismatch { declared: usize, actual: usize },

    #[error("unknown version family {0:?}")]
    UnknownFamily(String),

    #[error("invalid JSON: {0}")]
    BadJson(String),

    #[error("computed SAID does not match the event's `{label}` field")]
    BadSaid { label: String },

    #[error(transparent)]
    Prefix(#[from] PrefixError),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::BadJson(e.to_string())
    }
}
