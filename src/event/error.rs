use thiserror::Error;

/// Failures turning a decoded JSON body into one of the typed event
/// variants (§9's "tagged variants... plus a `RawEvent` for
/// pre-classification").
#[derive(Error, Debug)]
pub enum EventError {
    #[error("unknown event type tag {0:?}")]
    UnknownType(String),
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error("malformed field: {0}")]
    BadField(String),
}
