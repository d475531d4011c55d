//! Error taxonomy shared by the on-air desk and the capture bridge

use std::time::Duration;
use thiserror::Error;

/// Rejected operator input. Never leaves a partial mutation behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} required")]
    Missing(&'static str),

    #[error("invalid contestId: {0}")]
    UnknownContest(String),

    #[error("contest {id} is not {expected} type")]
    WrongContestType { id: String, expected: &'static str },

    #[error("unknown participant number: {0}")]
    UnknownParticipant(u32),

    #[error("invalid specialId: {0}")]
    UnknownSpecial(String),

    #[error("special {special_id} has no item at index {index}")]
    UnknownSpecialItem { special_id: String, index: usize },

    #[error("itemText must be one of the items of special {0}")]
    UnknownItemText(String),

    #[error("preset not found: {0}")]
    UnknownPreset(String),

    /// Body that is not JSON or does not fit the request shape
    #[error("invalid request body: {0}")]
    MalformedBody(String),
}

/// Capture endpoint failures, surfaced as values and as status
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("capture endpoint is not configured")]
    NotConfigured,

    #[error("failed to connect to OBS at {endpoint}: {message}")]
    Connect { endpoint: String, message: String },

    #[error("OBS request failed: {0}")]
    Request(String),

    #[error("OBS did not answer within {0:?}")]
    Timeout(Duration),

    #[error("failed to decode screenshot: {0}")]
    Decode(String),
}

/// Errors reported by a mixer transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MixerError {
    #[error("{0}")]
    Connect(String),

    #[error("{0}")]
    Request(String),

    #[error("connection closed")]
    Closed,
}
