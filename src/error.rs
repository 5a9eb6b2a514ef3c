//! Failure taxonomy for a check-in run.
//!
//! Every variant is terminal for the run. Declining a confirmation or
//! interrupting the trace is not an error; see [`crate::checkin::Outcome`].

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Missing or unparseable settings. Raised before any network activity.
    #[error("configuration error: {0}")]
    Config(String),

    /// Network failure, timeout, or a non-2xx HTTP status.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered, but not with the shape we expect.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Well-formed response carrying a non-success code.
    #[error("server rejected request (code {code}): {msg}")]
    CheckInRejected { code: i64, msg: String },

    #[error("payload encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
