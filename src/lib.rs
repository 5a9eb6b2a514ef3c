//! Signed two-step check-in client for the sportcampus attendance endpoint.
//!
//! A run obtains a pre-sign id, walks a paced synthetic beacon trace, and
//! submits the finished record as a signed do-sign request.

pub mod canon;
pub mod checkin;
pub mod config;
pub mod confirm;
pub mod error;
pub mod sign;
pub mod trace;
pub mod transport;
pub mod types;

pub use error::{Error, Result};
