use md5::{Digest, Md5};
use serde::Serialize;
use uuid::Uuid;

use crate::canon::{canonical_json_string, Layout};
use crate::error::Result;

/// Lowercase hex MD5 over `salt || "data" || data`.
pub fn calculate_sign(data: &str, salt: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(salt.as_bytes());
    hasher.update(b"data");
    hasher.update(data.as_bytes());
    hex::encode(hasher.finalize())
}

/// 32 lowercase hex chars from a random v4 UUID.
pub fn gen_nonce() -> String {
    Uuid::new_v4().simple().to_string()
}

/// A request body ready for transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub sign: String,
    pub data: String,
}

impl SignedRequest {
    pub fn new<T: Serialize>(payload: &T, salt: &str) -> Result<Self> {
        let value = serde_json::to_value(payload)?;
        let data = canonical_json_string(&value, Layout::Spaced)?;
        let sign = calculate_sign(&data, salt);
        Ok(Self { sign, data })
    }

    /// `sign=<hex>&data=<json>`. The endpoint reads the JSON raw, so it is
    /// not percent-encoded.
    pub fn form_body(&self) -> String {
        format!("sign={}&data={}", self.sign, self.data)
    }
}
