// src/types.rs
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Serialize)]
pub struct PreSignData {
    pub ass_id: String,
    pub nonce: String,
    pub sign_action: String,
}

#[derive(Serialize)]
pub struct DoSignData {
    pub ass_id: String,
    pub extra: String,
    pub nonce: String,
    pub pre_sign_id: String,
}

/// Envelope every endpoint response shares. `code == 200` is success.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse {
    pub code: i64,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl ApiResponse {
    pub const SUCCESS: i64 = 200;

    pub fn is_success(&self) -> bool {
        self.code == Self::SUCCESS
    }

    pub fn message(&self) -> &str {
        self.msg.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beacon {
    pub major: String,
    pub minor: String,
    pub uuid: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub latitude: f64,
    pub longitude: f64,
    pub speed: f64,
}

/// One simulated fix: a beacon sighting plus a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub ibeacons: Vec<Beacon>,
    #[serde(rename = "inBeacon")]
    pub in_beacon: bool,
    #[serde(rename = "latLng")]
    pub lat_lng: LatLng,
    /// Epoch milliseconds, rendered as a decimal string.
    pub time: String,
}

/// The `extra` document attached to a do-sign request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckInRecord {
    pub ass_id: String,
    pub duration: u64,
    #[serde(rename = "endTime")]
    pub end_time: String,
    #[serde(rename = "historyTime")]
    pub history_time: u64,
    #[serde(rename = "pauseCurSecond")]
    pub pause_cur_second: u64,
    pub points: Vec<LocationSample>,
    #[serde(rename = "runCurSecond")]
    pub run_cur_second: u64,
    #[serde(rename = "startTime")]
    pub start_time: u64,
    #[serde(rename = "userId")]
    pub user_id: String,
}
