//! Process configuration, read once from the environment.

use crate::error::{Error, Result};
use crate::types::Beacon;

pub const DEFAULT_API_URL: &str = "http://www.sportcampus.cn/api/association/doSign";

/// Longest trace a run will walk: one day.
pub const MAX_DURATION_SECONDS: u64 = 24 * 60 * 60;

const REQUIRED_VARS: [&str; 20] = [
    "USER_ID",
    "UTOKEN",
    "SALT",
    "ASS_ID",
    "DURATION_SECONDS",
    "LATITUDE",
    "LONGITUDE",
    "IBEACON_UUID",
    "IBEACON_MAJOR",
    "IBEACON_MINOR",
    "USER_AGENT",
    "X_CHANNEL",
    "PACKAGENAME",
    "XXVERSIONXX",
    "VERSIONNAME",
    "VERSIONCODE",
    "PLATFORM",
    "DRID",
    "E20_HEADER",
    "UUID_HEADER",
];

/// Device and app identity the service expects in request headers.
#[derive(Debug, Clone)]
pub struct HeaderConfig {
    pub user_agent: String,
    pub x_channel: String,
    pub package_name: String,
    pub xx_version: String,
    pub version_name: String,
    pub version_code: String,
    pub platform: String,
    pub drid: String,
    pub e20_header: String,
    pub uuid_header: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub user_id: String,
    pub utoken: String,
    pub salt: String,
    pub ass_id: String,
    pub duration_seconds: u64,
    pub latitude: f64,
    pub longitude: f64,
    pub beacon: Beacon,
    pub headers: HeaderConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let missing: Vec<&str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|key| get(key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(Error::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }

        let var = |key: &str| get(key).unwrap_or_default();

        let duration_seconds = parse_duration(&var("DURATION_SECONDS"))?;
        let latitude = parse_coordinate("LATITUDE", &var("LATITUDE"))?;
        let longitude = parse_coordinate("LONGITUDE", &var("LONGITUDE"))?;

        Ok(Self {
            api_url: get("CHECKIN_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            user_id: var("USER_ID"),
            utoken: var("UTOKEN"),
            salt: var("SALT"),
            ass_id: var("ASS_ID"),
            duration_seconds,
            latitude,
            longitude,
            beacon: Beacon {
                major: var("IBEACON_MAJOR"),
                minor: var("IBEACON_MINOR"),
                uuid: var("IBEACON_UUID"),
            },
            headers: HeaderConfig {
                user_agent: var("USER_AGENT"),
                x_channel: var("X_CHANNEL"),
                package_name: var("PACKAGENAME"),
                xx_version: var("XXVERSIONXX"),
                version_name: var("VERSIONNAME"),
                version_code: var("VERSIONCODE"),
                platform: var("PLATFORM"),
                drid: var("DRID"),
                e20_header: var("E20_HEADER"),
                uuid_header: var("UUID_HEADER"),
            },
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key} is not a valid number: {raw:?}")))
}

fn parse_duration(raw: &str) -> Result<u64> {
    let v: u64 = parse_number("DURATION_SECONDS", raw)?;
    if v > MAX_DURATION_SECONDS {
        return Err(Error::Config(format!(
            "DURATION_SECONDS must be at most {MAX_DURATION_SECONDS}: {raw:?}"
        )));
    }
    Ok(v)
}

fn parse_coordinate(key: &str, raw: &str) -> Result<f64> {
    let v: f64 = parse_number(key, raw)?;
    if !v.is_finite() {
        return Err(Error::Config(format!("{key} must be finite: {raw:?}")));
    }
    Ok(v)
}
