use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION, CONTENT_TYPE, USER_AGENT};
use tracing::debug;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::sign::SignedRequest;
use crate::types::ApiResponse;

pub const PRE_SIGN_TIMEOUT: Duration = Duration::from_secs(10);
pub const DO_SIGN_TIMEOUT: Duration = Duration::from_secs(20);

/// The service really does want this misspelt media type.
const FORM_CONTENT_TYPE: &str = "application/x-form-urlencoded";

/// Somewhere a signed request can be delivered.
#[allow(async_fn_in_trait)]
pub trait Endpoint {
    fn url(&self) -> &str;

    async fn send(&self, request: &SignedRequest, timeout: Duration) -> Result<ApiResponse>;
}

/// HTTP delivery over one pooled client, reused for every request of a run.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .default_headers(header_map(config)?)
            .gzip(true)
            .build()?;
        Ok(Self {
            client,
            url: config.api_url.clone(),
        })
    }
}

impl Endpoint for HttpTransport {
    fn url(&self) -> &str {
        &self.url
    }

    async fn send(&self, request: &SignedRequest, timeout: Duration) -> Result<ApiResponse> {
        let response = self
            .client
            .post(&self.url)
            .timeout(timeout)
            .body(request.form_body())
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        debug!(%body, "raw response");
        parse_response(&body)
    }
}

pub fn parse_response(body: &str) -> Result<ApiResponse> {
    serde_json::from_str(body)
        .map_err(|e| Error::Protocol(format!("unexpected response body ({e}): {body}")))
}

fn header_map(config: &Config) -> Result<HeaderMap> {
    let h = &config.headers;
    let custom = [
        (HeaderName::from_static("x-channel"), &h.x_channel),
        (HeaderName::from_static("packagename"), &h.package_name),
        (HeaderName::from_static("xxversionxx"), &h.xx_version),
        (HeaderName::from_static("versionname"), &h.version_name),
        (HeaderName::from_static("versioncode"), &h.version_code),
        (HeaderName::from_static("platform"), &h.platform),
        (HeaderName::from_static("drid"), &h.drid),
        (
            HeaderName::from_static("e206b53e98e9ecc295427aa5e1a4c18b"),
            &h.e20_header,
        ),
        (HeaderName::from_static("uuid"), &h.uuid_header),
        (HeaderName::from_static("utoken"), &config.utoken),
        (USER_AGENT, &h.user_agent),
    ];

    let mut map = HeaderMap::with_capacity(custom.len() + 2);
    for (name, value) in custom {
        let value = HeaderValue::from_str(value)
            .map_err(|_| Error::Config(format!("invalid characters in header {name}")))?;
        map.insert(name, value);
    }
    map.insert(CONNECTION, HeaderValue::from_static("Keep-Alive"));
    map.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
    Ok(map)
}
