//! HTTP transport for the Kia owners portal.
//!
//! The portal expects browser-like headers, session cookies replayed on
//! every call, and the vehicle key in a `vinkey` header.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Url};
use tracing::{debug, warn};

use super::transport::{cookie_pair, Request, Response, Transport};
use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default base URL for the owners portal services
pub const DEFAULT_BASE_URL: &str = "https://owners.kia.com/apps/services/owners";

/// Default HTTP request timeout in seconds.
/// Remote commands wake the vehicle's modem, which can take a while.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

const ORIGIN: &str = "https://owners.kia.com";
const REFERER: &str = "https://owners.kia.com/content/owners/en/locations.html?page=my-locations";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/113.0.0.0 Safari/537.36 Edg/113.0.1774.35";

/// Header carrying the vehicle key on authenticated calls
const VEHICLE_KEY_HEADER: &str = "vinkey";

/// URLs of the portal endpoints, derived from one base URL.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base_url: String,
}

impl Endpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn authenticate(&self) -> String {
        format!("{}/apiGateway", self.base_url)
    }

    /// Remote vehicle command, the action JSON travels in the query string
    pub fn vehicle_command(&self, action_json: &str) -> Result<String> {
        let base = format!("{}/remotevehicledata", self.base_url);
        let url = Url::parse_with_params(&base, &[("requestJson", action_json)])
            .map_err(|e| Error::Config(format!("invalid base URL {}: {}", self.base_url, e)))?;
        Ok(url.into())
    }

    pub fn location(&self) -> String {
        format!("{}/location/vehicle.html", self.base_url)
    }
}

/// reqwest-backed transport.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            header::HeaderValue::from_static("en-US,en;q=0.9"),
        );
        headers.insert(header::ORIGIN, header::HeaderValue::from_static(ORIGIN));
        headers.insert(header::REFERER, header::HeaderValue::from_static(REFERER));
        headers.insert("sec-fetch-dest", header::HeaderValue::from_static("empty"));
        headers.insert("sec-fetch-mode", header::HeaderValue::from_static("cors"));
        headers.insert("sec-fetch-site", header::HeaderValue::from_static("same-origin"));

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }

    fn request_headers(request: &Request) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref key) = request.vehicle_key {
            headers.insert(
                VEHICLE_KEY_HEADER,
                header::HeaderValue::from_str(key).map_err(|_| {
                    Error::MalformedResponse("vehicle key is not a valid header".into())
                })?,
            );
        }
        if !request.cookies.is_empty() {
            headers.insert(
                header::COOKIE,
                header::HeaderValue::from_str(&request.cookies.join("; "))
                    .map_err(|_| Error::MalformedResponse("cookie is not a valid header".into()))?,
            );
        }
        if request.body.is_some() {
            headers.insert(
                header::CONTENT_TYPE,
                header::HeaderValue::from_static("application/json;charset=utf-8"),
            );
        }
        Ok(headers)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        let headers = Self::request_headers(&request)?;
        let builder = match request.body {
            Some(ref body) => self.client.post(&request.url).body(body.clone()),
            None => self.client.get(&request.url),
        };

        let response = builder
            .headers(headers)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("request to {} failed: {}", request.url, e)))?;

        let status = response.status();
        let cookies: Vec<String> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(cookie_pair)
            .collect();

        let body = response
            .text()
            .await
            .map_err(|e| Error::Transport(format!("failed to read response body: {}", e)))?;

        debug!(status = status.as_u16(), cookies = cookies.len(), "Portal responded");

        if status.is_server_error() {
            debug!(body = %Error::truncate_body(&body), "Server error body");
            return Err(Error::Transport(format!("server error {}", status)));
        }
        if !status.is_success() {
            // The portal reports most failures in the body; let the caller decide
            warn!(status = status.as_u16(), "Portal returned non-success status");
        }

        Ok(Response { body, cookies })
    }
}
