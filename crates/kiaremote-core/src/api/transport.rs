use async_trait::async_trait;

use crate::error::Result;

/// One request to the owners portal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    pub url: String,
    /// JSON body; `None` sends a GET
    pub body: Option<String>,
    /// Sent as the `vinkey` header when present
    pub vehicle_key: Option<String>,
    /// `name=value` cookies replayed on the request
    pub cookies: Vec<String>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn post(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: Some(body.into()),
            ..Default::default()
        }
    }

    pub fn with_session(mut self, vehicle_key: &str, cookies: &[String]) -> Self {
        self.vehicle_key = Some(vehicle_key.to_string());
        self.cookies = cookies.to_vec();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub body: String,
    /// Cookies set by the server during this exchange, as `name=value`
    pub cookies: Vec<String>,
}

/// Performs a single HTTP exchange.
///
/// Implementations return the body for any response the portal answers,
/// error or not; only network-level failures become `Error::Transport`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response>;
}

/// Reduce a `Set-Cookie` header value to its `name=value` pair.
pub fn cookie_pair(set_cookie: &str) -> Option<String> {
    let pair = set_cookie.split(';').next()?.trim();
    let (name, _) = pair.split_once('=')?;
    if name.trim().is_empty() {
        return None;
    }
    Some(pair.to_string())
}

/// Fold newly observed cookies into `jar`; a cookie replaces any earlier
/// cookie of the same name, otherwise order is preserved.
pub fn merge_cookies(jar: &mut Vec<String>, observed: &[String]) {
    for cookie in observed {
        let name = cookie_name(cookie);
        match jar.iter_mut().find(|c| cookie_name(c) == name) {
            Some(existing) => existing.clone_from(cookie),
            None => jar.push(cookie.clone()),
        }
    }
}

fn cookie_name(cookie: &str) -> &str {
    cookie.split_once('=').map(|(n, _)| n.trim()).unwrap_or(cookie)
}
