//! The HTTP seam between the session client and the network.
//!
//! Requests are fully prepared values: method, URL, ordered headers, the
//! exact cookie jar for the step, and an optional body. The reqwest-backed
//! transport never follows redirects, never retries, and keeps no cookie
//! store of its own.

use crate::cookies::CookieJar;
use crate::error::TransportError;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, COOKIE, SET_COOKIE};
use reqwest::Method;
use std::time::Duration;

/// A request ready to send.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    /// Headers in the order a browser would send them. Excludes `Cookie`.
    pub headers: Vec<(&'static str, String)>,
    /// The complete set of cookies to send.
    pub cookies: CookieJar,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response from a single exchange.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Requested URL.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// All response headers except `Set-Cookie`.
    pub headers: Vec<(String, String)>,
    /// Raw `Set-Cookie` header values, in order.
    pub set_cookies: Vec<String>,
    /// Response body as text.
    pub body: String,
}

impl HttpResponse {
    /// First header with this name, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Anything that can carry one request to the portal and bring back the response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request).await
    }
}

/// URL without its query string, safe to log.
pub(crate) fn loggable_url(url: &str) -> &str {
    url.split_once('?').map_or(url, |(path, _)| path)
}

/// reqwest-backed transport.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with a per-request timeout.
    ///
    /// HTTP/1.1 only: the browser header set includes `Connection`, which
    /// HTTP/2 forbids.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .http1_only()
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self { client })
    }

    fn map_error(e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_builder() {
            TransportError::Request(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        tracing::info!(
            "starting request, method: {}, url: {}",
            request.method,
            loggable_url(&request.url)
        );

        let mut builder = self.client.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::Request(format!("header {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::Request(format!("header {name}: {e}")))?;
            builder = builder.header(name, value);
        }
        if let Some(cookie) = request.cookies.header_value() {
            let value = HeaderValue::from_str(&cookie)
                .map_err(|e| TransportError::Request(format!("cookie header: {e}")))?;
            builder = builder.header(COOKIE, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let r = builder.send().await.map_err(Self::map_error)?;
        let status = r.status().as_u16();
        tracing::info!(
            "got response, status: {} {}",
            status,
            r.status().canonical_reason().unwrap_or("")
        );

        let set_cookies: Vec<String> = r
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .collect();

        let headers: Vec<(String, String)> = r
            .headers()
            .iter()
            .filter(|(k, _)| *k != SET_COOKIE)
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();

        let body = r.text().await.map_err(Self::map_error)?;

        Ok(HttpResponse {
            url: request.url,
            status,
            headers,
            set_cookies,
            body,
        })
    }
}
