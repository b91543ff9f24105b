//! Blocking HTTP client backing the two smart-HTTP requests.
//!
//! The reference stack's transport shells out to `curl`; this crate uses
//! `reqwest`'s blocking client directly instead, since the dependency is
//! already part of the stack and a subprocess dependency on an external
//! binary buys nothing for a 5-second GET and one POST.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};

use crate::{TransportError, UPLOAD_PACK_SERVICE};

const DEFAULT_REF_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// A response's `Content-Type` header plus its fully materialized body.
///
/// A materialized buffer rather than a live stream, since this transport is
/// built on a blocking HTTP client; the Pack Stream Ingestor's size limit is
/// what actually bounds how much memory a clone can consume.
pub struct HttpResponse {
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Talks to one repository's smart-HTTP endpoints over `base_url`.
pub struct HttpTransport {
    client: Client,
    base_url: String,
    ref_discovery_timeout: Duration,
}

impl HttpTransport {
    /// Construct a transport for `base_url` using the default 5 second
    /// ref-discovery timeout.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_ref_discovery_timeout(base_url, DEFAULT_REF_DISCOVERY_TIMEOUT)
    }

    pub fn with_ref_discovery_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ref_discovery_timeout: timeout,
        }
    }

    /// `GET {base_url}/info/refs?service=git-upload-pack`, bounded by the
    /// configured ref-discovery timeout.
    pub fn discover_refs(&self) -> Result<HttpResponse, TransportError> {
        let url = format!(
            "{}/info/refs?service={}",
            self.base_url, UPLOAD_PACK_SERVICE
        );

        let response = self
            .client
            .get(&url)
            .timeout(self.ref_discovery_timeout)
            .send()
            .map_err(|e| classify_error(e, &url, self.ref_discovery_timeout))?;

        Self::materialize(response, &url)
    }

    /// `POST {base_url}/git-upload-pack` with a pkt-line request body. No
    /// fixed timeout is applied here — the Pack Stream Ingestor's size limit
    /// is what bounds this request.
    pub fn fetch_pack(&self, request_body: Vec<u8>) -> Result<HttpResponse, TransportError> {
        let url = format!("{}/{}", self.base_url, UPLOAD_PACK_SERVICE);

        let response = self
            .client
            .post(&url)
            .header(
                CONTENT_TYPE,
                format!("application/x-{UPLOAD_PACK_SERVICE}-request"),
            )
            .header(ACCEPT, format!("application/x-{UPLOAD_PACK_SERVICE}-result"))
            .body(request_body)
            .send()
            .map_err(|e| TransportError::ConnectionFailed {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        Self::materialize(response, &url)
    }

    fn materialize(
        response: reqwest::blocking::Response,
        url: &str,
    ) -> Result<HttpResponse, TransportError> {
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .bytes()
            .map_err(|e| TransportError::ConnectionFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })?
            .to_vec();

        Ok(HttpResponse { content_type, body })
    }
}

fn classify_error(e: reqwest::Error, url: &str, timeout: Duration) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
            timeout,
        }
    } else {
        TransportError::ConnectionFailed {
            url: url.to_string(),
            reason: e.to_string(),
        }
    }
}
