//! Retrying HTTP transport with classification-aware exponential backoff

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::application::errors::VulnerabilityError;

const USER_AGENT: &str = concat!("depsentry/", env!("CARGO_PKG_VERSION"));

/// Default number of attempts for a single logical request
pub const DEFAULT_RETRIES: u32 = 3;

/// Per-request options layered over the transport defaults
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub timeout: Option<Duration>,
    pub headers: Vec<(String, String)>,
    pub retries: Option<u32>,
}

/// Outcome of a successful request
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
    /// Raw `Link` response header, when the provider paginates
    pub link: Option<String>,
}

impl TransportResponse {
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, VulnerabilityError> {
        serde_json::from_str(&self.body).map_err(VulnerabilityError::Json)
    }
}

/// Single HTTP call wrapped with retry and structured error translation
pub struct HttpTransport {
    client: Client,
    default_retries: u32,
}

impl HttpTransport {
    pub fn new(timeout: Duration, default_retries: u32) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            default_retries: default_retries.max(1),
        }
    }

    /// Issue a request, retrying retryable failures with exponential backoff
    /// (2^attempt seconds). The last error is returned classified.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        options: &RequestOptions,
    ) -> Result<TransportResponse, VulnerabilityError> {
        let retries = options.retries.unwrap_or(self.default_retries).max(1);
        let mut attempt: u32 = 0;

        loop {
            debug!(%method, url, attempt, "issuing request");

            match self.execute_once(method.clone(), url, body, options).await {
                Ok(response) => {
                    debug!(%method, url, status = response.status, attempt, "request succeeded");
                    return Ok(response);
                }
                Err(error) => {
                    let final_attempt = attempt + 1 >= retries;
                    if final_attempt || !error.is_retryable() {
                        warn!(
                            %method,
                            url,
                            attempt,
                            kind = error.kind(),
                            recoverable = error.is_recoverable(),
                            "request failed: {error}"
                        );
                        return Err(error);
                    }

                    let delay = Duration::from_millis(1000 * 2u64.pow(attempt));
                    warn!(
                        %method,
                        url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        kind = error.kind(),
                        "request failed, retrying: {error}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn execute_once(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        options: &RequestOptions,
    ) -> Result<TransportResponse, VulnerabilityError> {
        let mut request = self.client.request(method.clone(), url);

        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_reqwest_error(e, &method, url, options))?;

        let status = response.status();
        let link = response
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(e, &method, url, options))?;

        if status.is_success() {
            return Ok(TransportResponse {
                status: status.as_u16(),
                body,
                link,
            });
        }

        Err(classify_status(status, &method, url, body))
    }
}

fn classify_reqwest_error(
    error: reqwest::Error,
    method: &Method,
    url: &str,
    options: &RequestOptions,
) -> VulnerabilityError {
    if error.is_timeout() {
        let seconds = options.timeout.map(|t| t.as_secs()).unwrap_or(30);
        return VulnerabilityError::Timeout {
            seconds,
            method: method.to_string(),
            url: url.to_string(),
        };
    }

    // Connection refused, DNS resolution failure, no response received
    VulnerabilityError::Network {
        method: method.to_string(),
        url: url.to_string(),
        message: error.to_string(),
    }
}

fn classify_status(
    status: StatusCode,
    method: &Method,
    url: &str,
    body: String,
) -> VulnerabilityError {
    let message = excerpt(&body);
    match status.as_u16() {
        429 => VulnerabilityError::RateLimit {
            status: 429,
            url: url.to_string(),
        },
        401 | 403 => VulnerabilityError::Auth {
            status: status.as_u16(),
            url: url.to_string(),
            message,
        },
        other => VulnerabilityError::Http {
            status: other,
            method: method.to_string(),
            url: url.to_string(),
            message,
        },
    }
}

/// Bound error bodies so log lines stay readable
fn excerpt(body: &str) -> String {
    const MAX: usize = 512;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut cut = MAX;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}…", &body[..cut])
    }
}
