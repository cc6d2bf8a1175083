use anyhow::Result;
use std::error::Error as _;
use std::time::Instant;

use super::types::CheckOutcome;
use crate::config::SiteConfig;

/// Performs a single health check against one site.
///
/// Implementations never fail: every failure mode is reported through an
/// exceptional [`CheckOutcome`].
#[async_trait::async_trait]
pub trait SiteProbe: Send + Sync {
    async fn probe(&self, site: &SiteConfig) -> CheckOutcome;
}

/// HTTP/HTTPS probe
pub struct HttpProbe {
    client: reqwest::Client,
    default_timeout_seconds: u64,
}

impl HttpProbe {
    pub fn new(default_timeout_seconds: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("downtime-notifier/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self::with_client(client, default_timeout_seconds))
    }

    pub fn with_client(client: reqwest::Client, default_timeout_seconds: u64) -> Self {
        Self { client, default_timeout_seconds }
    }
}

/// Flatten a reqwest error and its causes into one line
fn describe_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        return "timeout".to_string();
    }

    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[async_trait::async_trait]
impl SiteProbe for HttpProbe {
    async fn probe(&self, site: &SiteConfig) -> CheckOutcome {
        let start = Instant::now();
        let timeout = site.timeout(self.default_timeout_seconds);

        let response = match self.client.get(&site.url).timeout(timeout).send().await {
            Ok(response) => response,
            Err(e) => return CheckOutcome::failure(describe_error(&e)),
        };

        let status = response.status();
        let status_code = status.as_u16();

        if !status.is_success() {
            let latency = start.elapsed().as_millis() as u64;
            return CheckOutcome::failure(format!("HTTP {}", status_code))
                .with_response(status_code, latency);
        }

        if let Some(expected) = &site.expected_content {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    let latency = start.elapsed().as_millis() as u64;
                    return CheckOutcome::failure(describe_error(&e))
                        .with_response(status_code, latency);
                }
            };

            if !body.contains(expected.as_str()) {
                let latency = start.elapsed().as_millis() as u64;
                return CheckOutcome::failure(format!(
                    "HTTP {}: expected content not found",
                    status_code
                ))
                .with_response(status_code, latency);
            }
        }

        CheckOutcome::success(status_code, start.elapsed().as_millis() as u64)
    }
}
