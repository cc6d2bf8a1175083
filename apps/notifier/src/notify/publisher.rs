use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

/// Outbound transport for a composed notification
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, subject: &str, body: &str) -> Result<()>;
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    subject: &'a str,
    message: &'a str,
}

/// Posts `{"subject", "message"}` as JSON to a webhook
pub struct WebhookPublisher {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl WebhookPublisher {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self::with_client(client, url, token))
    }

    pub fn with_client(
        client: reqwest::Client,
        url: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self { client, url: url.into(), token }
    }
}

#[async_trait]
impl Publisher for WebhookPublisher {
    async fn publish(&self, subject: &str, body: &str) -> Result<()> {
        let payload = WebhookPayload { subject, message: body };
        let mut request = self.client.post(&self.url).json(&payload);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| anyhow!("webhook request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!(
                "webhook rejected notification with status code: {}",
                status.as_u16()
            ));
        }

        info!("Webhook accepted notification ({})", status.as_u16());
        Ok(())
    }
}

/// Writes notifications to the log instead of sending them
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, subject: &str, body: &str) -> Result<()> {
        info!(%subject, "Notification (not sent):\n{}", body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Accept one request, answer with `status_line`, hand back the raw request
    async fn capture_one(status_line: &'static str) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap_or(0);
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request.ends_with(b"}") {
                    break;
                }
            }
            let response =
                format!("{status_line}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
            let _ = tx.send(String::from_utf8_lossy(&request).into_owned());
        });

        (format!("http://{addr}/hook"), rx)
    }

    fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    #[tokio::test]
    async fn test_webhook_posts_json_with_token() {
        let (url, request) = capture_one("HTTP/1.1 204 No Content").await;
        let publisher = WebhookPublisher::with_client(client(), url, Some("tok".into()));

        publisher.publish("Downtime detected: api", "Hello,\n\n0) api").await.unwrap();

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /hook "));
        assert!(request.to_lowercase().contains("authorization: bearer tok"));
        let (_, body) = request.split_once("\r\n\r\n").unwrap();
        let payload: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(payload["subject"], "Downtime detected: api");
        assert_eq!(payload["message"], "Hello,\n\n0) api");
    }

    #[tokio::test]
    async fn test_webhook_error_status_is_error() {
        let (url, _request) = capture_one("HTTP/1.1 500 Internal Server Error").await;
        let publisher = WebhookPublisher::with_client(client(), url, None);

        let err = publisher.publish("s", "b").await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_log_publisher_always_succeeds() {
        assert!(LogPublisher.publish("subject", "body").await.is_ok());
    }
}
