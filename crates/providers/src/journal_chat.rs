//! Client for the journal chat-completion endpoint.
//!
//! Wire contract: `POST {message, content}` → `{response?, error?}`.
//! A non-2xx status or a non-empty `error` field is a failure.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::chat::ChatError;
use shared::settings::DEFAULT_TIMEOUT_SECS;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(DEFAULT_TIMEOUT_SECS);

static SHARED_HTTP: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
});

#[derive(Debug, Serialize)]
struct JournalChatRequest<'a> {
    message: &'a str,
    content: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct JournalChatResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Anything that can answer a journal chat message.
///
/// `Ok(None)` means the endpoint succeeded without a `response` field.
#[async_trait::async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, message: &str, content: &str) -> Result<Option<String>, ChatError>;
}

pub struct JournalChatClient {
    http: Client,
    endpoint: Url,
}

impl JournalChatClient {
    /// Clients on [`DEFAULT_TIMEOUT`] share one connection pool.
    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = parse_endpoint(endpoint)?;
        let http = if timeout == DEFAULT_TIMEOUT {
            SHARED_HTTP.clone()
        } else {
            Client::builder()
                .timeout(timeout)
                .pool_max_idle_per_host(2)
                .build()
                .context("failed to build HTTP client")?
        };
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn parse_endpoint(endpoint: &str) -> Result<Url> {
    let url = Url::parse(endpoint.trim())
        .with_context(|| format!("invalid chat endpoint URL: {}", endpoint))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(anyhow!("unsupported chat endpoint scheme: {}", other)),
    }
}

#[async_trait::async_trait]
impl ChatCompletion for JournalChatClient {
    async fn complete(&self, message: &str, content: &str) -> Result<Option<String>, ChatError> {
        let req = JournalChatRequest { message, content };
        let resp = self
            .http
            .post(self.endpoint.clone())
            .json(&req)
            .send()
            .await
            .map_err(|e| ChatError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "journal chat endpoint returned an error status");
            return Err(ChatError::Status(status.as_u16()));
        }

        let body: JournalChatResponse = resp
            .json()
            .await
            .map_err(|e| ChatError::Decode(e.to_string()))?;

        match body.error.filter(|e| !e.is_empty()) {
            Some(error) => Err(ChatError::Remote(error)),
            None => Ok(body.response),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::mpsc;
    use std::thread;

    /// Serve exactly one request, reporting the body it received.
    fn serve_once(status: u16, body: &'static str) -> (String, mpsc::Receiver<String>) {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let port = server.server_addr().to_ip().unwrap().port();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            if let Ok(mut request) = server.recv() {
                let mut received = String::new();
                let _ = request.as_reader().read_to_string(&mut received);
                let _ = tx.send(received);
                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .unwrap();
                let response = tiny_http::Response::from_string(body)
                    .with_status_code(status)
                    .with_header(header);
                let _ = request.respond(response);
            }
        });
        (format!("http://127.0.0.1:{}/api/journal-chat", port), rx)
    }

    #[tokio::test]
    async fn test_successful_reply() {
        let (url, rx) = serve_once(200, r#"{"response":"Hello"}"#);
        let client = JournalChatClient::with_timeout(&url, DEFAULT_TIMEOUT).unwrap();

        let reply = client.complete("how was my day?", "Went hiking.").await;
        assert_eq!(reply, Ok(Some("Hello".to_string())));

        let sent: serde_json::Value = serde_json::from_str(&rx.recv().unwrap()).unwrap();
        assert_eq!(sent["message"], "how was my day?");
        assert_eq!(sent["content"], "Went hiking.");
    }

    #[tokio::test]
    async fn test_missing_response_field() {
        let (url, _rx) = serve_once(200, "{}");
        let client = JournalChatClient::with_timeout(&url, DEFAULT_TIMEOUT).unwrap();
        assert_eq!(client.complete("hi", "").await, Ok(None));
    }

    #[tokio::test]
    async fn test_http_status_error() {
        let (url, _rx) = serve_once(500, r#"{"error":"boom"}"#);
        let client = JournalChatClient::with_timeout(&url, DEFAULT_TIMEOUT).unwrap();
        assert_eq!(client.complete("hi", "").await, Err(ChatError::Status(500)));
    }

    #[tokio::test]
    async fn test_payload_error() {
        let (url, _rx) = serve_once(200, r#"{"error":"model overloaded"}"#);
        let client = JournalChatClient::with_timeout(&url, DEFAULT_TIMEOUT).unwrap();
        assert_eq!(
            client.complete("hi", "").await,
            Err(ChatError::Remote("model overloaded".to_string()))
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        // Bind then drop to get a port nobody is listening on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client =
            JournalChatClient::with_timeout(&format!("http://127.0.0.1:{}/", port), Duration::from_secs(5))
                .unwrap();
        assert!(matches!(
            client.complete("hi", "").await,
            Err(ChatError::Transport(_))
        ));
    }

    #[test]
    fn test_rejects_bad_endpoints() {
        assert!(JournalChatClient::with_timeout("not a url", DEFAULT_TIMEOUT).is_err());
        assert!(JournalChatClient::with_timeout("ftp://example.com/chat", DEFAULT_TIMEOUT).is_err());
        assert!(JournalChatClient::with_timeout(" https://example.com/chat ", DEFAULT_TIMEOUT).is_ok());
    }
}
