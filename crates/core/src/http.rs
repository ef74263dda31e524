//! Thin wrapper around the backend REST API.
//!
//! Every request carries `Authorization: Bearer <token>` when the
//! durable store holds a token. Failures of any kind come back as a
//! [`TransportError`].

use std::time::Duration;

use reqwest::{multipart, Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{config::ApiConfig, error::TransportError, store::TokenStore};

/// Backend client shared by the session, prediction and billing components.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    tokens: TokenStore,
    logout_on_unauthorized: bool,
}

impl HttpClient {
    /// Build a client from API settings and the shared token store.
    pub fn new(config: &ApiConfig, tokens: TokenStore) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .map_err(|err| TransportError::Request(err.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tokens,
            logout_on_unauthorized: config.logout_on_unauthorized,
        })
    }

    /// Base address endpoints are resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Token store consulted on every request.
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// `GET` a JSON document.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        let request = self.client.get(self.url(path));
        self.send(request).await
    }

    /// `POST` a JSON body and decode the JSON reply.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.client.post(self.url(path)).json(body);
        self.send(request).await
    }

    /// `POST` a multipart form and decode the JSON reply.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        path: &str,
        form: multipart::Form,
    ) -> Result<T, TransportError> {
        let request = self.client.post(self.url(path)).multipart(form);
        self.send(request).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, TransportError> {
        let request = match self.tokens.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let request = request.header(reqwest::header::ACCEPT, "application/json");

        let response = request.send().await?;
        let response = self.check_status(response).await?;
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|err| TransportError::Decode(err.to_string()))
    }

    async fn check_status(&self, response: Response) -> Result<Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED {
            warn!(%url, "backend rejected credentials");
            if self.logout_on_unauthorized {
                if let Err(err) = self.tokens.clear_token() {
                    warn!("failed to clear token after 401: {err}");
                }
            }
            return Err(TransportError::Unauthorized {
                detail: extract_detail(&body),
            });
        }

        let detail = extract_detail(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown status")
                .to_string()
        });
        debug!(%url, %status, %detail, "backend request failed");
        Err(TransportError::Status { status, detail })
    }
}

/// Pull the human-readable `detail` out of an error body.
///
/// Handles both `{"detail": "..."}` and `{"detail": {"error": "..."}}`.
fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(text) => Some(text.clone()),
        Value::Object(map) => map
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| Some(Value::Object(map.clone()).to_string())),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! One-shot HTTP responder standing in for the backend.

    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        task::JoinHandle,
    };

    use crate::{config::ApiConfig, store::TokenStore};

    use super::HttpClient;

    /// Serve exactly one request with `status` and a JSON `body`.
    ///
    /// The join handle yields the raw request head and body as received.
    pub async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept connection");
            let request = read_request(&mut stream).await;
            stream
                .write_all(response.as_bytes())
                .await
                .expect("write response");
            let _ = stream.shutdown().await;
            request
        });
        (format!("http://{addr}/api"), handle)
    }

    async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let read = stream.read(&mut buf).await.unwrap_or(0);
            if read == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..read]);
            let text = String::from_utf8_lossy(&raw);
            if let Some(head_end) = text.find("\r\n\r\n") {
                let expected = content_length(&text[..head_end]);
                if raw.len() >= head_end + 4 + expected {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&raw).to_string()
    }

    fn content_length(head: &str) -> usize {
        head.lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                if name.eq_ignore_ascii_case("content-length") {
                    value.trim().parse().ok()
                } else {
                    None
                }
            })
            .unwrap_or(0)
    }

    /// Base URL nothing is listening on.
    pub async fn unreachable_base_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        drop(listener);
        format!("http://{addr}/api")
    }

    /// Client pointed at `base_url` with a short timeout.
    pub fn client(base_url: &str, tokens: TokenStore) -> HttpClient {
        let config = ApiConfig {
            base_url: base_url.to_string(),
            request_timeout_secs: 5,
            logout_on_unauthorized: true,
        };
        HttpClient::new(&config, tokens).expect("build client")
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{client, serve_once, unreachable_base_url};
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn attaches_bearer_token_when_present() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let tokens = TokenStore::new(dir.path().join("session.json"));
        tokens.set_token("secret-token")?;

        let (base, handle) = serve_once("200 OK", r#"{"ok":true}"#).await;
        let http = client(&base, tokens);
        let reply: Value = http.get_json("/predict/latest").await?;
        assert_eq!(reply, json!({"ok": true}));

        let request = handle.await?;
        assert!(request.starts_with("GET /api/predict/latest "));
        assert!(request
            .to_ascii_lowercase()
            .contains("authorization: bearer secret-token"));
        Ok(())
    }

    #[tokio::test]
    async fn omits_authorization_without_token() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let tokens = TokenStore::new(dir.path().join("session.json"));

        let (base, handle) = serve_once("200 OK", "{}").await;
        let http = client(&base, tokens);
        let body = json!({"plan": "monthly"});
        let _: Value = http.post_json("billing/create-checkout-session", &body).await?;

        let request = handle.await?;
        assert!(request.starts_with("POST /api/billing/create-checkout-session "));
        assert!(!request.to_ascii_lowercase().contains("authorization:"));
        assert!(request.contains(r#"{"plan":"monthly"}"#));
        Ok(())
    }

    #[tokio::test]
    async fn unauthorized_clears_persisted_token() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let tokens = TokenStore::new(dir.path().join("session.json"));
        tokens.set_token("stale")?;

        let (base, handle) = serve_once("401 Unauthorized", r#"{"detail":"expired"}"#).await;
        let http = client(&base, tokens.clone());
        let result: Result<Value, _> = http.get_json("/predict/latest").await;
        handle.await?;

        match result {
            Err(err @ TransportError::Unauthorized { .. }) => {
                assert_eq!(err.detail(), Some("expired"));
            }
            other => panic!("expected unauthorized, got {other:?}"),
        }
        assert_eq!(tokens.token(), None);
        Ok(())
    }

    #[tokio::test]
    async fn status_errors_carry_server_detail() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let tokens = TokenStore::new(dir.path().join("session.json"));

        let (base, handle) =
            serve_once("400 Bad Request", r#"{"detail":"Invalid date format"}"#).await;
        let http = client(&base, tokens);
        let result: Result<Value, _> = http.get_json("/upload").await;
        handle.await?;

        match result {
            Err(err @ TransportError::Status { .. }) => {
                assert_eq!(err.detail(), Some("Invalid date format"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let tokens = TokenStore::new(dir.path().join("session.json"));

        let (base, handle) = serve_once("200 OK", "<html>").await;
        let http = client(&base, tokens);
        let result: Result<Value, _> = http.get_json("/predict/latest").await;
        handle.await?;
        assert!(matches!(result, Err(TransportError::Decode(_))));
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_backend_is_transport_error() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let tokens = TokenStore::new(dir.path().join("session.json"));
        let http = client(&unreachable_base_url().await, tokens);
        let result: Result<Value, _> = http.get_json("/predict/latest").await;
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn detail_extraction_handles_nested_errors() {
        assert_eq!(
            extract_detail(r#"{"detail":{"error":"Invalid plan","status":"validation_error"}}"#)
                .as_deref(),
            Some("Invalid plan")
        );
        assert_eq!(extract_detail("not json"), None);
        assert_eq!(extract_detail(r#"{"message":"x"}"#), None);
    }
}
