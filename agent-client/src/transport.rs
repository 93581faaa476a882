//! HTTP transport abstraction (grounded on the teacher's `HttpClient`/`ReqwestHttpClient`
//! pair): swappable so the retry/deadline policy in [`crate::client`] can be tested without a
//! network.

use async_trait::async_trait;
use serde_json::Value;

#[derive(Clone, Debug)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs one HTTP attempt. A transport error (connect/TLS/timeout, never a non-2xx
    /// status) is returned as `Err`; a non-2xx status is returned as `Ok` so the retry policy
    /// can inspect the status code.
    async fn send(&self, method: &str, url: &str, api_key: &str, body: Option<&Value>) -> Result<RawResponse, String>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, method: &str, url: &str, api_key: &str, body: Option<&Value>) -> Result<RawResponse, String> {
        let method = method
            .parse::<reqwest::Method>()
            .map_err(|e| format!("invalid method {method}: {e}"))?;
        let mut req = self.client.request(method, url).basic_auth(api_key, Some(""));
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await.map_err(|e| e.to_string())?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| e.to_string())?;
        Ok(RawResponse { status, body })
    }
}
