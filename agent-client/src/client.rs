//! Retry/backoff policy (spec.md §4.C) wrapped around a [`Transport`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ClientError;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::*;

/// Statuses that are retried rather than surfaced immediately (spec.md §4.C).
const RETRYABLE_STATUSES: &[u16] = &[429, 500, 502, 503, 504];
const MAX_ATTEMPTS: u32 = 3;
const BACKOFFS: [Duration; 3] = [Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)];

/// A caller-supplied request deadline (spec.md §5: 15s for reads, 30s for launches/follow-ups).
#[derive(Clone, Copy, Debug)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(duration: Duration) -> Self {
        Self(Instant::now() + duration)
    }

    pub fn has_elapsed(&self) -> bool {
        Instant::now() >= self.0
    }
}

pub struct Client {
    base_url: String,
    api_key: String,
    transport: Arc<dyn Transport>,
}

impl Client {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            transport: Arc::new(ReqwestTransport::new()),
        }
    }

    pub fn with_transport(base_url: impl Into<String>, api_key: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            transport,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Sends one logical request, retrying transport errors and `RETRYABLE_STATUSES` up to
    /// `MAX_ATTEMPTS` times with the fixed backoff schedule, never retrying past `deadline`.
    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<&Value>,
        deadline: Deadline,
    ) -> Result<String, ClientError> {
        let url = self.url(path);
        let mut last_err = None;

        for attempt in 0..MAX_ATTEMPTS {
            if deadline.has_elapsed() {
                return Err(ClientError::DeadlineExceeded);
            }

            match self.transport.send(method, &url, &self.api_key, body).await {
                Ok(resp) if (200..300).contains(&resp.status) => return Ok(resp.body),
                Ok(resp) if RETRYABLE_STATUSES.contains(&resp.status) => {
                    tracing::debug!(status = resp.status, attempt, "agent api retryable status");
                    last_err = Some(ClientError::Api {
                        status: resp.status,
                        message: format!("retryable status {}", resp.status),
                        raw_body: resp.body,
                    });
                }
                Ok(resp) => {
                    return Err(ClientError::Api {
                        status: resp.status,
                        message: format!("status {}", resp.status),
                        raw_body: resp.body,
                    });
                }
                Err(e) => {
                    tracing::debug!(error = %e, attempt, "agent api transport error");
                    last_err = Some(ClientError::Transport(e));
                }
            }

            if attempt + 1 < MAX_ATTEMPTS {
                let backoff = BACKOFFS[attempt as usize];
                if deadline.has_elapsed() {
                    break;
                }
                tokio::time::sleep(backoff).await;
            }
        }

        Err(last_err.unwrap_or(ClientError::DeadlineExceeded))
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
        body: Option<&Value>,
        deadline: Deadline,
    ) -> Result<T, ClientError> {
        let raw = self.request(method, path, body, deadline).await?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub async fn launch_agent(&self, req: &LaunchRequest, deadline: Deadline) -> Result<AgentResponse, ClientError> {
        let body = serde_json::to_value(req)?;
        self.request_json("POST", "/v0/agents", Some(&body), deadline).await
    }

    pub async fn get_agent(&self, id: &str, deadline: Deadline) -> Result<AgentResponse, ClientError> {
        self.request_json("GET", &format!("/v0/agents/{id}"), None, deadline).await
    }

    pub async fn list_agents(
        &self,
        limit: u32,
        cursor: Option<&str>,
        deadline: Deadline,
    ) -> Result<ListAgentsResponse, ClientError> {
        let path = match cursor {
            Some(c) => format!("/v0/agents?limit={limit}&cursor={c}"),
            None => format!("/v0/agents?limit={limit}"),
        };
        self.request_json("GET", &path, None, deadline).await
    }

    pub async fn add_followup(&self, id: &str, prompt: &str, deadline: Deadline) -> Result<AgentResponse, ClientError> {
        let body = serde_json::to_value(AddFollowupRequest {
            prompt: prompt.to_string(),
        })?;
        self.request_json("POST", &format!("/v0/agents/{id}/followup"), Some(&body), deadline)
            .await
    }

    pub async fn get_conversation(&self, id: &str, deadline: Deadline) -> Result<ConversationResponse, ClientError> {
        self.request_json("GET", &format!("/v0/agents/{id}/conversation"), None, deadline)
            .await
    }

    pub async fn stop_agent(&self, id: &str, deadline: Deadline) -> Result<(), ClientError> {
        self.request("POST", &format!("/v0/agents/{id}/stop"), None, deadline).await?;
        Ok(())
    }

    pub async fn delete_agent(&self, id: &str, deadline: Deadline) -> Result<(), ClientError> {
        self.request("DELETE", &format!("/v0/agents/{id}"), None, deadline).await?;
        Ok(())
    }

    pub async fn list_models(&self, deadline: Deadline) -> Result<ListModelsResponse, ClientError> {
        self.request_json("GET", "/v0/models", None, deadline).await
    }

    pub async fn get_me(&self, deadline: Deadline) -> Result<MeResponse, ClientError> {
        self.request_json("GET", "/v0/me", None, deadline).await
    }
}
