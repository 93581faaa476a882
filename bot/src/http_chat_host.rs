//! Generic HTTP bridge to the chat host (spec.md §1 treats the chat-host API itself as an
//! external collaborator; this is the thin transport the binary needs to actually run one,
//! not an implementation of any particular host's wire format). Grounded on the
//! `ReqwestHttpClient` shape: one `reqwest::Client`, JSON in, JSON out, errors mapped to a
//! single string.

use async_trait::async_trait;
use chat_host::{Attachment, ChatHost, ChatHostError, DialogSpec, FileInfo, Post, User};
use serde_json::json;

pub struct HttpChatHost {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl HttpChatHost {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.bearer_auth(&self.token)
    }

    async fn send_json<T: serde::de::DeserializeOwned>(&self, builder: reqwest::RequestBuilder) -> Result<T, ChatHostError> {
        let resp = self.auth(builder).send().await.map_err(|e| ChatHostError::Request(e.to_string()))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ChatHostError::PostNotFound(resp.url().to_string()));
        }
        let resp = resp.error_for_status().map_err(|e| ChatHostError::Request(e.to_string()))?;
        resp.json().await.map_err(|e| ChatHostError::Request(e.to_string()))
    }
}

#[async_trait]
impl ChatHost for HttpChatHost {
    async fn create_post(&self, channel_id: &str, root_id: &str, message: &str, attachments: Vec<Attachment>) -> Result<Post, ChatHostError> {
        let body = json!({ "channel_id": channel_id, "root_id": root_id, "message": message, "attachments": attachments });
        self.send_json(self.http.post(self.url("/posts")).json(&body)).await
    }

    async fn update_post(&self, post_id: &str, message: &str, attachments: Vec<Attachment>) -> Result<Post, ChatHostError> {
        let body = json!({ "message": message, "attachments": attachments });
        self.send_json(self.http.put(self.url(&format!("/posts/{post_id}"))).json(&body)).await
    }

    async fn set_post_props(&self, post_id: &str, props: serde_json::Value) -> Result<(), ChatHostError> {
        self.auth(self.http.patch(self.url(&format!("/posts/{post_id}/props"))).json(&props))
            .send()
            .await
            .map_err(|e| ChatHostError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| ChatHostError::Request(e.to_string()))?;
        Ok(())
    }

    async fn add_reaction(&self, post_id: &str, emoji: &str) -> Result<(), ChatHostError> {
        self.auth(self.http.post(self.url(&format!("/posts/{post_id}/reactions/{emoji}"))))
            .send()
            .await
            .map_err(|e| ChatHostError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| ChatHostError::Request(e.to_string()))?;
        Ok(())
    }

    async fn remove_reaction(&self, post_id: &str, emoji: &str) -> Result<(), ChatHostError> {
        self.auth(self.http.delete(self.url(&format!("/posts/{post_id}/reactions/{emoji}"))))
            .send()
            .await
            .map_err(|e| ChatHostError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| ChatHostError::Request(e.to_string()))?;
        Ok(())
    }

    async fn get_post(&self, post_id: &str) -> Result<Post, ChatHostError> {
        self.send_json(self.http.get(self.url(&format!("/posts/{post_id}")))).await
    }

    async fn get_post_thread(&self, root_id: &str) -> Result<Vec<Post>, ChatHostError> {
        self.send_json(self.http.get(self.url(&format!("/posts/{root_id}/thread")))).await
    }

    async fn get_user(&self, user_id: &str) -> Result<User, ChatHostError> {
        self.send_json(self.http.get(self.url(&format!("/users/{user_id}")))).await
    }

    async fn get_file(&self, file_id: &str) -> Result<FileInfo, ChatHostError> {
        self.send_json(self.http.get(self.url(&format!("/files/{file_id}")))).await
    }

    async fn get_file_bytes(&self, file_id: &str) -> Result<Vec<u8>, ChatHostError> {
        let resp = self
            .auth(self.http.get(self.url(&format!("/files/{file_id}/content"))))
            .send()
            .await
            .map_err(|e| ChatHostError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| ChatHostError::Request(e.to_string()))?;
        Ok(resp.bytes().await.map_err(|e| ChatHostError::Request(e.to_string()))?.to_vec())
    }

    async fn publish_event(&self, topic: &str, target_user_id: &str, payload: serde_json::Value) -> Result<(), ChatHostError> {
        let body = json!({ "topic": topic, "target_user_id": target_user_id, "payload": payload });
        self.auth(self.http.post(self.url("/events")).json(&body))
            .send()
            .await
            .map_err(|e| ChatHostError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| ChatHostError::Request(e.to_string()))?;
        Ok(())
    }

    async fn open_dialog(&self, trigger_id: &str, dialog: DialogSpec) -> Result<(), ChatHostError> {
        let body = json!({ "trigger_id": trigger_id, "dialog": dialog });
        self.auth(self.http.post(self.url("/dialogs")).json(&body))
            .send()
            .await
            .map_err(|e| ChatHostError::Request(e.to_string()))?
            .error_for_status()
            .map_err(|e| ChatHostError::Request(e.to_string()))?;
        Ok(())
    }
}
