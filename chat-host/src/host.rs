//! The `ChatHost` trait (spec.md §6 "Commands (core→host)"). Grounded on the teacher's
//! `HttpClient`/`ReqwestHttpClient` seam pattern: every outbound boundary is a trait so the
//! orchestration logic that drives it can be tested without a live host.

use async_trait::async_trait;

use crate::error::ChatHostError;
use crate::types::{Attachment, DialogSpec, FileInfo, Post, User};

#[async_trait]
pub trait ChatHost: Send + Sync {
    async fn create_post(&self, channel_id: &str, root_id: &str, message: &str, attachments: Vec<Attachment>) -> Result<Post, ChatHostError>;

    /// Replaces `post_id`'s attachments wholesale (spec.md §6: "Post updates targeting
    /// `bot_reply_post_id` replace its attachments wholesale").
    async fn update_post(&self, post_id: &str, message: &str, attachments: Vec<Attachment>) -> Result<Post, ChatHostError>;

    /// Merges `props` into the post's existing props (spec.md §6: "props are used for
    /// cross-surface filtering").
    async fn set_post_props(&self, post_id: &str, props: serde_json::Value) -> Result<(), ChatHostError>;

    async fn add_reaction(&self, post_id: &str, emoji: &str) -> Result<(), ChatHostError>;
    async fn remove_reaction(&self, post_id: &str, emoji: &str) -> Result<(), ChatHostError>;

    async fn get_post(&self, post_id: &str) -> Result<Post, ChatHostError>;
    async fn get_post_thread(&self, root_id: &str) -> Result<Vec<Post>, ChatHostError>;
    async fn get_user(&self, user_id: &str) -> Result<User, ChatHostError>;
    async fn get_file(&self, file_id: &str) -> Result<FileInfo, ChatHostError>;
    async fn get_file_bytes(&self, file_id: &str) -> Result<Vec<u8>, ChatHostError>;

    /// Publishes `payload` to `target_user_id` under `topic` (spec.md §6 "Published events",
    /// built by [`stream_event::Envelope`]).
    async fn publish_event(&self, topic: &str, target_user_id: &str, payload: serde_json::Value) -> Result<(), ChatHostError>;

    async fn open_dialog(&self, trigger_id: &str, dialog: DialogSpec) -> Result<(), ChatHostError>;
}

/// Convenience for publishing a typed [`stream_event::PluginEvent`] through a [`ChatHost`].
pub async fn publish(host: &dyn ChatHost, plugin_id: &str, target_user_id: &str, event: &stream_event::PluginEvent) -> Result<(), ChatHostError> {
    let envelope = stream_event::Envelope::new(plugin_id, target_user_id, event)
        .map_err(|e| ChatHostError::Request(e.to_string()))?;
    host.publish_event(&envelope.topic, &envelope.target_user_id, envelope.payload).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHost {
        published: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ChatHost for RecordingHost {
        async fn create_post(&self, _channel_id: &str, _root_id: &str, _message: &str, _attachments: Vec<Attachment>) -> Result<Post, ChatHostError> {
            unimplemented!()
        }
        async fn update_post(&self, _post_id: &str, _message: &str, _attachments: Vec<Attachment>) -> Result<Post, ChatHostError> {
            unimplemented!()
        }
        async fn set_post_props(&self, _post_id: &str, _props: serde_json::Value) -> Result<(), ChatHostError> {
            Ok(())
        }
        async fn add_reaction(&self, _post_id: &str, _emoji: &str) -> Result<(), ChatHostError> {
            Ok(())
        }
        async fn remove_reaction(&self, _post_id: &str, _emoji: &str) -> Result<(), ChatHostError> {
            Ok(())
        }
        async fn get_post(&self, _post_id: &str) -> Result<Post, ChatHostError> {
            unimplemented!()
        }
        async fn get_post_thread(&self, _root_id: &str) -> Result<Vec<Post>, ChatHostError> {
            Ok(Vec::new())
        }
        async fn get_user(&self, _user_id: &str) -> Result<User, ChatHostError> {
            unimplemented!()
        }
        async fn get_file(&self, _file_id: &str) -> Result<FileInfo, ChatHostError> {
            unimplemented!()
        }
        async fn get_file_bytes(&self, _file_id: &str) -> Result<Vec<u8>, ChatHostError> {
            unimplemented!()
        }
        async fn publish_event(&self, topic: &str, target_user_id: &str, _payload: serde_json::Value) -> Result<(), ChatHostError> {
            self.published.lock().unwrap().push((topic.to_string(), target_user_id.to_string()));
            Ok(())
        }
        async fn open_dialog(&self, _trigger_id: &str, _dialog: DialogSpec) -> Result<(), ChatHostError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn publish_builds_envelope_topic_from_event_name() {
        let host = RecordingHost::default();
        let event = stream_event::PluginEvent::AgentCreated {
            cursor_agent_id: "a1".into(),
            channel_id: "c1".into(),
            post_id: "p1".into(),
            updated_at: "0".into(),
        };
        publish(&host, "cursor_bridge", "u1", &event).await.unwrap();
        let published = host.published.lock().unwrap();
        assert_eq!(published[0], ("custom_cursor_bridge_agent_created".to_string(), "u1".to_string()));
    }
}
