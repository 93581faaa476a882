use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A post-created callback payload (spec.md §6 "Chat event surface").
#[derive(Clone, Debug, Deserialize)]
pub struct PostCreatedEvent {
    pub id: String,
    pub user_id: String,
    pub channel_id: String,
    pub root_post_id: String,
    pub message: String,
    #[serde(default)]
    pub file_ids: Vec<String>,
    #[serde(default)]
    pub props: HashMap<String, serde_json::Value>,
    /// True for system messages, other bots, or webhook-originated posts — the launch
    /// pipeline fast-rejects these without looking at `message` (spec.md §4.F).
    #[serde(default)]
    pub should_ignore: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub channel_id: String,
    pub root_id: String,
    pub user_id: String,
    pub message: String,
    #[serde(default)]
    pub props: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

/// One action button on an [`Attachment`] (e.g. the context-review Accept/Reject/Iterate
/// controls, spec.md §4.H).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AttachmentAction {
    pub id: String,
    pub name: String,
    /// Interactive-dialog/action endpoint this action posts to (out of scope here; the
    /// dispatcher living in `orchestrator` owns interpretation).
    pub integration_url: String,
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Attachment {
    pub text: String,
    #[serde(default)]
    pub pretext: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub actions: Vec<AttachmentAction>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub display_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileInfo {
    pub id: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DialogElement {
    pub name: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DialogSpec {
    pub callback_id: String,
    pub title: String,
    pub elements: Vec<DialogElement>,
    pub submit_label: String,
}
