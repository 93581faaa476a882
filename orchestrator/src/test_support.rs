//! Shared test doubles for the orchestrator's `#[cfg(test)]` suites, so `launch`, `api`, and
//! `actions` don't each redefine the same scripted transport and recording host.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chat_host::{Attachment, ChatHostError, DialogSpec, FileInfo, Post, User};
use scm_client::{IssueComment, PullRequest, Review, ReviewComment, ScmClient, ScmError};
use store::SqliteKv;

use crate::state::Orchestrator;

pub(crate) struct ScriptedTransport {
    pub(crate) responses: Mutex<Vec<Result<agent_client::RawResponse, String>>>,
    pub(crate) calls: AtomicUsize,
}

impl ScriptedTransport {
    pub(crate) fn new(responses: Vec<Result<agent_client::RawResponse, String>>) -> Self {
        Self { responses: Mutex::new(responses), calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl agent_client::Transport for ScriptedTransport {
    async fn send(&self, _method: &str, _url: &str, _api_key: &str, _body: Option<&serde_json::Value>) -> Result<agent_client::RawResponse, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses.lock().unwrap().remove(0)
    }
}

pub(crate) fn ok(body: &str) -> Result<agent_client::RawResponse, String> {
    Ok(agent_client::RawResponse { status: 200, body: body.to_string() })
}

pub(crate) struct NoopScm;

#[async_trait]
impl ScmClient for NoopScm {
    async fn list_review_comments(&self, _: &str, _: &str, _: u64, _: std::time::Duration) -> Result<Vec<ReviewComment>, ScmError> {
        Ok(Vec::new())
    }
    async fn list_reviews(&self, _: &str, _: &str, _: u64, _: std::time::Duration) -> Result<Vec<Review>, ScmError> {
        Ok(Vec::new())
    }
    async fn list_issue_comments(&self, _: &str, _: &str, _: u64, _: std::time::Duration) -> Result<Vec<IssueComment>, ScmError> {
        Ok(Vec::new())
    }
    async fn request_reviewers(&self, _: &str, _: &str, _: u64, _: &[String], _: std::time::Duration) -> Result<(), ScmError> {
        Ok(())
    }
    async fn mark_pr_ready_for_review(&self, _: &str, _: &str, _: &str, _: std::time::Duration) -> Result<(), ScmError> {
        Ok(())
    }
    async fn create_comment(&self, _: &str, _: &str, _: u64, _: &str, _: std::time::Duration) -> Result<(), ScmError> {
        Ok(())
    }
    async fn reply_to_review_comment(&self, _: &str, _: &str, _: u64, _: u64, _: &str, _: std::time::Duration) -> Result<(), ScmError> {
        Ok(())
    }
    async fn get_pull_request_by_branch(&self, _: &str, _: &str, _: &str, _: std::time::Duration) -> Result<PullRequest, ScmError> {
        Err(ScmError::NoPullRequestForBranch("unused".to_string()))
    }
}

#[derive(Default)]
pub(crate) struct RecordingHost {
    pub(crate) created: Mutex<Vec<String>>,
}

#[async_trait]
impl chat_host::ChatHost for RecordingHost {
    async fn create_post(&self, channel_id: &str, root_id: &str, message: &str, attachments: Vec<Attachment>) -> Result<Post, ChatHostError> {
        self.created.lock().unwrap().push(message.to_string());
        Ok(Post { id: "bot-post".into(), channel_id: channel_id.into(), root_id: root_id.into(), user_id: "bot".into(), message: message.into(), props: Default::default(), attachments })
    }
    async fn update_post(&self, post_id: &str, message: &str, attachments: Vec<Attachment>) -> Result<Post, ChatHostError> {
        Ok(Post { id: post_id.into(), channel_id: "c1".into(), root_id: String::new(), user_id: "bot".into(), message: message.into(), props: Default::default(), attachments })
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
    async fn publish_event(&self, _topic: &str, _target_user_id: &str, _payload: serde_json::Value) -> Result<(), ChatHostError> {
        Ok(())
    }
    async fn open_dialog(&self, _trigger_id: &str, _dialog: DialogSpec) -> Result<(), ChatHostError> {
        Ok(())
    }
}

pub(crate) fn set_test_config() {
    let mut cfg = config::AppConfig::default();
    cfg.agent_api_key = Some("sk-test".to_string());
    cfg.default_repository = Some("o/r".to_string());
    config::set_global(cfg);
}

pub(crate) fn orchestrator_with(transport: Arc<ScriptedTransport>) -> Orchestrator {
    set_test_config();
    let store = Arc::new(store::Store::new(Arc::new(SqliteKv::open_in_memory().unwrap())));
    let client = Arc::new(agent_client::Client::with_transport("https://agents.example.com", "key", transport));
    Orchestrator::new(store, Arc::new(RecordingHost::default()), client, Arc::new(NoopScm), "@cursor")
}

/// An orchestrator with no scripted agent-client responses queued, for tests that never call out.
pub(crate) fn test_orchestrator() -> (Orchestrator, Arc<ScriptedTransport>) {
    let transport = Arc::new(ScriptedTransport::new(Vec::new()));
    (orchestrator_with(transport.clone()), transport)
}
