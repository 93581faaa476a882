//! REST-surface operations (spec.md §6): thin, store-backed methods that `serve`'s axum handlers
//! call directly. Kept here rather than in `serve` so the orchestration logic (what a cancel or
//! an archive actually does to an `AgentRecord`) lives with the rest of the state machine.

use std::time::Duration;

use agent_client::Deadline;
use store::{AgentRecord, ChannelSettings, HitlWorkflow, ReviewLoop, UserSettings};

use crate::error::OrchestratorError;
use crate::state::Orchestrator;

const FOLLOWUP_DEADLINE: Duration = Duration::from_secs(30);
const STOP_DEADLINE: Duration = Duration::from_secs(15);

impl Orchestrator {
    pub async fn list_agents(&self, user_id: &str) -> Result<Vec<AgentRecord>, OrchestratorError> {
        Ok(self.store.list_user_agents(user_id).await?)
    }

    pub async fn get_agent(&self, cursor_agent_id: &str) -> Result<Option<AgentRecord>, OrchestratorError> {
        Ok(self.store.get_agent(cursor_agent_id).await?)
    }

    pub async fn get_workflow(&self, id: &str) -> Result<Option<HitlWorkflow>, OrchestratorError> {
        Ok(self.store.get_workflow(id).await?)
    }

    pub async fn get_review_loop(&self, id: &str) -> Result<Option<ReviewLoop>, OrchestratorError> {
        Ok(self.store.get_review_loop(id).await?)
    }

    /// `POST /agents/{id}/followup` (spec.md §6): relays free-text to the running remote agent
    /// without touching the stored record's status — the poller's next tick reconciles it.
    pub async fn followup_agent(&self, cursor_agent_id: &str, prompt: &str) -> Result<(), OrchestratorError> {
        self.store
            .get_agent(cursor_agent_id)
            .await?
            .ok_or_else(|| OrchestratorError::AgentNotFound(cursor_agent_id.to_string()))?;
        self.agent_client
            .add_followup(cursor_agent_id, prompt, Deadline::after(FOLLOWUP_DEADLINE))
            .await?;
        Ok(())
    }

    /// `POST /agents/{id}/cancel` (spec.md §6): mirrors the `"cancel_agent"` interactive action
    /// but addressed directly by id rather than via a button's context map.
    pub async fn cancel_agent(&self, cursor_agent_id: &str) -> Result<(), OrchestratorError> {
        let mut agent = self
            .store
            .get_agent(cursor_agent_id)
            .await?
            .ok_or_else(|| OrchestratorError::AgentNotFound(cursor_agent_id.to_string()))?;
        let _ = self.agent_client.stop_agent(cursor_agent_id, Deadline::after(STOP_DEADLINE)).await;
        agent.status = store::AgentStatus::Stopped;
        agent.updated_at = now_ms();
        self.store.save_agent(&agent).await?;
        if let Some(post_id) = &agent.bot_reply_post_id {
            let attachment = notify::stopped_attachment(&agent);
            let _ = self.chat_host.update_post(post_id, "", vec![attachment]).await;
        }
        let _ = self.hitl.cancel_by_agent(cursor_agent_id).await;
        Ok(())
    }

    pub async fn archive_agent(&self, cursor_agent_id: &str) -> Result<(), OrchestratorError> {
        self.set_archived(cursor_agent_id, true).await
    }

    pub async fn unarchive_agent(&self, cursor_agent_id: &str) -> Result<(), OrchestratorError> {
        self.set_archived(cursor_agent_id, false).await
    }

    async fn set_archived(&self, cursor_agent_id: &str, archived: bool) -> Result<(), OrchestratorError> {
        let mut agent = self
            .store
            .get_agent(cursor_agent_id)
            .await?
            .ok_or_else(|| OrchestratorError::AgentNotFound(cursor_agent_id.to_string()))?;
        agent.archived = archived;
        agent.updated_at = now_ms();
        self.store.save_agent(&agent).await?;
        Ok(())
    }

    /// `POST /dialog/settings` (spec.md §4.L, §6): persists whichever of channel/user defaults
    /// the submitted dialog carried. Both are optional since the same endpoint backs a
    /// channel-scoped and a user-scoped settings dialog.
    pub async fn save_settings(
        &self,
        channel_id: &str,
        user_id: &str,
        channel: Option<ChannelSettings>,
        user: Option<UserSettings>,
    ) -> Result<(), OrchestratorError> {
        if let Some(channel) = channel {
            self.store.save_channel_settings(channel_id, &channel).await?;
        }
        if let Some(user) = user {
            self.store.save_user_settings(user_id, &user).await?;
        }
        Ok(())
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_orchestrator;

    #[tokio::test]
    async fn archive_then_unarchive_round_trips() {
        let (orch, _transport) = test_orchestrator();
        let agent = AgentRecord::new("a1", "t1", "p1", "c1", "u1", "o/r", "cursor/fix", "fix it", "auto");
        orch.store.save_agent(&agent).await.unwrap();

        orch.archive_agent("a1").await.unwrap();
        assert!(orch.get_agent("a1").await.unwrap().unwrap().archived);

        orch.unarchive_agent("a1").await.unwrap();
        assert!(!orch.get_agent("a1").await.unwrap().unwrap().archived);
    }

    #[tokio::test]
    async fn cancel_unknown_agent_reports_not_found() {
        let (orch, _transport) = test_orchestrator();
        let err = orch.cancel_agent("missing").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::AgentNotFound(_)));
    }

    #[tokio::test]
    async fn followup_unknown_agent_reports_not_found() {
        let (orch, _transport) = test_orchestrator();
        let err = orch.followup_agent("missing", "keep going").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::AgentNotFound(_)));
    }
}
