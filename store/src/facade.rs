//! Typed façade over [`crate::kv`] (spec.md §4.A). Every `save_*` method maintains whichever
//! secondary indexes the entity participates in, so the invariants in spec.md §8 hold without
//! callers needing to know the index layout.

use std::sync::Arc;

use crate::error::StoreError;
use crate::keys;
use crate::kv::KvStore;
use crate::types::{
    AgentRecord, AgentStatus, ChannelSettings, HitlWorkflow, ReviewLoop, ThreadRef, UserSettings,
};

pub struct Store {
    kv: Arc<dyn KvStore>,
}

impl Store {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    async fn get_typed<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.kv.get(key).await? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    // --- AgentRecord ---------------------------------------------------

    /// Persists `agent`, adding or removing the active-agent and finished-with-PR index
    /// entries to match its current status (spec.md §8).
    pub async fn save_agent(&self, agent: &AgentRecord) -> Result<(), StoreError> {
        let prior = self.get_agent(&agent.cursor_agent_id).await?;

        self.kv
            .set(&keys::agent_key(&agent.cursor_agent_id), Self::encode(agent)?, None)
            .await?;

        if agent.status.is_active() {
            self.kv
                .set(&keys::idx_active_agent(&agent.cursor_agent_id), Vec::new(), None)
                .await?;
        } else {
            self.kv.delete(&keys::idx_active_agent(&agent.cursor_agent_id)).await?;
        }

        if agent.is_finished_with_pr() {
            self.kv
                .set(
                    &keys::idx_finished_with_pr(&agent.cursor_agent_id),
                    Vec::new(),
                    None,
                )
                .await?;
        } else {
            self.kv
                .delete(&keys::idx_finished_with_pr(&agent.cursor_agent_id))
                .await?;
        }

        self.kv
            .set(
                &keys::idx_user_agent(&agent.user_id, &agent.cursor_agent_id),
                Vec::new(),
                None,
            )
            .await?;

        if let Some(pr_url) = &agent.pr_url {
            self.kv
                .set(
                    &keys::idx_pr_agent(&keys::normalize_pr_url(pr_url)),
                    agent.cursor_agent_id.as_bytes().to_vec(),
                    None,
                )
                .await?;
        }

        // Branch index is keyed by (repository, branch); remove the prior branch's entry if
        // the agent moved branches (rebased to a new branch after a push, for instance).
        if let Some(prior) = &prior {
            if prior.branch != agent.branch || prior.repository != agent.repository {
                self.kv
                    .delete(&keys::idx_branch_agent(&prior.repository, &prior.branch))
                    .await?;
            }
        }
        self.kv
            .set(
                &keys::idx_branch_agent(&agent.repository, &agent.branch),
                agent.cursor_agent_id.as_bytes().to_vec(),
                None,
            )
            .await?;

        self.kv
            .set(
                &keys::idx_thread(&agent.trigger_post_id),
                ThreadRef::Agent(agent.cursor_agent_id.clone()).encode().into_bytes(),
                None,
            )
            .await?;

        Ok(())
    }

    pub async fn get_agent(&self, cursor_agent_id: &str) -> Result<Option<AgentRecord>, StoreError> {
        self.get_typed(&keys::agent_key(cursor_agent_id)).await
    }

    /// All agents currently in the active-agent index (spec.md §4.G poller input).
    pub async fn list_active_agents(&self) -> Result<Vec<AgentRecord>, StoreError> {
        let rows = self.kv.scan_prefix(keys::IDX_ACTIVE_AGENTS_PREFIX).await?;
        let mut out = Vec::with_capacity(rows.len());
        for (key, _) in rows {
            let id = key.trim_start_matches(keys::IDX_ACTIVE_AGENTS_PREFIX);
            if let Some(agent) = self.get_agent(id).await? {
                out.push(agent);
            }
            // An index entry with no backing record is an orphan left by a prior partial
            // write; silently skip it rather than surfacing an error (spec.md §4.A).
        }
        Ok(out)
    }

    /// All agents currently in the finished-with-PR index (spec.md §4.I review-loop seeding).
    pub async fn list_finished_with_pr(&self) -> Result<Vec<AgentRecord>, StoreError> {
        let rows = self.kv.scan_prefix(keys::IDX_FINISHED_WITH_PR_PREFIX).await?;
        let mut out = Vec::with_capacity(rows.len());
        for (key, _) in rows {
            let id = key.trim_start_matches(keys::IDX_FINISHED_WITH_PR_PREFIX);
            if let Some(agent) = self.get_agent(id).await? {
                out.push(agent);
            }
        }
        Ok(out)
    }

    pub async fn get_agent_by_pr_url(&self, pr_url: &str) -> Result<Option<AgentRecord>, StoreError> {
        match self.kv.get(&keys::idx_pr_agent(&keys::normalize_pr_url(pr_url))).await? {
            Some(bytes) => {
                let id = String::from_utf8_lossy(&bytes).to_string();
                self.get_agent(&id).await
            }
            None => Ok(None),
        }
    }

    pub async fn get_agent_by_branch(
        &self,
        repository: &str,
        branch: &str,
    ) -> Result<Option<AgentRecord>, StoreError> {
        match self.kv.get(&keys::idx_branch_agent(repository, branch)).await? {
            Some(bytes) => {
                let id = String::from_utf8_lossy(&bytes).to_string();
                self.get_agent(&id).await
            }
            None => Ok(None),
        }
    }

    pub async fn list_user_agents(&self, user_id: &str) -> Result<Vec<AgentRecord>, StoreError> {
        let rows = self.kv.scan_prefix(&keys::idx_user_agents_prefix(user_id)).await?;
        let mut out = Vec::with_capacity(rows.len());
        for (key, _) in rows {
            let id = key.rsplit(':').next().unwrap_or_default();
            if let Some(agent) = self.get_agent(id).await? {
                out.push(agent);
            }
        }
        Ok(out)
    }

    // --- thread -> (agent | workflow) ----------------------------------

    /// Resolves `thread_id` to an agent id, if the thread maps to a bare agent (as opposed to
    /// a HITL workflow; spec.md §3, §9 thread-ref union).
    pub async fn get_agent_id_by_thread(&self, thread_id: &str) -> Result<Option<String>, StoreError> {
        match self.kv.get(&keys::idx_thread(thread_id)).await? {
            Some(bytes) => match ThreadRef::decode(&String::from_utf8_lossy(&bytes)) {
                ThreadRef::Agent(id) => Ok(Some(id)),
                ThreadRef::Workflow(_) => Ok(None),
            },
            None => Ok(None),
        }
    }

    pub async fn get_workflow_id_by_thread(&self, thread_id: &str) -> Result<Option<String>, StoreError> {
        match self.kv.get(&keys::idx_thread(thread_id)).await? {
            Some(bytes) => match ThreadRef::decode(&String::from_utf8_lossy(&bytes)) {
                ThreadRef::Workflow(id) => Ok(Some(id)),
                ThreadRef::Agent(_) => Ok(None),
            },
            None => Ok(None),
        }
    }

    // --- HitlWorkflow ----------------------------------------------------

    pub async fn save_workflow(&self, workflow: &HitlWorkflow) -> Result<(), StoreError> {
        self.kv
            .set(&keys::workflow_key(&workflow.id), Self::encode(workflow)?, None)
            .await?;
        self.kv
            .set(
                &keys::idx_thread(&workflow.trigger_post_id),
                ThreadRef::Workflow(workflow.id.clone()).encode().into_bytes(),
                None,
            )
            .await?;
        if let Some(implementer_id) = &workflow.implementer_agent_id {
            self.kv
                .set(
                    &keys::idx_agent_workflow(implementer_id),
                    workflow.id.as_bytes().to_vec(),
                    None,
                )
                .await?;
        }
        Ok(())
    }

    pub async fn get_workflow(&self, id: &str) -> Result<Option<HitlWorkflow>, StoreError> {
        self.get_typed(&keys::workflow_key(id)).await
    }

    pub async fn get_workflow_by_agent(&self, agent_id: &str) -> Result<Option<HitlWorkflow>, StoreError> {
        match self.kv.get(&keys::idx_agent_workflow(agent_id)).await? {
            Some(bytes) => self.get_workflow(&String::from_utf8_lossy(&bytes)).await,
            None => Ok(None),
        }
    }

    // --- ReviewLoop ------------------------------------------------------

    pub async fn save_review_loop(&self, review_loop: &ReviewLoop) -> Result<(), StoreError> {
        self.kv
            .set(
                &keys::review_loop_key(&review_loop.id),
                Self::encode(review_loop)?,
                None,
            )
            .await?;
        self.kv
            .set(
                &keys::idx_pr_review_loop(&keys::normalize_pr_url(&review_loop.pr_url)),
                review_loop.id.as_bytes().to_vec(),
                None,
            )
            .await?;
        self.kv
            .set(
                &keys::idx_agent_review_loop(&review_loop.agent_record_id),
                review_loop.id.as_bytes().to_vec(),
                None,
            )
            .await?;
        Ok(())
    }

    pub async fn get_review_loop(&self, id: &str) -> Result<Option<ReviewLoop>, StoreError> {
        self.get_typed(&keys::review_loop_key(id)).await
    }

    pub async fn get_review_loop_by_pr(&self, pr_url: &str) -> Result<Option<ReviewLoop>, StoreError> {
        match self
            .kv
            .get(&keys::idx_pr_review_loop(&keys::normalize_pr_url(pr_url)))
            .await?
        {
            Some(bytes) => self.get_review_loop(&String::from_utf8_lossy(&bytes)).await,
            None => Ok(None),
        }
    }

    pub async fn get_review_loop_by_agent(&self, agent_id: &str) -> Result<Option<ReviewLoop>, StoreError> {
        match self.kv.get(&keys::idx_agent_review_loop(agent_id)).await? {
            Some(bytes) => self.get_review_loop(&String::from_utf8_lossy(&bytes)).await,
            None => Ok(None),
        }
    }

    // --- Settings ----------------------------------------------------------

    pub async fn save_channel_settings(
        &self,
        channel_id: &str,
        settings: &ChannelSettings,
    ) -> Result<(), StoreError> {
        self.kv
            .set(&keys::channel_settings_key(channel_id), Self::encode(settings)?, None)
            .await
    }

    pub async fn get_channel_settings(&self, channel_id: &str) -> Result<ChannelSettings, StoreError> {
        Ok(self
            .get_typed(&keys::channel_settings_key(channel_id))
            .await?
            .unwrap_or_default())
    }

    pub async fn save_user_settings(&self, user_id: &str, settings: &UserSettings) -> Result<(), StoreError> {
        self.kv
            .set(&keys::user_settings_key(user_id), Self::encode(settings)?, None)
            .await
    }

    pub async fn get_user_settings(&self, user_id: &str) -> Result<UserSettings, StoreError> {
        Ok(self
            .get_typed(&keys::user_settings_key(user_id))
            .await?
            .unwrap_or_default())
    }

    // --- Delivery idempotency ------------------------------------------------

    /// Time-to-live for a processed-delivery marker (spec.md §4.E "24h replay window").
    pub const DELIVERY_TTL_SECS: u64 = 24 * 60 * 60;

    pub async fn is_delivery_processed(&self, delivery_id: &str) -> Result<bool, StoreError> {
        Ok(self.kv.get(&keys::delivery_key(delivery_id)).await?.is_some())
    }

    pub async fn mark_delivery_processed(&self, delivery_id: &str) -> Result<(), StoreError> {
        self.kv
            .set(
                &keys::delivery_key(delivery_id),
                Vec::new(),
                Some(Self::DELIVERY_TTL_SECS),
            )
            .await
    }

    /// True if `status` would place the agent outside the active-agent index, i.e. a prior
    /// active agent reaching this status should be removed from polling (spec.md §4.G).
    pub fn status_leaves_active(status: AgentStatus) -> bool {
        status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::SqliteKv;

    fn store() -> Store {
        Store::new(Arc::new(SqliteKv::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn save_and_get_agent_round_trips() {
        let s = store();
        let a = AgentRecord::new("a1", "t1", "p1", "c1", "u1", "o/r", "main", "fix", "auto");
        s.save_agent(&a).await.unwrap();
        let got = s.get_agent("a1").await.unwrap().unwrap();
        assert_eq!(got.cursor_agent_id, "a1");
    }

    #[tokio::test]
    async fn active_index_tracks_status() {
        let s = store();
        let mut a = AgentRecord::new("a1", "t1", "p1", "c1", "u1", "o/r", "main", "fix", "auto");
        s.save_agent(&a).await.unwrap();
        assert_eq!(s.list_active_agents().await.unwrap().len(), 1);

        a.status = AgentStatus::Finished;
        s.save_agent(&a).await.unwrap();
        assert_eq!(s.list_active_agents().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn finished_with_pr_index_requires_both_conditions() {
        let s = store();
        let mut a = AgentRecord::new("a1", "t1", "p1", "c1", "u1", "o/r", "main", "fix", "auto");
        a.status = AgentStatus::Finished;
        s.save_agent(&a).await.unwrap();
        assert_eq!(s.list_finished_with_pr().await.unwrap().len(), 0);

        a.pr_url = Some("https://github.com/o/r/pull/1".to_string());
        s.save_agent(&a).await.unwrap();
        assert_eq!(s.list_finished_with_pr().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn pr_url_lookup_normalizes_trailing_slash() {
        let s = store();
        let mut a = AgentRecord::new("a1", "t1", "p1", "c1", "u1", "o/r", "main", "fix", "auto");
        a.pr_url = Some("https://github.com/o/r/pull/1".to_string());
        s.save_agent(&a).await.unwrap();
        let got = s.get_agent_by_pr_url("https://github.com/o/r/pull/1/").await.unwrap();
        assert_eq!(got.unwrap().cursor_agent_id, "a1");
    }

    #[tokio::test]
    async fn thread_ref_union_is_mutually_exclusive() {
        let s = store();
        let a = AgentRecord::new("a1", "thread-1", "p1", "c1", "u1", "o/r", "main", "fix", "auto");
        s.save_agent(&a).await.unwrap();
        assert_eq!(s.get_agent_id_by_thread("thread-1").await.unwrap(), Some("a1".to_string()));
        assert_eq!(s.get_workflow_id_by_thread("thread-1").await.unwrap(), None);

        let w = HitlWorkflow::new("u1", "c1", "root-1", "thread-2", "o/r", "main", "auto", true, "do x", false, false);
        s.save_workflow(&w).await.unwrap();
        assert_eq!(s.get_workflow_id_by_thread("thread-2").await.unwrap(), Some(w.id.clone()));
        assert_eq!(s.get_agent_id_by_thread("thread-2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delivery_idempotency_marks_and_checks() {
        let s = store();
        assert!(!s.is_delivery_processed("d1").await.unwrap());
        s.mark_delivery_processed("d1").await.unwrap();
        assert!(s.is_delivery_processed("d1").await.unwrap());
    }

    #[tokio::test]
    async fn user_agent_index_lists_only_that_users_agents() {
        let s = store();
        let a1 = AgentRecord::new("a1", "t1", "p1", "c1", "u1", "o/r", "main", "fix", "auto");
        let a2 = AgentRecord::new("a2", "t2", "p2", "c1", "u2", "o/r", "main", "fix", "auto");
        s.save_agent(&a1).await.unwrap();
        s.save_agent(&a2).await.unwrap();
        let list = s.list_user_agents("u1").await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].cursor_agent_id, "a1");
    }

    #[tokio::test]
    async fn review_loop_round_trips_by_pr_and_agent() {
        let s = store();
        let rl = ReviewLoop::new("a1", None, "u1", "c1", "r1", "t1", "https://x/pull/1", 1, "o", "r");
        s.save_review_loop(&rl).await.unwrap();
        assert_eq!(s.get_review_loop_by_pr("https://x/pull/1/").await.unwrap().unwrap().id, rl.id);
        assert_eq!(s.get_review_loop_by_agent("a1").await.unwrap().unwrap().id, rl.id);
    }
}
