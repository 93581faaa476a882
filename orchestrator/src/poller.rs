//! Status poller (spec.md §4.G): the host schedules a periodic job, floored and defaulted by
//! [`config::AppConfig::poll_interval`]; grounded on
//! `loom::model_spec::refresher::ResolverRefresher::spawn`'s interval-loop shape
//! (`MissedTickBehavior::Skip`, abortable `JoinHandle`).

use std::sync::Arc;
use std::time::Duration;

use agent_client::Deadline;
use store::{AgentRecord, AgentStatus};
use tokio::task::JoinHandle;

use crate::error::OrchestratorError;
use crate::state::Orchestrator;

const STATUS_DEADLINE: Duration = Duration::from_secs(15);
const STALE_AGENT_AGE_MS: i64 = 24 * 60 * 60 * 1000;

pub struct Poller {
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
}

impl Poller {
    pub fn new(orchestrator: Arc<Orchestrator>, interval: Duration) -> Self {
        Self { orchestrator, interval }
    }

    /// Spawns the background poll loop. Returns a handle the caller can `abort()` on shutdown.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                if let Err(e) = self.orchestrator.poll_tick().await {
                    tracing::warn!(error = %e, "poller tick failed");
                }
            }
        })
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

impl Orchestrator {
    /// One poller tick (spec.md §4.G): stale-cleanup, per-agent status poll, janitor sweep.
    pub async fn poll_tick(&self) -> Result<(), OrchestratorError> {
        let agents = self.store.list_active_agents().await?;
        for agent in agents {
            if now_ms() - agent.created_at > STALE_AGENT_AGE_MS {
                self.stale_cleanup(agent).await?;
                continue;
            }
            self.poll_single_agent(agent).await?;
        }
        self.janitor_sweep().await?;
        Ok(())
    }

    async fn stale_cleanup(&self, mut agent: AgentRecord) -> Result<(), OrchestratorError> {
        agent.status = AgentStatus::Stopped;
        agent.summary = Some("Stopped automatically after 24h with no terminal status from the remote agent.".to_string());
        self.store.save_agent(&agent).await?;
        self.update_agent_thread(&agent).await;
        self.publish_status_change(&agent).await;
        tracing::warn!(cursor_agent_id = %agent.cursor_agent_id, "agent exceeded 24h stale threshold, forced to STOPPED");
        Ok(())
    }

    /// Fetches remote status for one agent under a 15s deadline and applies the transition
    /// (spec.md §4.G "pollSingleAgent"). Re-reads the record from the store immediately before
    /// persisting so a concurrent cancel or followup is never clobbered.
    async fn poll_single_agent(&self, agent: AgentRecord) -> Result<(), OrchestratorError> {
        let remote = match self.agent_client.get_agent(&agent.cursor_agent_id, Deadline::after(STATUS_DEADLINE)).await {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(cursor_agent_id = %agent.cursor_agent_id, error = %e, "poll status fetch failed, will retry next tick");
                return Ok(());
            }
        };
        let new_status = parse_status(&remote.status);

        let Some(mut current) = self.store.get_agent(&agent.cursor_agent_id).await? else {
            return Ok(());
        };
        if current.status.is_terminal() {
            return Ok(());
        }
        if current.status == new_status && new_status != AgentStatus::Running {
            return Ok(());
        }

        let workflow = self.store.get_workflow_by_agent(&agent.cursor_agent_id).await?;
        let entering_terminal = new_status.is_terminal() && !current.status.is_terminal();

        if let Some(workflow) = &workflow {
            if entering_terminal && workflow.phase == store::WorkflowPhase::Planning && workflow.planner_agent_id.as_deref() == Some(agent.cursor_agent_id.as_str()) {
                current.status = new_status;
                current.pr_url = remote.pr_url.clone();
                current.target_branch = remote.target_branch.clone();
                self.store.save_agent(&current).await?;
                self.hitl.on_planner_finished(&workflow.id).await?;
                return Ok(());
            }
            if entering_terminal && workflow.phase == store::WorkflowPhase::Implementing && workflow.implementer_agent_id.as_deref() == Some(agent.cursor_agent_id.as_str()) {
                let mut completed = workflow.clone();
                completed.phase = store::WorkflowPhase::Complete;
                self.store.save_workflow(&completed).await?;
            }
        }

        current.status = new_status;
        current.pr_url = remote.pr_url.clone().or(current.pr_url);
        current.target_branch = remote.target_branch.clone().or(current.target_branch);
        self.store.save_agent(&current).await?;
        self.update_agent_thread(&current).await;
        self.publish_status_change(&current).await;

        if new_status == AgentStatus::Finished {
            if let Err(e) = self.review.bootstrap(&current, workflow.map(|w| w.id)).await {
                tracing::warn!(cursor_agent_id = %current.cursor_agent_id, error = %e, "review loop bootstrap failed");
            }
        }

        Ok(())
    }

    /// Replaces the bot reply post's attachment and cross-surface props to match the agent's
    /// current status (spec.md §6 "Post updates ... replace its attachments wholesale").
    async fn update_agent_thread(&self, agent: &AgentRecord) {
        let Some(post_id) = &agent.bot_reply_post_id else { return };
        let attachment = match agent.status {
            AgentStatus::Creating => notify::launch_attachment(agent),
            AgentStatus::Running => notify::running_attachment(agent),
            AgentStatus::Finished | AgentStatus::Merged | AgentStatus::PrClosed => notify::finished_attachment(agent),
            AgentStatus::Failed => notify::failed_attachment(agent, agent.summary.as_deref()),
            AgentStatus::Stopped => notify::stopped_attachment(agent),
        };
        if let Err(e) = self.chat_host.update_post(post_id, "", vec![attachment]).await {
            tracing::warn!(error = %e, "failed to update agent bot reply post");
        }
        let props = serde_json::json!({
            "cursor_agent_id": agent.cursor_agent_id,
            "cursor_agent_status": status_wire_name(agent.status),
        });
        if let Err(e) = self.chat_host.set_post_props(post_id, props).await {
            tracing::warn!(error = %e, "failed to set agent bot reply post props");
        }
    }

    async fn publish_status_change(&self, agent: &AgentRecord) {
        let event = stream_event::PluginEvent::AgentStatusChange {
            cursor_agent_id: agent.cursor_agent_id.clone(),
            status: status_wire_name(agent.status).to_string(),
            pr_url: agent.pr_url.clone(),
            updated_at: agent.updated_at.to_string(),
        };
        if let Err(e) = chat_host::publish(self.chat_host.as_ref(), &config::global().plugin_id, &agent.user_id, &event).await {
            tracing::warn!(error = %e, "failed to publish agent status change");
        }
    }

    /// Backfills review loops for finished-with-PR agents that don't have one yet, covering a
    /// `pull_request` webhook that arrived before the poller observed `FINISHED` (spec.md §4.G
    /// "janitor sweep", §4.I "bootstrap ... or janitor backup").
    async fn janitor_sweep(&self) -> Result<(), OrchestratorError> {
        for agent in self.store.list_finished_with_pr().await? {
            if self.store.get_review_loop_by_agent(&agent.cursor_agent_id).await?.is_some() {
                continue;
            }
            let workflow_id = self.store.get_workflow_by_agent(&agent.cursor_agent_id).await?.map(|w| w.id);
            if let Err(e) = self.review.bootstrap(&agent, workflow_id).await {
                tracing::warn!(cursor_agent_id = %agent.cursor_agent_id, error = %e, "janitor review loop bootstrap failed");
            }
        }
        Ok(())
    }
}

fn parse_status(raw: &str) -> AgentStatus {
    match raw.to_ascii_uppercase().as_str() {
        "RUNNING" => AgentStatus::Running,
        "FINISHED" => AgentStatus::Finished,
        "FAILED" => AgentStatus::Failed,
        "STOPPED" => AgentStatus::Stopped,
        _ => AgentStatus::Creating,
    }
}

fn status_wire_name(status: AgentStatus) -> &'static str {
    match status {
        AgentStatus::Creating => "CREATING",
        AgentStatus::Running => "RUNNING",
        AgentStatus::Finished => "FINISHED",
        AgentStatus::Failed => "FAILED",
        AgentStatus::Stopped => "STOPPED",
        AgentStatus::Merged => "MERGED",
        AgentStatus::PrClosed => "PR_CLOSED",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ok, orchestrator_with, ScriptedTransport};
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[tokio::test]
    async fn terminal_status_is_a_no_op_even_when_the_remote_poll_reports_running() {
        let transport = Arc::new(ScriptedTransport {
            responses: Mutex::new(vec![ok(r#"{"id":"a1","status":"RUNNING","created_at":"0"}"#)]),
            calls: AtomicUsize::new(0),
        });
        let orch = orchestrator_with(transport);

        let mut agent = AgentRecord::new("a1", "t1", "p1", "c1", "u1", "o/r", "main", "fix it", "auto");
        agent.status = AgentStatus::Stopped;
        orch.store.save_agent(&agent).await.unwrap();

        orch.poll_single_agent(agent).await.unwrap();

        let reloaded = orch.store.get_agent("a1").await.unwrap().unwrap();
        assert_eq!(reloaded.status, AgentStatus::Stopped);
    }
}
