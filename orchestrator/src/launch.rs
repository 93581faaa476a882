//! Mention decision tree and launch pipeline (spec.md §4.F). Grounded on
//! `serve::connection::handle_request_and_send`'s dispatch-by-variant match for the shape of
//! "inspect the inbound event, route to exactly one branch, never fall through silently".

use std::time::{SystemTime, UNIX_EPOCH};

use agent_client::{Deadline, LaunchRequest, SourceRef, TargetRef};
use chat_host::PostCreatedEvent;
use mention::ParsedMention;
use store::{AgentRecord, AgentStatus, HitlWorkflow};

use crate::error::OrchestratorError;
use crate::state::Orchestrator;

const LAUNCH_DEADLINE: std::time::Duration = std::time::Duration::from_secs(30);

/// Resolved HITL toggle set after precedence is applied (spec.md §4.F "HITL flag precedence:
/// per-mention > user > global; `--direct` skips both stages, `--no-review`/`--no-plan` skip
/// one stage each").
struct HitlResolution {
    skip_context_review: bool,
    skip_plan_loop: bool,
}

fn resolve_hitl(parsed: &ParsedMention, user: &store::UserSettings, cfg: &config::AppConfig) -> HitlResolution {
    if parsed.hitl_direct {
        return HitlResolution { skip_context_review: true, skip_plan_loop: true };
    }
    let skip_context_review = parsed.hitl_no_review
        || user.hitl_skip_context_review.unwrap_or(!cfg.enable_context_review);
    let skip_plan_loop = parsed.hitl_no_plan
        || user.hitl_skip_plan_loop.unwrap_or(!cfg.enable_plan_loop);
    HitlResolution { skip_context_review, skip_plan_loop }
}

fn thread_anchor(event: &PostCreatedEvent) -> &str {
    if event.root_post_id.is_empty() {
        &event.id
    } else {
        &event.root_post_id
    }
}

fn unix_secs() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs() as i64).unwrap_or(0)
}

impl Orchestrator {
    /// Entry point for the chat host's post-created callback (spec.md §6 "Chat event surface").
    pub async fn handle_post_created(&self, event: PostCreatedEvent) -> Result<(), OrchestratorError> {
        if event.should_ignore {
            return Ok(());
        }

        let parsed = mention::parse(&event.message, &self.bot_mention);
        let anchor = thread_anchor(&event).to_string();
        let in_thread = !event.root_post_id.is_empty();

        match parsed {
            None if in_thread => self.handle_thread_reply_without_mention(&event, &anchor).await,
            None => Ok(()),
            Some(parsed) if in_thread && !parsed.force_new => {
                if self.route_to_existing(&event, &anchor, &parsed).await? {
                    Ok(())
                } else {
                    self.launch_new(&event, &anchor, parsed).await
                }
            }
            Some(parsed) => self.launch_new(&event, &anchor, parsed).await,
        }
    }

    /// A reply in an existing thread that carries no mention: either a HITL follow-up (owner
    /// feedback during `planning`) or a plain follow-up on a running agent (spec.md §4.F).
    async fn handle_thread_reply_without_mention(&self, event: &PostCreatedEvent, anchor: &str) -> Result<(), OrchestratorError> {
        if let Some(workflow_id) = self.store.get_workflow_id_by_thread(anchor).await? {
            if self.workflow_accepts_reply(&workflow_id).await? {
                self.hitl.handle_thread_reply_during_planning(&workflow_id, &event.user_id, &event.message).await?;
            }
            return Ok(());
        }
        if let Some(agent_id) = self.store.get_agent_id_by_thread(anchor).await? {
            if let Some(agent) = self.store.get_agent(&agent_id).await? {
                if agent.status == AgentStatus::Running {
                    let _ = self
                        .agent_client
                        .add_followup(&agent_id, &event.message, Deadline::after(LAUNCH_DEADLINE))
                        .await;
                }
            }
        }
        Ok(())
    }

    /// True only while a workflow is in `planning`, the one phase
    /// [`hitl::HitlEngine::handle_thread_reply_during_planning`] accepts (spec.md §4.H). A
    /// reply during `plan_review` is also actionable, but as an iterate-with-feedback mention
    /// handled separately in [`Self::route_to_existing`], not through this path.
    async fn workflow_accepts_reply(&self, workflow_id: &str) -> Result<bool, OrchestratorError> {
        Ok(self
            .store
            .get_workflow(workflow_id)
            .await?
            .is_some_and(|w| w.phase == store::WorkflowPhase::Planning))
    }

    /// Routes a mention inside an existing thread to whatever is already live there. Returns
    /// `true` if routed, `false` if the caller should fall through to [`Self::launch_new`].
    async fn route_to_existing(&self, event: &PostCreatedEvent, anchor: &str, parsed: &ParsedMention) -> Result<bool, OrchestratorError> {
        if let Some(workflow_id) = self.store.get_workflow_id_by_thread(anchor).await? {
            if self.workflow_accepts_reply(&workflow_id).await? {
                self.hitl.handle_thread_reply_during_planning(&workflow_id, &event.user_id, &parsed.prompt).await?;
                return Ok(true);
            }
            let workflow = self.store.get_workflow(&workflow_id).await?;
            if workflow.is_some_and(|w| w.phase == store::WorkflowPhase::PlanReview && w.user_id == event.user_id) {
                self.hitl.iterate_plan(&workflow_id, &parsed.prompt).await?;
            }
            return Ok(true);
        }
        if let Some(agent_id) = self.store.get_agent_id_by_thread(anchor).await? {
            if let Some(agent) = self.store.get_agent(&agent_id).await? {
                if agent.status == AgentStatus::Running {
                    self.agent_client
                        .add_followup(&agent_id, &parsed.prompt, Deadline::after(LAUNCH_DEADLINE))
                        .await?;
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Resolves defaults (mention > channel > user > global), launches a new agent or HITL
    /// workflow, and posts the initial bot reply (spec.md §4.F "Launch sub-pipeline").
    async fn launch_new(&self, event: &PostCreatedEvent, anchor: &str, parsed: ParsedMention) -> Result<(), OrchestratorError> {
        let cfg = config::global();
        let channel_settings = self.store.get_channel_settings(&event.channel_id).await?;
        let user_settings = self.store.get_user_settings(&event.user_id).await?;

        let repository = parsed
            .repo
            .clone()
            .or_else(|| channel_settings.default_repository.clone())
            .or_else(|| user_settings.default_repository.clone())
            .or_else(|| cfg.default_repository.clone())
            .ok_or(OrchestratorError::NoRepository)?;
        let branch = parsed
            .branch
            .clone()
            .or_else(|| channel_settings.default_branch.clone())
            .or_else(|| user_settings.default_branch.clone())
            .unwrap_or_else(|| cfg.default_branch.clone());
        let model = parsed
            .model
            .clone()
            .or_else(|| channel_settings.default_model.clone())
            .or_else(|| user_settings.default_model.clone())
            .unwrap_or_else(|| cfg.default_model.clone());
        let auto_create_pr = parsed.auto_pr.unwrap_or(cfg.auto_create_pr);

        if cfg.is_degraded() {
            self.post_launch_error(event, "The agent API key is not configured; launches are disabled.").await;
            return Ok(());
        }

        let hitl_resolution = resolve_hitl(&parsed, &user_settings, &cfg);
        let context = enrich_thread_context(self, event, &parsed).await;

        if hitl_resolution.skip_context_review && hitl_resolution.skip_plan_loop {
            self.launch_direct(event, anchor, &parsed, repository, branch, model, context).await
        } else {
            self.launch_hitl_workflow(event, anchor, &parsed, repository, branch, model, auto_create_pr, context, hitl_resolution)
                .await
        }
    }

    async fn launch_direct(
        &self,
        event: &PostCreatedEvent,
        anchor: &str,
        parsed: &ParsedMention,
        repository: String,
        branch: String,
        model: String,
        context: String,
    ) -> Result<(), OrchestratorError> {
        let prompt = format!("<system-instructions></system-instructions>\n\n<task>{context}</task>");
        let target_branch = mention::branch_slug(&parsed.prompt, unix_secs());
        let req = LaunchRequest {
            prompt: prompt.clone(),
            source: SourceRef { repository: repository.clone(), git_ref: branch.clone() },
            target: TargetRef { branch_name: target_branch, auto_create_pr: parsed.auto_pr.unwrap_or(config::global().auto_create_pr), auto_branch: true },
            model: model.clone(),
        };

        match self.agent_client.launch_agent(&req, Deadline::after(LAUNCH_DEADLINE)).await {
            Ok(resp) => {
                let mut agent = AgentRecord::new(resp.id.clone(), anchor, &event.id, &event.channel_id, &event.user_id, repository, branch, prompt, model);
                agent.status = AgentStatus::Creating;
                agent.target_branch = resp.target_branch.clone();
                let attachment = notify::launch_attachment(&agent);
                let post = self.chat_host.create_post(&event.channel_id, anchor, "", vec![attachment]).await?;
                let post_id = post.id;
                agent.bot_reply_post_id = Some(post_id.clone());
                self.store.save_agent(&agent).await?;
                chat_host::publish(
                    self.chat_host.as_ref(),
                    &config::global().plugin_id,
                    &event.user_id,
                    &stream_event::PluginEvent::AgentCreated {
                        cursor_agent_id: agent.cursor_agent_id.clone(),
                        channel_id: agent.channel_id.clone(),
                        post_id,
                        updated_at: agent.updated_at.to_string(),
                    },
                )
                .await?;
                Ok(())
            }
            Err(e) => {
                self.post_launch_error(event, &notify::render_api_error(&e.to_string())).await;
                Ok(())
            }
        }
    }

    async fn launch_hitl_workflow(
        &self,
        event: &PostCreatedEvent,
        anchor: &str,
        parsed: &ParsedMention,
        repository: String,
        branch: String,
        model: String,
        auto_create_pr: bool,
        context: String,
        resolution: HitlResolution,
    ) -> Result<(), OrchestratorError> {
        let workflow = HitlWorkflow::new(
            &event.user_id,
            &event.channel_id,
            anchor,
            &event.id,
            repository,
            branch,
            model,
            auto_create_pr,
            parsed.prompt.clone(),
            resolution.skip_context_review,
            resolution.skip_plan_loop,
        );
        let mut workflow = workflow;
        workflow.enriched_context = Some(context);
        if resolution.skip_context_review {
            workflow.approved_context = workflow.enriched_context.clone();
        }
        self.hitl.start_context_review(workflow).await?;
        Ok(())
    }

    async fn post_launch_error(&self, event: &PostCreatedEvent, message: &str) {
        let attachment = chat_host::Attachment {
            text: message.to_string(),
            pretext: Some(":x: Launch failed".to_string()),
            color: Some("#d94f4f".to_string()),
            actions: Vec::new(),
        };
        let anchor = thread_anchor(event);
        if let Err(e) = self.chat_host.create_post(&event.channel_id, anchor, "", vec![attachment]).await {
            tracing::warn!(error = %e, "failed to post launch error");
        }
    }
}

/// Thread-context enrichment (spec.md §4.F): no LLM-bridge client exists in this stack, so the
/// fallback path (raw thread text wrapped in a delimiter) is always used; `enable_llm_bridge`
/// is carried in config for forward compatibility but has no effect today (see DESIGN.md).
async fn enrich_thread_context(orch: &Orchestrator, event: &PostCreatedEvent, parsed: &ParsedMention) -> String {
    let anchor = thread_anchor(event);
    match orch.chat_host.get_post_thread(anchor).await {
        Ok(posts) if !posts.is_empty() => {
            let mut body = String::new();
            for post in &posts {
                body.push_str(&post.message);
                body.push('\n');
            }
            format!("{}\n\n--- Thread Context ---\n{}", parsed.prompt, body.trim_end())
        }
        _ => parsed.prompt.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ok, orchestrator_with, ScriptedTransport};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn orchestrator(transport: Arc<ScriptedTransport>) -> Orchestrator {
        orchestrator_with(transport)
    }

    fn post(message: &str, root_post_id: &str) -> PostCreatedEvent {
        PostCreatedEvent {
            id: "post-1".into(),
            user_id: "u1".into(),
            channel_id: "c1".into(),
            root_post_id: root_post_id.into(),
            message: message.into(),
            file_ids: Vec::new(),
            props: Default::default(),
            should_ignore: false,
        }
    }

    #[tokio::test]
    async fn ignored_post_never_parses_a_mention() {
        let transport = Arc::new(ScriptedTransport { responses: Mutex::new(vec![]), calls: AtomicUsize::new(0) });
        let orch = orchestrator(transport.clone());
        let mut event = post("@cursor do the thing", "");
        event.should_ignore = true;
        orch.handle_post_created(event).await.unwrap();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn direct_mention_launches_immediately_with_no_hitl() {
        let transport = Arc::new(ScriptedTransport {
            responses: Mutex::new(vec![ok(r#"{"id":"a1","status":"CREATING","created_at":"0","target_branch":"cursor/fix-1"}"#)]),
            calls: AtomicUsize::new(0),
        });
        let orch = orchestrator(transport.clone());
        let event = post("@cursor --direct fix the bug", "");
        orch.handle_post_created(event).await.unwrap();

        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        let saved = orch.store.get_agent("a1").await.unwrap().unwrap();
        assert_eq!(saved.repository, "o/r");
        assert!(saved.prompt.contains("fix the bug"));
    }

    #[tokio::test]
    async fn mention_with_no_repository_anywhere_posts_an_error_without_launching() {
        let transport = Arc::new(ScriptedTransport { responses: Mutex::new(vec![]), calls: AtomicUsize::new(0) });
        let orch = orchestrator(transport.clone());
        let mut cfg = config::AppConfig::default();
        cfg.agent_api_key = Some("sk-test".to_string());
        config::set_global(cfg);

        let event = post("@cursor --direct fix the bug", "");
        let err = orch.handle_post_created(event).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::NoRepository));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_mention_reply_to_running_agent_sends_a_followup() {
        let transport = Arc::new(ScriptedTransport {
            responses: Mutex::new(vec![
                ok(r#"{"id":"a1","status":"CREATING","created_at":"0"}"#),
                ok(r#"{"id":"a1","status":"RUNNING","created_at":"0"}"#),
            ]),
            calls: AtomicUsize::new(0),
        });
        let orch = orchestrator(transport.clone());
        let launch_event = post("@cursor --direct fix the bug", "");
        orch.handle_post_created(launch_event).await.unwrap();

        let mut agent = orch.store.get_agent("a1").await.unwrap().unwrap();
        agent.status = AgentStatus::Running;
        orch.store.save_agent(&agent).await.unwrap();

        let followup = post("also update the docs", "post-1");
        orch.handle_post_created(followup).await.unwrap();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn hitl_mention_starts_context_review_instead_of_launching_an_agent() {
        let transport = Arc::new(ScriptedTransport { responses: Mutex::new(vec![]), calls: AtomicUsize::new(0) });
        let orch = orchestrator(transport.clone());
        let mut cfg = config::AppConfig::default();
        cfg.agent_api_key = Some("sk-test".to_string());
        cfg.default_repository = Some("o/r".to_string());
        cfg.enable_context_review = true;
        config::set_global(cfg);

        let event = post("@cursor fix the bug", "");
        orch.handle_post_created(event).await.unwrap();
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn owner_mention_during_plan_review_iterates_instead_of_launching_new() {
        let transport = Arc::new(ScriptedTransport {
            responses: Mutex::new(vec![ok(r#"{"id":"planner-2","status":"CREATING","created_at":"0"}"#)]),
            calls: AtomicUsize::new(0),
        });
        let orch = orchestrator(transport.clone());

        let mut workflow = HitlWorkflow::new("u1", "c1", "root-1", "root-1", "o/r", "main", "auto", true, "fix the bug", true, false);
        workflow.phase = store::WorkflowPhase::PlanReview;
        workflow.retrieved_plan = Some("1. do the thing".to_string());
        orch.store.save_workflow(&workflow).await.unwrap();

        let event = post("@cursor make it faster too", "root-1");
        orch.handle_post_created(event).await.unwrap();

        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
        let reloaded = orch.store.get_workflow(&workflow.id).await.unwrap().unwrap();
        assert_eq!(reloaded.phase, store::WorkflowPhase::Planning);
        assert_eq!(reloaded.planner_agent_id.as_deref(), Some("planner-2"));
    }
}
