//! Shared orchestrator state (spec.md §1): the one struct every inbound surface (chat event
//! callback, poller tick, webhook dispatch, interactive action) drives through.

use std::sync::Arc;

use chat_host::ChatHost;
use hitl::HitlEngine;
use review::ReviewEngine;
use scm_client::ScmClient;
use store::Store;

pub struct Orchestrator {
    pub(crate) store: Arc<Store>,
    pub(crate) chat_host: Arc<dyn ChatHost>,
    pub(crate) agent_client: Arc<agent_client::Client>,
    pub(crate) scm: Arc<dyn ScmClient>,
    pub(crate) hitl: HitlEngine,
    pub(crate) review: ReviewEngine,
    /// The literal mention text the chat host resolves the bot's username to, e.g. `"@cursor"`.
    pub(crate) bot_mention: String,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<Store>,
        chat_host: Arc<dyn ChatHost>,
        agent_client: Arc<agent_client::Client>,
        scm: Arc<dyn ScmClient>,
        bot_mention: impl Into<String>,
    ) -> Self {
        let cfg = config::global();
        let hitl = HitlEngine::new(
            store.clone(),
            agent_client.clone(),
            chat_host.clone(),
            cfg.plugin_id.clone(),
            cfg.planner_system_prompt.clone(),
        );
        let review = ReviewEngine::new(
            store.clone(),
            scm.clone(),
            agent_client.clone(),
            chat_host.clone(),
            cfg.plugin_id.clone(),
            cfg.ai_reviewer_bots.clone(),
            Vec::new(),
            cfg.max_review_iterations,
        );
        Self {
            store,
            chat_host,
            agent_client,
            scm,
            hitl,
            review,
            bot_mention: bot_mention.into(),
        }
    }
}
