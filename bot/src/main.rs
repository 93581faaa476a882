//! Process wiring (spec.md §9): load config, build the component graph, spawn the poller,
//! serve the REST/webhook surface. Grounded on `ResolverRefresher::new(...).spawn()`'s
//! "construct, spawn background work, continue" shape for the poller handoff, and on
//! `config`'s own `load_and_apply`/`init_tracing` pair for the startup sequence.

mod cli;
mod http_chat_host;

use std::sync::Arc;

use clap::Parser;
use orchestrator::Orchestrator;
use store::{SqliteKv, Store};
use webhook::{ReceiverState, WebhookDispatch};

use cli::Args;
use http_chat_host::HttpChatHost;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    config::load_and_apply(&args.app_name, None)?;
    let _tracing_guard = config::init_tracing(&args.app_name);

    config::set_global(app_config_from_env());
    tracing::info!(degraded = config::global().is_degraded(), "starting cursor-bridge");

    let kv = SqliteKv::open(&args.db_path)?;
    let store = Arc::new(Store::new(Arc::new(kv)));

    let agent_client = Arc::new(agent_client::Client::new(
        args.agent_base_url.clone(),
        config::global().agent_api_key.clone().unwrap_or_default(),
    ));
    let scm = Arc::new(scm_client::OctocrabScmClient::new(args.scm_token.clone())?);
    let chat_host = Arc::new(HttpChatHost::new(args.chat_host_url.clone(), args.chat_host_token.clone()));

    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        chat_host,
        agent_client,
        scm,
        args.bot_mention.clone(),
    ));

    let poll_interval = config::global().poll_interval();
    let poller = orchestrator::Poller::new(orchestrator.clone(), poll_interval);
    let poller_handle = poller.spawn();

    let dispatch: Arc<dyn WebhookDispatch> = Arc::new(orchestrator::WebhookRouter::new(orchestrator.clone()));
    let webhook_state = ReceiverState {
        store,
        dispatch,
        webhook_secret: config::global().webhook_secret.clone(),
    };

    let result = serve::run_serve(Some(&args.listen_addr), orchestrator, webhook_state, &args.webhook_platform).await;
    poller_handle.abort();
    result
}

/// Builds [`config::AppConfig`] from process environment variables, following the same
/// "env already set wins" precedence [`config::load_and_apply`] established.
fn app_config_from_env() -> config::AppConfig {
    let mut cfg = config::AppConfig::default();
    if let Ok(v) = std::env::var("AGENT_API_KEY") {
        cfg.agent_api_key = Some(v);
    }
    if let Ok(v) = std::env::var("DEFAULT_REPOSITORY") {
        cfg.default_repository = Some(v);
    }
    if let Ok(v) = std::env::var("DEFAULT_BRANCH") {
        cfg.default_branch = v;
    }
    if let Ok(v) = std::env::var("DEFAULT_MODEL") {
        cfg.default_model = v;
    }
    if let Ok(v) = std::env::var("AUTO_CREATE_PR") {
        cfg.auto_create_pr = v == "true" || v == "1";
    }
    if let Ok(v) = std::env::var("WEBHOOK_SECRET") {
        cfg.webhook_secret = Some(v);
    }
    if let Ok(v) = std::env::var("POLL_INTERVAL_SECS") {
        if let Ok(n) = v.parse() {
            cfg.poll_interval_secs = n;
        }
    }
    if let Ok(v) = std::env::var("ENABLE_AI_REVIEW_LOOP") {
        cfg.enable_ai_review_loop = v == "true" || v == "1";
    }
    if let Ok(v) = std::env::var("MAX_REVIEW_ITERATIONS") {
        if let Ok(n) = v.parse() {
            cfg.max_review_iterations = n;
        }
    }
    if let Ok(v) = std::env::var("AI_REVIEWER_BOTS") {
        cfg.ai_reviewer_bots = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
    }
    if let Ok(v) = std::env::var("ENABLE_DEBUG_LOGGING") {
        cfg.enable_debug_logging = v == "true" || v == "1";
    }
    if let Ok(v) = std::env::var("ENABLE_CONTEXT_REVIEW") {
        cfg.enable_context_review = v == "true" || v == "1";
    }
    if let Ok(v) = std::env::var("ENABLE_PLAN_LOOP") {
        cfg.enable_plan_loop = v == "true" || v == "1";
    }
    if let Ok(v) = std::env::var("CURSOR_AGENT_SYSTEM_PROMPT") {
        cfg.cursor_agent_system_prompt = Some(v);
    }
    if let Ok(v) = std::env::var("PLANNER_SYSTEM_PROMPT") {
        cfg.planner_system_prompt = Some(v);
    }
    if let Ok(v) = std::env::var("ENABLE_LLM_BRIDGE") {
        cfg.enable_llm_bridge = v == "true" || v == "1";
    }
    if let Ok(v) = std::env::var("PLUGIN_ID") {
        cfg.plugin_id = v;
    }
    cfg
}
