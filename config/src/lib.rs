//! Load configuration from XDG `config.toml` and project `.env`, then apply to the process
//! environment with priority: **existing env > .env > XDG**.
//!
//! Also owns the process-wide [`AppConfig`] accessor described in spec.md §9: the chat
//! event callback, the poller, and every webhook handler run as concurrent callbacks, so
//! the live configuration is read through [`global`] and replaced atomically through
//! [`set_global`] rather than mutated in place.

mod dotenv;
#[cfg(feature = "tracing-init")]
mod logging;
mod xdg_toml;

#[cfg(feature = "tracing-init")]
pub use logging::{init_tracing, TracingGuard};

use std::path::Path;
use std::sync::{Arc, OnceLock, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("xdg config path: {0}")]
    XdgPath(String),
    #[error("read xdg config: {0}")]
    XdgRead(std::io::Error),
    #[error("parse xdg toml: {0}")]
    XdgParse(#[from] toml::de::Error),
    #[error("read .env: {0}")]
    DotenvRead(std::io::Error),
}

/// Loads config from XDG `config.toml` and optional project `.env`, then sets environment
/// variables only for keys that are **not** already set (so existing env has highest priority).
///
/// Order of precedence when a key is missing in the process environment:
/// 1. Value from project `.env` (current directory or `override_dir` if given)
/// 2. Value from `$XDG_CONFIG_HOME/<app_name>/config.toml` `[env]` table
///
/// * `app_name`: e.g. `"cursor-bridge"` — used for XDG path `~/.config/<app_name>/config.toml`.
/// * `override_dir`: if `Some`, look for `.env` in this directory instead of `std::env::current_dir()`.
pub fn load_and_apply(app_name: &str, override_dir: Option<&Path>) -> Result<(), LoadError> {
    let xdg_map = xdg_toml::load_env_map(app_name)?;
    let dotenv_map = dotenv::load_env_map(override_dir).map_err(LoadError::DotenvRead)?;

    let mut keys: std::collections::HashSet<String> = xdg_map.keys().cloned().collect();
    keys.extend(dotenv_map.keys().cloned());

    for key in keys {
        if std::env::var(&key).is_ok() {
            continue; // existing env wins
        }
        let value = dotenv_map.get(&key).or_else(|| xdg_map.get(&key)).cloned();
        if let Some(v) = value {
            std::env::set_var(&key, v);
        }
    }

    Ok(())
}

/// Tri-state toggle: a `None` means "inherit from the level above" (global config, then a
/// hard-coded default), matching spec.md §3's "unset = inherit global" HITL-toggle semantics.
pub type Tristate = Option<bool>;

/// Process-wide plugin configuration (spec.md §6, "Configuration (global)").
///
/// Held only behind [`global`]/[`set_global`]; never clone the fields out of an `Arc<AppConfig>`
/// and mutate them — build a whole new `AppConfig` and call [`set_global`] to publish it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote-agent API key. `None` means the plugin runs in degraded mode and rejects launches.
    pub agent_api_key: Option<String>,
    pub default_repository: Option<String>,
    pub default_branch: String,
    pub default_model: String,
    pub auto_create_pr: bool,
    pub webhook_secret: Option<String>,
    /// Poll interval in seconds; floor is enforced by [`AppConfig::poll_interval`].
    pub poll_interval_secs: u64,
    pub enable_ai_review_loop: bool,
    pub max_review_iterations: u32,
    pub ai_reviewer_bots: Vec<String>,
    pub enable_debug_logging: bool,
    pub enable_context_review: bool,
    pub enable_plan_loop: bool,
    pub cursor_agent_system_prompt: Option<String>,
    pub planner_system_prompt: Option<String>,
    pub enable_llm_bridge: bool,
    /// Identifier used to namespace published websocket events: `custom_<plugin_id>_<event>`.
    pub plugin_id: String,
}

/// Lowest allowed poll interval (spec.md §4.G: "floor 10s, default 30s").
pub const MIN_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_MAX_REVIEW_ITERATIONS: u32 = 5;

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            agent_api_key: None,
            default_repository: None,
            default_branch: "main".to_string(),
            default_model: "auto".to_string(),
            auto_create_pr: true,
            webhook_secret: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            enable_ai_review_loop: true,
            max_review_iterations: DEFAULT_MAX_REVIEW_ITERATIONS,
            ai_reviewer_bots: Vec::new(),
            enable_debug_logging: false,
            enable_context_review: false,
            enable_plan_loop: false,
            cursor_agent_system_prompt: None,
            planner_system_prompt: None,
            enable_llm_bridge: false,
            plugin_id: "cursor_bridge".to_string(),
        }
    }
}

impl AppConfig {
    /// Effective poll interval, clamped to [`MIN_POLL_INTERVAL_SECS`] (spec.md §4.G).
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs.max(MIN_POLL_INTERVAL_SECS))
    }

    /// The core runs in degraded mode (rejects launches) without an API key (spec.md §6).
    pub fn is_degraded(&self) -> bool {
        self.agent_api_key.is_none()
    }

    /// Help text shown in the host's admin console for each settable field. Asserted by tests
    /// to contain no backtick, per spec.md §6 ("Config help text MUST NOT contain backtick
    /// characters" — the host's settings UI renders help text as plain text, not markdown).
    pub fn help_text() -> &'static [(&'static str, &'static str)] {
        &[
            ("agent_api_key", "API key for the remote coding agent service. Required to enable launches."),
            ("default_repository", "Default owner/repo used when a mention omits repo=."),
            ("default_branch", "Default source branch used when a mention omits branch=."),
            ("default_model", "Default model name used when a mention omits model=."),
            ("auto_create_pr", "Whether launched agents open a pull request automatically."),
            ("webhook_secret", "Shared secret used to verify inbound webhook signatures."),
            ("poll_interval_secs", "How often, in seconds, to poll active agents for status (minimum 10)."),
            ("enable_ai_review_loop", "Whether PRs opened by agents enter the automated AI review loop."),
            ("max_review_iterations", "Maximum number of fix iterations the review loop will dispatch."),
            ("ai_reviewer_bots", "Comma-separated list of reviewer logins treated as AI reviewer bots."),
            ("enable_debug_logging", "Emit verbose decision logs for the review loop and feedback extraction."),
            ("enable_context_review", "Require a context-review approval stage before planning or implementation."),
            ("enable_plan_loop", "Require a plan-review approval stage before implementation."),
            ("cursor_agent_system_prompt", "Optional override for the implementation agent's system prompt."),
            ("planner_system_prompt", "Optional override for the planning agent's system prompt."),
            ("enable_llm_bridge", "Whether to opportunistically enrich prompts and titles via the LLM bridge."),
        ]
    }
}

static GLOBAL_CONFIG: OnceLock<RwLock<Arc<AppConfig>>> = OnceLock::new();

fn cell() -> &'static RwLock<Arc<AppConfig>> {
    GLOBAL_CONFIG.get_or_init(|| RwLock::new(Arc::new(AppConfig::default())))
}

/// Returns the current configuration. Cheap: clones an `Arc`, never the value.
pub fn global() -> Arc<AppConfig> {
    cell().read().expect("config lock poisoned").clone()
}

/// Publishes a new configuration atomically. Callers must build a whole new `AppConfig`;
/// never mutate the `Arc` returned by [`global`] in place (spec.md §9).
pub fn set_global(config: AppConfig) {
    let mut guard = cell().write().expect("config lock poisoned");
    *guard = Arc::new(config);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn restore_var(key: &str, prev: Option<String>) {
        match prev {
            Some(v) => env::set_var(key, v),
            None => env::remove_var(key),
        }
    }

    #[test]
    fn existing_env_wins() {
        env::set_var("CONFIG_TEST_EXISTING", "from_env");
        let _ = load_and_apply("cursor-bridge", None);
        assert_eq!(env::var("CONFIG_TEST_EXISTING").as_deref(), Ok("from_env"));
        env::remove_var("CONFIG_TEST_EXISTING");
    }

    #[test]
    fn load_and_apply_no_config_ok() {
        let r = load_and_apply("config-crate-nonexistent-app-xyz", None::<&std::path::Path>);
        assert!(r.is_ok());
    }

    #[test]
    fn dotenv_overrides_xdg() {
        let xdg_dir = tempfile::tempdir().unwrap();
        let app_dir = xdg_dir.path().join("cursor-bridge");
        std::fs::create_dir_all(&app_dir).unwrap();
        std::fs::write(
            app_dir.join("config.toml"),
            "[env]\nCONFIG_TEST_PRIORITY = \"from_xdg\"\n",
        )
        .unwrap();

        let dotenv_dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dotenv_dir.path().join(".env"),
            "CONFIG_TEST_PRIORITY=from_dotenv\n",
        )
        .unwrap();

        let prev_xdg = env::var("XDG_CONFIG_HOME").ok();
        env::set_var("XDG_CONFIG_HOME", xdg_dir.path());
        env::remove_var("CONFIG_TEST_PRIORITY");

        let _ = load_and_apply("cursor-bridge", Some(dotenv_dir.path()));
        let val = env::var("CONFIG_TEST_PRIORITY").unwrap();
        env::remove_var("CONFIG_TEST_PRIORITY");
        restore_var("XDG_CONFIG_HOME", prev_xdg);

        assert_eq!(val, "from_dotenv");
    }

    #[test]
    fn default_poll_interval_is_30s() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.poll_interval().as_secs(), 30);
    }

    #[test]
    fn poll_interval_is_floored_at_10s() {
        let mut cfg = AppConfig::default();
        cfg.poll_interval_secs = 3;
        assert_eq!(cfg.poll_interval().as_secs(), 10);
    }

    #[test]
    fn missing_api_key_is_degraded() {
        let cfg = AppConfig::default();
        assert!(cfg.is_degraded());
    }

    #[test]
    fn present_api_key_is_not_degraded() {
        let mut cfg = AppConfig::default();
        cfg.agent_api_key = Some("sk-test".to_string());
        assert!(!cfg.is_degraded());
    }

    #[test]
    fn help_text_has_no_backticks() {
        for (key, text) in AppConfig::help_text() {
            assert!(!text.contains('`'), "help text for {key} contains a backtick");
        }
    }

    #[test]
    fn set_global_publishes_atomically() {
        let mut cfg = AppConfig::default();
        cfg.default_branch = "release".to_string();
        set_global(cfg);
        assert_eq!(global().default_branch, "release");

        let mut cfg2 = AppConfig::default();
        cfg2.default_branch = "main".to_string();
        set_global(cfg2);
        assert_eq!(global().default_branch, "main");
    }
}
