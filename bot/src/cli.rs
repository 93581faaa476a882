//! Process-level settings that live outside [`config::AppConfig`] (spec.md §6's host-settable
//! fields): connection strings and secrets the host never edits through the settings dialog.

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "cursor-bridge", about = "Chat-side remote-agent orchestration service")]
pub struct Args {
    /// XDG app name used for `~/.config/<name>/config.toml` and `LOG_DIR` file prefix.
    #[arg(long, env = "CURSOR_BRIDGE_APP_NAME", default_value = "cursor-bridge")]
    pub app_name: String,

    /// Path to the SQLite database file.
    #[arg(long, env = "CURSOR_BRIDGE_DB_PATH", default_value = "cursor-bridge.sqlite3")]
    pub db_path: String,

    /// Address the REST/webhook surface binds to.
    #[arg(long, env = "CURSOR_BRIDGE_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// Remote-agent API base URL.
    #[arg(long, env = "CURSOR_BRIDGE_AGENT_BASE_URL")]
    pub agent_base_url: String,

    /// Source-hosting-platform token (passed to the octocrab-backed SCM client).
    #[arg(long, env = "CURSOR_BRIDGE_SCM_TOKEN")]
    pub scm_token: String,

    /// Chat-host bridge base URL.
    #[arg(long, env = "CURSOR_BRIDGE_CHAT_HOST_URL")]
    pub chat_host_url: String,

    /// Chat-host bridge bearer token.
    #[arg(long, env = "CURSOR_BRIDGE_CHAT_HOST_TOKEN")]
    pub chat_host_token: String,

    /// Literal mention text the chat host resolves the bot's username to, e.g. `"@cursor"`.
    #[arg(long, env = "CURSOR_BRIDGE_BOT_MENTION", default_value = "@cursor")]
    pub bot_mention: String,

    /// Webhook platform name mounted at `/api/v1/webhooks/<platform>`.
    #[arg(long, env = "CURSOR_BRIDGE_WEBHOOK_PLATFORM", default_value = "github")]
    pub webhook_platform: String,
}
