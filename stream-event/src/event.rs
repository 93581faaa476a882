//! Published event types (spec.md §6).
//!
//! Each variant carries only the ids/phase/status the UI needs; `updated_at` is rendered
//! as a decimal string because the transport is JSON over websocket, and some host clients
//! parse very large millisecond timestamps as floats and lose precision on the last digits.

use serde::Serialize;

/// One of the four events the orchestrator publishes. Broadcast only to the originating
/// user (spec.md §6); the broadcast target is applied by the caller, not carried here.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PluginEvent {
    AgentCreated {
        cursor_agent_id: String,
        channel_id: String,
        post_id: String,
        updated_at: String,
    },
    AgentStatusChange {
        cursor_agent_id: String,
        status: String,
        pr_url: Option<String>,
        updated_at: String,
    },
    WorkflowPhaseChange {
        workflow_id: String,
        phase: String,
        updated_at: String,
    },
    ReviewLoopChanged {
        review_loop_id: String,
        phase: String,
        iteration: u32,
        pr_url: String,
        updated_at: String,
    },
}

impl PluginEvent {
    /// The bare event name used in the `custom_<plugin_id>_<event_name>` wire name
    /// (spec.md §6 "WebSocket event naming convention").
    pub fn name(&self) -> &'static str {
        match self {
            PluginEvent::AgentCreated { .. } => "agent_created",
            PluginEvent::AgentStatusChange { .. } => "agent_status_change",
            PluginEvent::WorkflowPhaseChange { .. } => "workflow_phase_change",
            PluginEvent::ReviewLoopChanged { .. } => "review_loop_changed",
        }
    }

    /// Serializes the payload (without the envelope) to a JSON object.
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// Renders a unix-millisecond timestamp as the decimal string the wire format uses.
pub fn millis_to_wire(millis: i64) -> String {
    millis.to_string()
}
