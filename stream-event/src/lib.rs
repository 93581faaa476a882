//! Published-event protocol (spec.md §6 "Published events").
//!
//! This crate defines the wire shape of the four events the orchestrator publishes
//! (`agent_created`, `agent_status_change`, `workflow_phase_change`, `review_loop_changed`)
//! and the envelope that namespaces them on the host's websocket as
//! `custom_<plugin_id>_<event_name>`. It has no dependency on the rest of the workspace so
//! `orchestrator`, `hitl`, and `review` can each depend on it without a cycle.

pub mod envelope;
pub mod event;

pub use envelope::{topic_name, Envelope};
pub use event::PluginEvent;
