//! Envelope: namespaces a [`crate::PluginEvent`] onto the host's websocket topic name.
//!
//! spec.md §6: "WebSocket event naming convention: `custom_<plugin_id>_<event_name>` on the
//! wire." The envelope also carries the originating user id, since every published event is
//! broadcast only to that user.

use serde_json::Value;

use crate::event::PluginEvent;

/// Builds the `custom_<plugin_id>_<event_name>` topic name for a given event.
pub fn topic_name(plugin_id: &str, event: &PluginEvent) -> String {
    format!("custom_{plugin_id}_{}", event.name())
}

/// A published event plus the routing metadata the host needs to deliver it.
#[derive(Clone, Debug)]
pub struct Envelope {
    pub topic: String,
    pub target_user_id: String,
    pub payload: Value,
}

impl Envelope {
    /// Wraps `event` for delivery to `target_user_id` only (spec.md §6: "each broadcast only
    /// to the originating user").
    pub fn new(
        plugin_id: &str,
        target_user_id: impl Into<String>,
        event: &PluginEvent,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            topic: topic_name(plugin_id, event),
            target_user_id: target_user_id.into(),
            payload: event.to_value()?,
        })
    }
}
