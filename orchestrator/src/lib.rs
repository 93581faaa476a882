mod actions;
mod api;
mod dispatch;
mod error;
mod launch;
mod poller;
mod state;
#[cfg(test)]
mod test_support;

pub use actions::ActionRequest;
pub use dispatch::WebhookRouter;
pub use error::OrchestratorError;
pub use poller::Poller;
pub use state::Orchestrator;
