#[path = "e2e/common.rs"]
mod common;
#[path = "e2e/agents.rs"]
mod agents;
#[path = "e2e/health.rs"]
mod health;
#[path = "e2e/hitl_response.rs"]
mod hitl_response;
