//! Attachment / notification builders (spec.md §4.K).

mod agent;
mod hitl;
mod review;

pub use agent::{failed_attachment, finished_attachment, launch_attachment, render_api_error, running_attachment, stopped_attachment};
pub use hitl::{context_review_attachment, pending_feedback_ack_attachment, plan_review_attachment, please_wait_attachment, rejected_attachment};
pub use review::{phase_message, reaction_for_phase};
