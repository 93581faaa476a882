//! Webhook ingestion layer (spec.md §4.E): signature verification, body size cap, delivery
//! idempotency, and event-type dispatch.

mod error;
mod event;
mod receiver;
mod signature;

pub use error::WebhookError;
pub use event::{IssueCommentEvent, PullRequestEvent, PullRequestReviewCommentEvent, PullRequestReviewEvent, WebhookEvent};
pub use receiver::{router, ReceiverState, WebhookDispatch, MAX_BODY_BYTES};
pub use signature::verify as verify_signature;
