//! Trait surface for the chat host, the interactive-dialog surface, and the published-event
//! transport — all out-of-scope external collaborators per spec.md §1 modeled here only as
//! interfaces.

mod error;
mod host;
pub mod types;

pub use error::ChatHostError;
pub use host::{publish, ChatHost};
pub use types::*;
