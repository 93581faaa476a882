//! Remote coding-agent HTTP client (spec.md §4.C): launch, poll, follow up, stop, list models.

mod client;
mod error;
mod transport;
pub mod types;

pub use client::{Client, Deadline};
pub use error::ClientError;
pub use transport::{RawResponse, ReqwestTransport, Transport};
pub use types::*;
