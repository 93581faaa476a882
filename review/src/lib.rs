//! Automated PR review-loop engine and feedback extraction pipeline (spec.md §4.I, §4.J).

mod classify;
mod digest;
mod engine;
mod error;
mod extract;

pub use classify::{classify, ClassifyResult};
pub use digest::{compute_digest, fingerprint};
pub use engine::ReviewEngine;
pub use error::ReviewError;
pub use extract::{candidates_from, extract, DropReason, ExtractedFinding, RawCandidate, CODERABBIT_LOGIN};
