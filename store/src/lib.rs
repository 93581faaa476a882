//! KV store façade (spec.md §4.A): typed CRUD plus secondary indexes over an opaque
//! string-keyed byte store with optional TTL.
//!
//! Two layers, mirroring the teacher's `SqliteStore` (generic namespace/key/value table)
//! layered under a domain-specific façade:
//!
//! - [`kv`]: the opaque byte store — `get`/`set`/`delete`/`scan_prefix`, with lazy TTL
//!   expiry. Knows nothing about agents, workflows, or review loops.
//! - [`facade`]: [`Store`], the typed façade spec.md §4.A describes. Every `save_*` method
//!   is responsible for adding or removing the entity's secondary index entries so the
//!   invariants in spec.md §8 hold without the caller having to know the index layout.

mod error;
mod facade;
mod keys;
mod kv;
pub mod types;

pub use error::StoreError;
pub use facade::Store;
pub use kv::{KvStore, SqliteKv};
pub use types::*;
