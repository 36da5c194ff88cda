#![forbid(unsafe_code)]
//! SQLite-backed [`nestedset_core::NodeStore`] adapter. One `nodes` table
//! keyed by `(tree, id)` carries every tree; interval selectors compile to
//! WHERE clauses and bulk shifts to conditional UPDATEs, so the engine's
//! multi-row renumbering stays inside SQLite transactions.

pub mod storage;

pub use storage::SqliteNodeStore;
