#![forbid(unsafe_code)]
//! Nested-set tree engine: trees encoded as `(lft, rgt)` intervals over a linear
//! key space (the Modified Preorder Tree Traversal model), mutated through
//! structural operations that keep the global numbering invariants intact at
//! every commit boundary.
//!
//! This crate stays independent of concrete storage engines so it can sit on
//! top of SQLite, an in-memory map, or any host that can satisfy the
//! [`NodeStore`] trait defined here.

pub mod engine;
pub mod error;
pub mod ids;
pub mod materialize;
pub mod node;
pub mod query;
pub mod traits;

pub use engine::NestedSet;
pub use error::{Error, Result};
pub use ids::{NodeId, TreeId};
pub use materialize::{materialize, TreeNode};
pub use node::{validate_rows, Attributes, Node};
pub use traits::{Bound, MemoryNodeStore, NodeStore, Selector};
