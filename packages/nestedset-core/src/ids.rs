#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unique identifier for one stored node row. Assigned by the node store on
/// insert and opaque to the engine.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeId(pub u64);

/// Name of one tree. Every operation and store call is partitioned by tree;
/// numbering spaces of different trees never interact.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TreeId(pub String);

impl TreeId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TreeId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}
