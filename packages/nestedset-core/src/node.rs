use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::ids::NodeId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Opaque user-defined fields carried by a node. Structural operations never
/// touch these; attribute updates never touch intervals.
pub type Attributes = BTreeMap<String, String>;

/// One stored row of a tree: an interval over the tree's numbering space plus
/// the user field map.
///
/// Ancestry is interval containment, sibling order is `lft` order, and a node
/// is a leaf exactly when its interval spans two units.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Node {
    pub id: NodeId,
    pub lft: i64,
    pub rgt: i64,
    pub attributes: Attributes,
}

impl Node {
    /// Number of interval units the subtree occupies: `rgt - lft + 1`, always even.
    pub fn size(&self) -> i64 {
        self.rgt - self.lft + 1
    }

    pub fn is_leaf(&self) -> bool {
        self.rgt == self.lft + 1
    }

    /// The root of a contiguous tree is the row numbered from 1.
    pub fn is_root(&self) -> bool {
        self.lft == 1
    }

    /// Children plus all deeper descendants: `(rgt - lft - 1) / 2`.
    pub fn descendant_count(&self) -> i64 {
        (self.rgt - self.lft - 1) / 2
    }

    /// Whether `other` lies inside this node's subtree, the node itself included.
    pub fn contains(&self, other: &Node) -> bool {
        self.lft <= other.lft && other.rgt <= self.rgt
    }

    pub fn is_ancestor_or_self(&self, other: &Node) -> bool {
        self.contains(other)
    }
}

/// Check the tree invariants over a full row set ordered ascending by `lft`:
/// every interval is well-formed, any two intervals are disjoint or strictly
/// nested, and there is exactly one root. With `require_contiguous` the
/// numbering must additionally use every integer from 1 to `2 * rows.len()`
/// exactly once.
///
/// Intended for tests and debugging; mutating operations maintain these
/// invariants by construction.
pub fn validate_rows(rows: &[Node], require_contiguous: bool) -> Result<()> {
    use std::collections::BTreeSet;

    if rows.is_empty() {
        return Ok(());
    }

    let mut endpoints = BTreeSet::new();
    let mut stack: Vec<(i64, i64)> = Vec::new();
    let mut prev_lft = i64::MIN;
    let mut roots = 0usize;

    for n in rows {
        if n.lft >= n.rgt {
            return Err(Error::Consistency(format!(
                "node {} has lft {} >= rgt {}",
                n.id.0, n.lft, n.rgt
            )));
        }
        if n.lft <= prev_lft {
            return Err(Error::Consistency("rows not strictly ordered by lft".into()));
        }
        prev_lft = n.lft;
        if !endpoints.insert(n.lft) || !endpoints.insert(n.rgt) {
            return Err(Error::Consistency(format!(
                "duplicate interval endpoint in node {}",
                n.id.0
            )));
        }
        while stack.last().is_some_and(|&(_, rgt)| rgt < n.lft) {
            stack.pop();
        }
        match stack.last() {
            Some(&(lft, rgt)) => {
                if n.rgt > rgt {
                    return Err(Error::Consistency(format!(
                        "partial overlap between ({lft},{rgt}) and ({},{})",
                        n.lft, n.rgt
                    )));
                }
            }
            None => roots += 1,
        }
        stack.push((n.lft, n.rgt));
    }

    if roots != 1 {
        return Err(Error::Consistency(format!("expected one root, found {roots}")));
    }

    if require_contiguous {
        let mut want = 1i64;
        for endpoint in &endpoints {
            if *endpoint != want {
                return Err(Error::NonContiguous);
            }
            want += 1;
        }
        if want != 2 * rows.len() as i64 + 1 {
            return Err(Error::NonContiguous);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: u64, lft: i64, rgt: i64) -> Node {
        Node {
            id: NodeId(id),
            lft,
            rgt,
            attributes: Attributes::new(),
        }
    }

    #[test]
    fn interval_predicates() {
        let root = node(1, 1, 8);
        let inner = node(2, 2, 5);
        let leaf = node(3, 3, 4);

        assert_eq!(root.size(), 8);
        assert_eq!(root.descendant_count(), 3);
        assert!(leaf.is_leaf());
        assert!(!inner.is_leaf());
        assert!(root.is_root());
        assert!(root.contains(&inner));
        assert!(inner.contains(&leaf));
        assert!(!leaf.contains(&inner));
        assert!(inner.is_ancestor_or_self(&inner));
    }

    #[test]
    fn validates_nesting() {
        let good = vec![node(1, 1, 6), node(2, 2, 5), node(3, 3, 4)];
        validate_rows(&good, true).unwrap();

        let overlap = vec![node(1, 1, 6), node(2, 2, 5), node(3, 4, 7)];
        assert!(matches!(
            validate_rows(&overlap, false),
            Err(Error::Consistency(_))
        ));
    }

    #[test]
    fn detects_gaps() {
        // node (2,3) deleted without closing the gap
        let gapped = vec![node(1, 1, 6), node(2, 4, 5)];
        assert!(matches!(
            validate_rows(&gapped, true),
            Err(Error::NonContiguous)
        ));
        validate_rows(&gapped, false).unwrap();
    }
}
