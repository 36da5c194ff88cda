use crate::error::{Error, Result};
use crate::ids::NodeId;
use crate::node::{Attributes, Node};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Explicit tree node with an owned child list, produced by [`materialize`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TreeNode {
    pub id: NodeId,
    pub lft: i64,
    pub rgt: i64,
    pub attributes: Attributes,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    fn from_row(row: Node) -> Self {
        Self {
            id: row.id,
            lft: row.lft,
            rgt: row.rgt,
            attributes: row.attributes,
            children: Vec::new(),
        }
    }

    /// Recursive count of all nodes below this one.
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }
}

/// Rebuild the explicit tree from a flat row sequence ordered ascending by
/// `lft`, in one linear pass with a stack of currently open ancestors.
///
/// The ordering is a precondition, not re-sorted here; rows out of order, a
/// partial interval overlap, or more than one root are reported as
/// [`Error::Consistency`]. No parent column is needed: a row's parent is the
/// innermost open interval still containing it, and an ancestor is closed as
/// soon as the next row starts past its `rgt`. Works on non-contiguous trees,
/// which the gap-closing compactor relies on. O(n) time, O(depth) stack.
pub fn materialize(rows: Vec<Node>) -> Result<Option<TreeNode>> {
    let mut stack: Vec<TreeNode> = Vec::new();
    let mut prev_lft = i64::MIN;

    for row in rows {
        if row.lft <= prev_lft {
            return Err(Error::Consistency("rows not ordered ascending by lft".into()));
        }
        prev_lft = row.lft;

        // close every ancestor whose subtree ended before this row
        while stack.last().is_some_and(|top| top.rgt < row.lft) {
            if let Some(done) = stack.pop() {
                match stack.last_mut() {
                    Some(parent) => parent.children.push(done),
                    None => {
                        return Err(Error::Consistency(
                            "row set contains more than one root".into(),
                        ))
                    }
                }
            }
        }
        if let Some(top) = stack.last() {
            if row.rgt > top.rgt {
                return Err(Error::Consistency(format!(
                    "partial overlap between ({},{}) and ({},{})",
                    top.lft, top.rgt, row.lft, row.rgt
                )));
            }
        }
        stack.push(TreeNode::from_row(row));
    }

    // whatever is still open nests into its stack predecessor
    while stack.len() > 1 {
        if let Some(done) = stack.pop() {
            if let Some(parent) = stack.last_mut() {
                parent.children.push(done);
            }
        }
    }
    Ok(stack.pop())
}
