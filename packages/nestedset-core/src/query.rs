//! Read-only projections over the interval model: thin derived queries with
//! no invariants of their own. All of them observe one committed store
//! snapshot and run without a transaction. Projections driven by containment
//! alone stay correct on trees left non-contiguous by deferred deletions;
//! [`NestedSet::subtree_size`] derives a count from interval width and is
//! rejected on such trees until `close_gaps` runs.

use crate::engine::{ensure_contiguous, require, NestedSet};
use crate::error::Result;
use crate::ids::{NodeId, TreeId};
use crate::materialize::{materialize, TreeNode};
use crate::node::Node;
use crate::traits::{NodeStore, Selector};

impl<S: NodeStore> NestedSet<S> {
    /// One row by id.
    pub fn node(&self, tree: &TreeId, id: NodeId) -> Result<Node> {
        require(&self.store, tree, id)
    }

    /// Root row, if the tree is non-empty.
    pub fn root(&self, tree: &TreeId) -> Result<Option<Node>> {
        self.store.root(tree)
    }

    /// Every row of the tree, ascending by `lft`.
    pub fn rows(&self, tree: &TreeId) -> Result<Vec<Node>> {
        self.store.range_query(tree, Selector::All)
    }

    /// Ids of all rows strictly inside the node's interval, or of every
    /// non-root row when no node is given. Ascending `lft` order.
    pub fn descendant_ids(&self, tree: &TreeId, of: Option<NodeId>) -> Result<Vec<NodeId>> {
        let scope = match of {
            Some(id) => Some(require(&self.store, tree, id)?),
            None => self.store.root(tree)?,
        };
        let Some(scope) = scope else {
            return Ok(Vec::new());
        };
        let rows = self.store.range_query(
            tree,
            Selector::Within {
                lft: scope.lft,
                rgt: scope.rgt,
            },
        )?;
        Ok(rows.into_iter().map(|n| n.id).collect())
    }

    /// Rows spanning exactly two units, optionally restricted to the subtree
    /// of `within` (that node included, should it be a leaf itself).
    pub fn leaves(&self, tree: &TreeId, within: Option<NodeId>) -> Result<Vec<Node>> {
        let selector = match within {
            Some(id) => {
                let scope = require(&self.store, tree, id)?;
                Selector::Interval {
                    lft: scope.lft,
                    rgt: scope.rgt,
                }
            }
            None => Selector::All,
        };
        let rows = self.store.range_query(tree, selector)?;
        Ok(rows.into_iter().filter(|n| n.is_leaf()).collect())
    }

    /// Depth of a node: its ancestor count, the node itself excluded. The
    /// root sits at level 0.
    pub fn level(&self, tree: &TreeId, id: NodeId) -> Result<i64> {
        let node = require(&self.store, tree, id)?;
        let ancestors = self.store.range_query(tree, Selector::Contains(node.lft))?;
        Ok(ancestors.len() as i64 - 1)
    }

    /// Root-to-node path: every row whose interval contains the node's `lft`,
    /// ascending by `lft`, so the root comes first and the node itself last.
    pub fn path(&self, tree: &TreeId, id: NodeId) -> Result<Vec<Node>> {
        let node = require(&self.store, tree, id)?;
        self.store.range_query(tree, Selector::Contains(node.lft))
    }

    /// Immediate children in `lft` order.
    pub fn children(&self, tree: &TreeId, id: NodeId) -> Result<Vec<Node>> {
        let parent = require(&self.store, tree, id)?;
        children_rows(&self.store, tree, &parent)
    }

    /// Immediate children in reverse `lft` order.
    pub fn children_desc(&self, tree: &TreeId, id: NodeId) -> Result<Vec<Node>> {
        let mut children = self.children(tree, id)?;
        children.reverse();
        Ok(children)
    }

    /// Number of levels in the whole tree; 0 for an empty tree.
    pub fn height(&self, tree: &TreeId) -> Result<i64> {
        let rows = self.store.range_query(tree, Selector::All)?;
        let mut open: Vec<i64> = Vec::new();
        let mut height = 0i64;
        for row in &rows {
            while open.last().is_some_and(|&rgt| rgt < row.lft) {
                open.pop();
            }
            open.push(row.rgt);
            height = height.max(open.len() as i64);
        }
        Ok(height)
    }

    /// Node count of a subtree, the node itself included: `(rgt - lft + 1) / 2`.
    ///
    /// The formula counts numbering units, so it only holds on a contiguous
    /// tree; on a gapped one this fails with [`crate::Error::NonContiguous`]
    /// instead of counting freed units as nodes.
    pub fn subtree_size(&self, tree: &TreeId, id: NodeId) -> Result<i64> {
        ensure_contiguous(&self.store, tree)?;
        let node = require(&self.store, tree, id)?;
        Ok(node.size() / 2)
    }

    /// Materialize the whole tree into an explicit [`TreeNode`] structure.
    pub fn materialize_tree(&self, tree: &TreeId) -> Result<Option<TreeNode>> {
        let rows = self.store.range_query(tree, Selector::All)?;
        materialize(rows)
    }
}

/// Immediate children of `parent` from one strict-containment scan: walk the
/// descendants ascending by `lft` and skip each accepted child's subtree.
pub(crate) fn children_rows<S: NodeStore>(
    store: &S,
    tree: &TreeId,
    parent: &Node,
) -> Result<Vec<Node>> {
    let rows = store.range_query(
        tree,
        Selector::Within {
            lft: parent.lft,
            rgt: parent.rgt,
        },
    )?;
    let mut children = Vec::new();
    let mut bound = parent.lft;
    for row in rows {
        if row.lft > bound {
            bound = row.rgt;
            children.push(row);
        }
    }
    Ok(children)
}
