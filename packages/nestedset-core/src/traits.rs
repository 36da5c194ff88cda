use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::ids::{NodeId, TreeId};
use crate::node::{Attributes, Node};

/// Interval predicate a store must be able to evaluate.
///
/// Kept as data rather than closures so SQL-backed stores can compile each
/// selector to a WHERE clause.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Selector {
    All,
    LftGe(i64),
    LftGt(i64),
    RgtGe(i64),
    RgtGt(i64),
    /// Rows strictly inside the interval: the descendants of the node that
    /// spans it.
    Within { lft: i64, rgt: i64 },
    /// Rows whose interval contains the position, the row starting or ending
    /// at it included: the ancestor chain of that position.
    Contains(i64),
    /// Rows whose interval lies inside `[lft, rgt]`, bounds included: a whole
    /// subtree, its root row included.
    Interval { lft: i64, rgt: i64 },
}

impl Selector {
    pub fn matches(&self, lft: i64, rgt: i64) -> bool {
        match *self {
            Selector::All => true,
            Selector::LftGe(v) => lft >= v,
            Selector::LftGt(v) => lft > v,
            Selector::RgtGe(v) => rgt >= v,
            Selector::RgtGt(v) => rgt > v,
            Selector::Within { lft: l, rgt: r } => lft > l && rgt < r,
            Selector::Contains(pos) => lft <= pos && pos <= rgt,
            Selector::Interval { lft: l, rgt: r } => lft >= l && rgt <= r,
        }
    }
}

/// Bound on a single interval field, used by the bulk shift updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bound {
    Ge(i64),
    Gt(i64),
}

impl Bound {
    pub fn matches(&self, value: i64) -> bool {
        match *self {
            Bound::Ge(v) => value >= v,
            Bound::Gt(v) => value > v,
        }
    }
}

/// Contract between the engine and the backing row store.
///
/// The store owns row durability and id assignment; the engine holds no cached
/// copy of any tree across calls. Every mutating engine operation brackets its
/// reads and writes with `begin`/`commit` on one tree and expects serializable
/// semantics: concurrent mutators on the same tree must not interleave their
/// read-then-shift sequences.
pub trait NodeStore {
    fn get(&self, tree: &TreeId, id: NodeId) -> Result<Option<Node>>;

    /// Root lookup: the row with `lft == 1`, if any.
    fn root(&self, tree: &TreeId) -> Result<Option<Node>>;

    /// All rows matching the selector, ordered ascending by `lft`.
    fn range_query(&self, tree: &TreeId, selector: Selector) -> Result<Vec<Node>>;

    /// Add `delta` to `lft` of every row whose `lft` satisfies the bound.
    fn shift_lft(&mut self, tree: &TreeId, bound: Bound, delta: i64) -> Result<usize>;

    /// Add `delta` to `rgt` of every row whose `rgt` satisfies the bound.
    fn shift_rgt(&mut self, tree: &TreeId, bound: Bound, delta: i64) -> Result<usize>;

    /// Add `delta` to both fields of every row whose interval lies inside
    /// `[lft_from, rgt_to]`. Used to park and re-seat whole move blocks.
    fn shift_block(&mut self, tree: &TreeId, lft_from: i64, rgt_to: i64, delta: i64)
        -> Result<usize>;

    /// Insert a fresh row; the store assigns and returns its id.
    fn insert(&mut self, tree: &TreeId, lft: i64, rgt: i64, attributes: Attributes)
        -> Result<NodeId>;

    fn set_interval(&mut self, tree: &TreeId, id: NodeId, lft: i64, rgt: i64) -> Result<()>;

    fn set_attributes(&mut self, tree: &TreeId, id: NodeId, attributes: Attributes) -> Result<()>;

    /// Delete every row whose interval lies inside `[lft, rgt]`.
    fn delete_range(&mut self, tree: &TreeId, lft: i64, rgt: i64) -> Result<usize>;

    fn count(&self, tree: &TreeId) -> Result<usize>;

    fn begin(&mut self, tree: &TreeId) -> Result<()>;
    fn commit(&mut self, tree: &TreeId) -> Result<()>;
    fn rollback(&mut self, tree: &TreeId) -> Result<()>;
}

struct TxnSnapshot {
    rows: HashMap<NodeId, Node>,
    next_id: u64,
}

/// In-memory map-backed store for tests and early prototyping. Transactions
/// are clone-on-begin snapshots; serialization of concurrent mutators comes
/// for free from `&mut self` ownership.
#[derive(Default)]
pub struct MemoryNodeStore {
    trees: HashMap<TreeId, HashMap<NodeId, Node>>,
    open: HashMap<TreeId, TxnSnapshot>,
    next_id: u64,
}

impl MemoryNodeStore {
    fn rows(&self, tree: &TreeId) -> Option<&HashMap<NodeId, Node>> {
        self.trees.get(tree)
    }

    fn rows_mut(&mut self, tree: &TreeId) -> &mut HashMap<NodeId, Node> {
        self.trees.entry(tree.clone()).or_default()
    }
}

impl NodeStore for MemoryNodeStore {
    fn get(&self, tree: &TreeId, id: NodeId) -> Result<Option<Node>> {
        Ok(self.rows(tree).and_then(|rows| rows.get(&id).cloned()))
    }

    fn root(&self, tree: &TreeId) -> Result<Option<Node>> {
        Ok(self
            .rows(tree)
            .and_then(|rows| rows.values().find(|n| n.lft == 1).cloned()))
    }

    fn range_query(&self, tree: &TreeId, selector: Selector) -> Result<Vec<Node>> {
        let mut out: Vec<Node> = self
            .rows(tree)
            .map(|rows| {
                rows.values()
                    .filter(|n| selector.matches(n.lft, n.rgt))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        out.sort_by_key(|n| n.lft);
        Ok(out)
    }

    fn shift_lft(&mut self, tree: &TreeId, bound: Bound, delta: i64) -> Result<usize> {
        let mut updated = 0;
        for node in self.rows_mut(tree).values_mut() {
            if bound.matches(node.lft) {
                node.lft += delta;
                updated += 1;
            }
        }
        Ok(updated)
    }

    fn shift_rgt(&mut self, tree: &TreeId, bound: Bound, delta: i64) -> Result<usize> {
        let mut updated = 0;
        for node in self.rows_mut(tree).values_mut() {
            if bound.matches(node.rgt) {
                node.rgt += delta;
                updated += 1;
            }
        }
        Ok(updated)
    }

    fn shift_block(
        &mut self,
        tree: &TreeId,
        lft_from: i64,
        rgt_to: i64,
        delta: i64,
    ) -> Result<usize> {
        let mut updated = 0;
        for node in self.rows_mut(tree).values_mut() {
            if node.lft >= lft_from && node.rgt <= rgt_to {
                node.lft += delta;
                node.rgt += delta;
                updated += 1;
            }
        }
        Ok(updated)
    }

    fn insert(
        &mut self,
        tree: &TreeId,
        lft: i64,
        rgt: i64,
        attributes: Attributes,
    ) -> Result<NodeId> {
        self.next_id += 1;
        let id = NodeId(self.next_id);
        self.rows_mut(tree).insert(
            id,
            Node {
                id,
                lft,
                rgt,
                attributes,
            },
        );
        Ok(id)
    }

    fn set_interval(&mut self, tree: &TreeId, id: NodeId, lft: i64, rgt: i64) -> Result<()> {
        let node = self
            .rows_mut(tree)
            .get_mut(&id)
            .ok_or(Error::InvalidId(id.0))?;
        node.lft = lft;
        node.rgt = rgt;
        Ok(())
    }

    fn set_attributes(&mut self, tree: &TreeId, id: NodeId, attributes: Attributes) -> Result<()> {
        let node = self
            .rows_mut(tree)
            .get_mut(&id)
            .ok_or(Error::InvalidId(id.0))?;
        node.attributes = attributes;
        Ok(())
    }

    fn delete_range(&mut self, tree: &TreeId, lft: i64, rgt: i64) -> Result<usize> {
        let rows = self.rows_mut(tree);
        let before = rows.len();
        rows.retain(|_, n| !(n.lft >= lft && n.rgt <= rgt));
        Ok(before - rows.len())
    }

    fn count(&self, tree: &TreeId) -> Result<usize> {
        Ok(self.rows(tree).map(|rows| rows.len()).unwrap_or(0))
    }

    fn begin(&mut self, tree: &TreeId) -> Result<()> {
        if self.open.contains_key(tree) {
            return Err(Error::Storage(format!(
                "transaction already open for tree {}",
                tree.as_str()
            )));
        }
        let snapshot = TxnSnapshot {
            rows: self.trees.get(tree).cloned().unwrap_or_default(),
            next_id: self.next_id,
        };
        self.open.insert(tree.clone(), snapshot);
        Ok(())
    }

    fn commit(&mut self, tree: &TreeId) -> Result<()> {
        self.open
            .remove(tree)
            .map(|_| ())
            .ok_or_else(|| Error::Storage(format!("no open transaction for tree {}", tree.as_str())))
    }

    fn rollback(&mut self, tree: &TreeId) -> Result<()> {
        let snapshot = self
            .open
            .remove(tree)
            .ok_or_else(|| Error::Storage(format!("no open transaction for tree {}", tree.as_str())))?;
        self.trees.insert(tree.clone(), snapshot.rows);
        self.next_id = snapshot.next_id;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollback_restores_rows_and_ids() {
        let tree = TreeId::new("t");
        let mut store = MemoryNodeStore::default();
        let root = store.insert(&tree, 1, 2, Attributes::new()).unwrap();

        store.begin(&tree).unwrap();
        store.shift_rgt(&tree, Bound::Ge(2), 2).unwrap();
        store.insert(&tree, 2, 3, Attributes::new()).unwrap();
        store.rollback(&tree).unwrap();

        assert_eq!(store.count(&tree).unwrap(), 1);
        let row = store.get(&tree, root).unwrap().unwrap();
        assert_eq!((row.lft, row.rgt), (1, 2));
        // id sequence rewinds with the snapshot
        let next = store.insert(&tree, 2, 3, Attributes::new()).unwrap();
        assert_eq!(next.0, root.0 + 1);
    }

    #[test]
    fn selectors_match_expected_rows() {
        let tree = TreeId::new("t");
        let mut store = MemoryNodeStore::default();
        store.insert(&tree, 1, 6, Attributes::new()).unwrap();
        store.insert(&tree, 2, 3, Attributes::new()).unwrap();
        store.insert(&tree, 4, 5, Attributes::new()).unwrap();

        let inside = store
            .range_query(&tree, Selector::Within { lft: 1, rgt: 6 })
            .unwrap();
        assert_eq!(inside.len(), 2);
        assert!(inside[0].lft < inside[1].lft);

        let ancestors = store.range_query(&tree, Selector::Contains(4)).unwrap();
        assert_eq!(ancestors.len(), 2);

        let tail = store.range_query(&tree, Selector::LftGe(4)).unwrap();
        assert_eq!(tail.len(), 1);
    }
}
