use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::ids::{NodeId, TreeId};
use crate::node::{Attributes, Node};
use crate::query::children_rows;
use crate::traits::{Bound, NodeStore, Selector};

/// Nested-set engine facade generic over its node store.
///
/// Every mutating operation re-reads exactly the rows it needs inside its own
/// store transaction, validates before the first write, and commits all
/// interval shifts atomically; a rejected operation leaves the tree untouched.
///
/// With id checks enabled (`with_id_checks`), every id-typed argument is
/// validated against the store before the transaction opens, trading one extra
/// read for early, precise [`Error::InvalidId`] reporting.
pub struct NestedSet<S: NodeStore> {
    pub(crate) store: S,
    pub(crate) id_checks: bool,
}

impl<S: NodeStore> NestedSet<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            id_checks: false,
        }
    }

    pub fn with_id_checks(mut self, enabled: bool) -> Self {
        self.id_checks = enabled;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Create a node as the last child of `parent`, or as the root of an empty
    /// tree when no parent is given. Creating a second root is rejected.
    pub fn append_child(
        &mut self,
        tree: &TreeId,
        parent: Option<NodeId>,
        attributes: Attributes,
    ) -> Result<NodeId> {
        if self.id_checks {
            if let Some(pid) = parent {
                require(&self.store, tree, pid)?;
            }
        }
        let id = self.transact(tree, |store| match parent {
            None => {
                if store.root(tree)?.is_some() {
                    return Err(Error::RootOperation);
                }
                store.insert(tree, 1, 2, attributes)
            }
            Some(pid) => {
                ensure_contiguous(store, tree)?;
                let parent = require(store, tree, pid)?;
                insert_at_anchor(store, tree, parent.rgt, attributes)
            }
        })?;
        debug!(tree = tree.as_str(), id = id.0, "append_child");
        Ok(id)
    }

    /// Create a node as the previous sibling of `sibling`, before its whole
    /// subtree. The sibling must not be the root.
    pub fn insert_before(
        &mut self,
        tree: &TreeId,
        sibling: NodeId,
        attributes: Attributes,
    ) -> Result<NodeId> {
        self.insert_beside(tree, sibling, attributes, true)
    }

    /// Create a node as the next sibling of `sibling`, past its whole subtree
    /// so the sibling keeps all of its descendants. The sibling must not be
    /// the root.
    pub fn insert_after(
        &mut self,
        tree: &TreeId,
        sibling: NodeId,
        attributes: Attributes,
    ) -> Result<NodeId> {
        self.insert_beside(tree, sibling, attributes, false)
    }

    fn insert_beside(
        &mut self,
        tree: &TreeId,
        sibling: NodeId,
        attributes: Attributes,
        before: bool,
    ) -> Result<NodeId> {
        if self.id_checks {
            require(&self.store, tree, sibling)?;
        }
        let id = self.transact(tree, |store| {
            ensure_contiguous(store, tree)?;
            let sibling = require(store, tree, sibling)?;
            if sibling.is_root() {
                return Err(Error::RootOperation);
            }
            let anchor = if before { sibling.lft } else { sibling.rgt + 1 };
            insert_at_anchor(store, tree, anchor, attributes)
        })?;
        debug!(tree = tree.as_str(), id = id.0, before, "insert_beside");
        Ok(id)
    }

    /// Create a node as the `index`-th child of `parent`. `index` is 0-based
    /// over the current children in interval order; negative values count from
    /// the end, `-1` appending after the current last child. An index past the
    /// end appends; an index with no valid anchor fails without writing.
    pub fn insert_child_at_index(
        &mut self,
        tree: &TreeId,
        parent: NodeId,
        index: isize,
        attributes: Attributes,
    ) -> Result<NodeId> {
        if self.id_checks {
            require(&self.store, tree, parent)?;
        }
        let id = self.transact(tree, |store| {
            ensure_contiguous(store, tree)?;
            let parent = require(store, tree, parent)?;
            let anchor = resolve_index_anchor(store, tree, &parent, index)?;
            insert_at_anchor(store, tree, anchor, attributes)
        })?;
        debug!(tree = tree.as_str(), id = id.0, index, "insert_child_at_index");
        Ok(id)
    }

    /// Relocate the subtree of `id` so that it becomes the previous sibling of
    /// `reference`, which must not be the root nor lie inside the moved subtree.
    pub fn move_before(&mut self, tree: &TreeId, id: NodeId, reference: NodeId) -> Result<()> {
        self.move_beside(tree, id, reference, true)
    }

    /// Relocate the subtree of `id` past the whole subtree of `reference`.
    /// Same restrictions as [`NestedSet::move_before`].
    pub fn move_after(&mut self, tree: &TreeId, id: NodeId, reference: NodeId) -> Result<()> {
        self.move_beside(tree, id, reference, false)
    }

    fn move_beside(
        &mut self,
        tree: &TreeId,
        id: NodeId,
        reference: NodeId,
        before: bool,
    ) -> Result<()> {
        if self.id_checks {
            require(&self.store, tree, id)?;
            require(&self.store, tree, reference)?;
        }
        self.transact(tree, |store| {
            ensure_contiguous(store, tree)?;
            let moved = require(store, tree, id)?;
            let reference = require(store, tree, reference)?;
            if reference.is_root() {
                return Err(Error::RootOperation);
            }
            if moved.contains(&reference) {
                return Err(Error::Cycle);
            }
            let anchor = if before {
                reference.lft
            } else {
                reference.rgt + 1
            };
            relocate_block(store, tree, &moved, anchor)
        })?;
        debug!(
            tree = tree.as_str(),
            id = id.0,
            reference = reference.0,
            before,
            "move_beside"
        );
        Ok(())
    }

    /// Relocate the subtree of `id` to the `index`-th child slot of `parent`,
    /// with the index rules of [`NestedSet::insert_child_at_index`]. The
    /// destination parent must not lie inside the moved subtree.
    pub fn move_at_index(
        &mut self,
        tree: &TreeId,
        id: NodeId,
        parent: NodeId,
        index: isize,
    ) -> Result<()> {
        if self.id_checks {
            require(&self.store, tree, id)?;
            require(&self.store, tree, parent)?;
        }
        self.transact(tree, |store| {
            ensure_contiguous(store, tree)?;
            let moved = require(store, tree, id)?;
            let parent = require(store, tree, parent)?;
            if moved.contains(&parent) {
                return Err(Error::Cycle);
            }
            let anchor = resolve_index_anchor(store, tree, &parent, index)?;
            relocate_block(store, tree, &moved, anchor)
        })?;
        debug!(
            tree = tree.as_str(),
            id = id.0,
            parent = parent.0,
            index,
            "move_at_index"
        );
        Ok(())
    }

    /// Delete the node and every descendant, returning the number of rows
    /// removed. With `close_gaps` the freed numbering range is reclaimed
    /// immediately; without it the tree is left non-contiguous and only
    /// further deferred deletions and [`NestedSet::close_gaps`] are accepted
    /// until compaction runs.
    pub fn delete_subtree(&mut self, tree: &TreeId, id: NodeId, close_gaps: bool) -> Result<usize> {
        if self.id_checks {
            require(&self.store, tree, id)?;
        }
        let deleted = self.transact(tree, |store| {
            if close_gaps {
                ensure_contiguous(store, tree)?;
            }
            let node = require(store, tree, id)?;
            let deleted = store.delete_range(tree, node.lft, node.rgt)?;
            if close_gaps {
                let width = node.size();
                store.shift_lft(tree, Bound::Gt(node.rgt), -width)?;
                store.shift_rgt(tree, Bound::Gt(node.rgt), -width)?;
            }
            Ok(deleted)
        })?;
        debug!(tree = tree.as_str(), id = id.0, deleted, close_gaps, "delete_subtree");
        Ok(deleted)
    }

    /// Full-tree compaction: reassign a fresh, contiguous depth-first
    /// numbering that preserves the relative order and nesting of every
    /// surviving row. Cost is proportional to the tree size, so callers batch
    /// deferred deletions and invoke this once.
    pub fn close_gaps(&mut self, tree: &TreeId) -> Result<()> {
        self.transact(tree, |store| {
            let rows = store.range_query(tree, Selector::All)?;
            let mut next = 1i64;
            let mut open: Vec<(NodeId, i64, i64)> = Vec::new(); // (id, old rgt, new lft)
            let mut updates: Vec<(NodeId, i64, i64)> = Vec::new();
            for row in &rows {
                while open.last().is_some_and(|&(_, old_rgt, _)| old_rgt < row.lft) {
                    if let Some((id, _, new_lft)) = open.pop() {
                        updates.push((id, new_lft, next));
                        next += 1;
                    }
                }
                open.push((row.id, row.rgt, next));
                next += 1;
            }
            while let Some((id, _, new_lft)) = open.pop() {
                updates.push((id, new_lft, next));
                next += 1;
            }
            for (id, lft, rgt) in updates {
                store.set_interval(tree, id, lft, rgt)?;
            }
            Ok(())
        })?;
        debug!(tree = tree.as_str(), "close_gaps");
        Ok(())
    }

    /// Merge user fields into a node without touching its interval. An update
    /// carrying no fields is rejected.
    pub fn update_attributes(
        &mut self,
        tree: &TreeId,
        id: NodeId,
        attributes: Attributes,
    ) -> Result<()> {
        if attributes.is_empty() {
            return Err(Error::EmptyAttributes);
        }
        if self.id_checks {
            require(&self.store, tree, id)?;
        }
        self.transact(tree, |store| {
            let node = require(store, tree, id)?;
            let mut merged = node.attributes;
            merged.extend(attributes);
            store.set_attributes(tree, id, merged)
        })
    }

    fn transact<T>(&mut self, tree: &TreeId, f: impl FnOnce(&mut S) -> Result<T>) -> Result<T> {
        self.store.begin(tree)?;
        match f(&mut self.store) {
            Ok(value) => {
                self.store.commit(tree)?;
                Ok(value)
            }
            Err(err) => {
                // the operation's own error stays the caller-visible one
                if let Err(rollback_err) = self.store.rollback(tree) {
                    error!(
                        tree = tree.as_str(),
                        error = %rollback_err,
                        "rollback failed, transaction may still be open"
                    );
                }
                Err(err)
            }
        }
    }
}

pub(crate) fn require<S: NodeStore>(store: &S, tree: &TreeId, id: NodeId) -> Result<Node> {
    store.get(tree, id)?.ok_or(Error::InvalidId(id.0))
}

/// Reject operations that treat the numbering as dense while unused integers
/// remain from deferred deletions. A contiguous tree of `n` rows has a root
/// spanning exactly `2n` units.
pub(crate) fn ensure_contiguous<S: NodeStore>(store: &S, tree: &TreeId) -> Result<()> {
    let count = store.count(tree)?;
    if count == 0 {
        return Ok(());
    }
    let root = store.root(tree)?.ok_or_else(|| {
        Error::Consistency("non-empty tree has no row at lft = 1".into())
    })?;
    if root.size() != 2 * count as i64 {
        return Err(Error::NonContiguous);
    }
    Ok(())
}

/// Open a two-unit gap at `anchor` and seat a new leaf in it.
fn insert_at_anchor<S: NodeStore>(
    store: &mut S,
    tree: &TreeId,
    anchor: i64,
    attributes: Attributes,
) -> Result<NodeId> {
    let rgt = anchor.checked_add(1).ok_or(Error::CapacityExceeded)?;
    store.shift_lft(tree, Bound::Ge(anchor), 2)?;
    store.shift_rgt(tree, Bound::Ge(anchor), 2)?;
    store.insert(tree, anchor, rgt, attributes)
}

/// Resolve a 0-based child index of `parent` to an insertion anchor. Negative
/// indices count from the end (`-1` appends after the current last child); an
/// index past the end appends; anything else has no anchor.
fn resolve_index_anchor<S: NodeStore>(
    store: &S,
    tree: &TreeId,
    parent: &Node,
    index: isize,
) -> Result<i64> {
    let children = children_rows(store, tree, parent)?;
    let len = children.len() as isize;
    let slot = if index < 0 { len + index + 1 } else { index };
    if slot < 0 || (len == 0 && slot > 0) {
        return Err(Error::IndexOutOfRange(index));
    }
    if slot >= len {
        // append as last child
        Ok(parent.rgt)
    } else {
        Ok(children[slot as usize].lft)
    }
}

/// Three-phase subtree relocation: park the block in negative interval space,
/// close the gap it left, re-open a gap of the same width at the destination
/// anchor, and seat the block there with one constant offset. Relative
/// lft/rgt relationships inside the block never change, so every descendant
/// link survives. No interval units are allocated or freed overall.
///
/// `anchor` is resolved against the pre-removal numbering and adjusted here
/// when the removal shifts it. It must not lie strictly inside the moved
/// block; callers rule that out with the cycle checks.
fn relocate_block<S: NodeStore>(
    store: &mut S,
    tree: &TreeId,
    moved: &Node,
    mut anchor: i64,
) -> Result<()> {
    let width = moved.size();
    // park: block rows end up spanning [-width, -1], untouched by the
    // positive-space shifts below
    let park = moved
        .rgt
        .checked_add(1)
        .ok_or(Error::CapacityExceeded)?;
    store.shift_block(tree, moved.lft, moved.rgt, -park)?;

    // close the source gap
    store.shift_lft(tree, Bound::Gt(moved.rgt), -width)?;
    store.shift_rgt(tree, Bound::Gt(moved.rgt), -width)?;
    if anchor > moved.rgt {
        anchor -= width;
    }

    // open the destination gap
    store.shift_lft(tree, Bound::Ge(anchor), width)?;
    store.shift_rgt(tree, Bound::Ge(anchor), width)?;

    // seat the parked block
    let offset = anchor.checked_add(width).ok_or(Error::CapacityExceeded)?;
    store.shift_block(tree, -width, -1, offset)?;
    Ok(())
}
