use rusqlite::types::ToSql;
use rusqlite::{params, Connection, Row};

use nestedset_core::{
    error::Error, Attributes, Bound, Node, NodeId, NodeStore, Selector, TreeId,
};

/// SQLite-backed `NodeStore` keeping every tree in one `nodes` table
/// partitioned by tree name. Attribute maps are stored as JSON text.
///
/// `BEGIN IMMEDIATE` takes the write lock up front, so concurrent mutators on
/// the same database serialize their read-then-shift sequences instead of
/// failing at commit.
pub struct SqliteNodeStore {
    conn: Connection,
    txn_open: bool,
}

impl SqliteNodeStore {
    pub fn new_in_memory() -> nestedset_core::Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        let mut store = Self {
            conn,
            txn_open: false,
        };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn new(path: &str) -> nestedset_core::Result<Self> {
        let conn = Connection::open(path).map_err(storage_err)?;
        let mut store = Self {
            conn,
            txn_open: false,
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&mut self) -> nestedset_core::Result<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS nodes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    tree TEXT NOT NULL,
                    lft INTEGER NOT NULL,
                    rgt INTEGER NOT NULL,
                    attrs TEXT NOT NULL DEFAULT '{}'
                );
                CREATE INDEX IF NOT EXISTS idx_nodes_tree_lft ON nodes(tree, lft);
                CREATE INDEX IF NOT EXISTS idx_nodes_tree_rgt ON nodes(tree, rgt);",
            )
            .map_err(storage_err)?;
        Ok(())
    }
}

fn storage_err(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

fn encode_attrs(attributes: &Attributes) -> nestedset_core::Result<String> {
    serde_json::to_string(attributes).map_err(|e| Error::Storage(e.to_string()))
}

fn row_to_node(row: &Row<'_>) -> rusqlite::Result<Node> {
    let id: i64 = row.get(0)?;
    let lft: i64 = row.get(1)?;
    let rgt: i64 = row.get(2)?;
    let attrs: String = row.get(3)?;
    let attributes: Attributes = serde_json::from_str(&attrs).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Node {
        id: NodeId(id as u64),
        lft,
        rgt,
        attributes,
    })
}

/// Compile a selector to a WHERE fragment over `lft`/`rgt`. Parameters slot
/// in after `?1`, which is always the tree name.
fn selector_clause(selector: Selector) -> (&'static str, Vec<i64>) {
    match selector {
        Selector::All => ("1 = 1", vec![]),
        Selector::LftGe(v) => ("lft >= ?2", vec![v]),
        Selector::LftGt(v) => ("lft > ?2", vec![v]),
        Selector::RgtGe(v) => ("rgt >= ?2", vec![v]),
        Selector::RgtGt(v) => ("rgt > ?2", vec![v]),
        Selector::Within { lft, rgt } => ("lft > ?2 AND rgt < ?3", vec![lft, rgt]),
        Selector::Contains(pos) => ("lft <= ?2 AND rgt >= ?3", vec![pos, pos]),
        Selector::Interval { lft, rgt } => ("lft >= ?2 AND rgt <= ?3", vec![lft, rgt]),
    }
}

fn bound_op(bound: Bound) -> (&'static str, i64) {
    match bound {
        Bound::Ge(v) => (">=", v),
        Bound::Gt(v) => (">", v),
    }
}

impl NodeStore for SqliteNodeStore {
    fn get(&self, tree: &TreeId, id: NodeId) -> nestedset_core::Result<Option<Node>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, lft, rgt, attrs FROM nodes WHERE tree = ?1 AND id = ?2")
            .map_err(storage_err)?;
        let mut rows = stmt
            .query(params![tree.as_str(), id.0 as i64])
            .map_err(storage_err)?;
        match rows.next().map_err(storage_err)? {
            Some(row) => Ok(Some(row_to_node(row).map_err(storage_err)?)),
            None => Ok(None),
        }
    }

    fn root(&self, tree: &TreeId) -> nestedset_core::Result<Option<Node>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, lft, rgt, attrs FROM nodes WHERE tree = ?1 AND lft = 1")
            .map_err(storage_err)?;
        let mut rows = stmt.query(params![tree.as_str()]).map_err(storage_err)?;
        match rows.next().map_err(storage_err)? {
            Some(row) => Ok(Some(row_to_node(row).map_err(storage_err)?)),
            None => Ok(None),
        }
    }

    fn range_query(&self, tree: &TreeId, selector: Selector) -> nestedset_core::Result<Vec<Node>> {
        let (clause, values) = selector_clause(selector);
        let sql = format!(
            "SELECT id, lft, rgt, attrs FROM nodes WHERE tree = ?1 AND {clause} ORDER BY lft ASC"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(storage_err)?;
        let tree_name = tree.as_str().to_string();
        let mut bind: Vec<&dyn ToSql> = vec![&tree_name];
        for value in &values {
            bind.push(value);
        }
        let mut rows = stmt.query(&bind[..]).map_err(storage_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(storage_err)? {
            out.push(row_to_node(row).map_err(storage_err)?);
        }
        Ok(out)
    }

    fn shift_lft(&mut self, tree: &TreeId, bound: Bound, delta: i64) -> nestedset_core::Result<usize> {
        let (op, value) = bound_op(bound);
        let sql = format!("UPDATE nodes SET lft = lft + ?3 WHERE tree = ?1 AND lft {op} ?2");
        self.conn
            .execute(&sql, params![tree.as_str(), value, delta])
            .map_err(storage_err)
    }

    fn shift_rgt(&mut self, tree: &TreeId, bound: Bound, delta: i64) -> nestedset_core::Result<usize> {
        let (op, value) = bound_op(bound);
        let sql = format!("UPDATE nodes SET rgt = rgt + ?3 WHERE tree = ?1 AND rgt {op} ?2");
        self.conn
            .execute(&sql, params![tree.as_str(), value, delta])
            .map_err(storage_err)
    }

    fn shift_block(
        &mut self,
        tree: &TreeId,
        lft_from: i64,
        rgt_to: i64,
        delta: i64,
    ) -> nestedset_core::Result<usize> {
        self.conn
            .execute(
                "UPDATE nodes SET lft = lft + ?4, rgt = rgt + ?4
                 WHERE tree = ?1 AND lft >= ?2 AND rgt <= ?3",
                params![tree.as_str(), lft_from, rgt_to, delta],
            )
            .map_err(storage_err)
    }

    fn insert(
        &mut self,
        tree: &TreeId,
        lft: i64,
        rgt: i64,
        attributes: Attributes,
    ) -> nestedset_core::Result<NodeId> {
        let attrs = encode_attrs(&attributes)?;
        self.conn
            .execute(
                "INSERT INTO nodes (tree, lft, rgt, attrs) VALUES (?1, ?2, ?3, ?4)",
                params![tree.as_str(), lft, rgt, attrs],
            )
            .map_err(storage_err)?;
        let rowid = self.conn.last_insert_rowid();
        u64::try_from(rowid)
            .map(NodeId)
            .map_err(|_| Error::Storage("negative rowid".into()))
    }

    fn set_interval(
        &mut self,
        tree: &TreeId,
        id: NodeId,
        lft: i64,
        rgt: i64,
    ) -> nestedset_core::Result<()> {
        let updated = self
            .conn
            .execute(
                "UPDATE nodes SET lft = ?3, rgt = ?4 WHERE tree = ?1 AND id = ?2",
                params![tree.as_str(), id.0 as i64, lft, rgt],
            )
            .map_err(storage_err)?;
        if updated == 0 {
            return Err(Error::InvalidId(id.0));
        }
        Ok(())
    }

    fn set_attributes(
        &mut self,
        tree: &TreeId,
        id: NodeId,
        attributes: Attributes,
    ) -> nestedset_core::Result<()> {
        let attrs = encode_attrs(&attributes)?;
        let updated = self
            .conn
            .execute(
                "UPDATE nodes SET attrs = ?3 WHERE tree = ?1 AND id = ?2",
                params![tree.as_str(), id.0 as i64, attrs],
            )
            .map_err(storage_err)?;
        if updated == 0 {
            return Err(Error::InvalidId(id.0));
        }
        Ok(())
    }

    fn delete_range(&mut self, tree: &TreeId, lft: i64, rgt: i64) -> nestedset_core::Result<usize> {
        self.conn
            .execute(
                "DELETE FROM nodes WHERE tree = ?1 AND lft >= ?2 AND rgt <= ?3",
                params![tree.as_str(), lft, rgt],
            )
            .map_err(storage_err)
    }

    fn count(&self, tree: &TreeId) -> nestedset_core::Result<usize> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM nodes WHERE tree = ?1",
                params![tree.as_str()],
                |row| row.get(0),
            )
            .map_err(storage_err)?;
        Ok(count as usize)
    }

    fn begin(&mut self, _tree: &TreeId) -> nestedset_core::Result<()> {
        if self.txn_open {
            return Err(Error::Storage("transaction already open".into()));
        }
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(storage_err)?;
        self.txn_open = true;
        Ok(())
    }

    fn commit(&mut self, _tree: &TreeId) -> nestedset_core::Result<()> {
        if !self.txn_open {
            return Err(Error::Storage("no open transaction".into()));
        }
        self.conn.execute_batch("COMMIT").map_err(storage_err)?;
        self.txn_open = false;
        Ok(())
    }

    fn rollback(&mut self, _tree: &TreeId) -> nestedset_core::Result<()> {
        if !self.txn_open {
            return Err(Error::Storage("no open transaction".into()));
        }
        self.conn.execute_batch("ROLLBACK").map_err(storage_err)?;
        self.txn_open = false;
        Ok(())
    }
}
