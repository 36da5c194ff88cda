use nestedset_core::{validate_rows, Attributes, Error, NestedSet, NodeId, TreeId};
use nestedset_sqlite::SqliteNodeStore;

fn engine() -> NestedSet<SqliteNodeStore> {
    NestedSet::new(SqliteNodeStore::new_in_memory().unwrap())
}

fn attrs(name: &str) -> Attributes {
    let mut map = Attributes::new();
    map.insert("name".into(), name.into());
    map
}

fn interval(ns: &NestedSet<SqliteNodeStore>, tree: &TreeId, id: NodeId) -> (i64, i64) {
    let node = ns.node(tree, id).unwrap();
    (node.lft, node.rgt)
}

#[test]
fn documented_insert_scenario_on_sqlite() {
    let tree = TreeId::new("docs");
    let mut ns = engine();

    let r = ns.append_child(&tree, None, attrs("R")).unwrap();
    let a = ns.append_child(&tree, Some(r), attrs("A")).unwrap();
    let b = ns.append_child(&tree, Some(r), attrs("B")).unwrap();
    let c = ns.insert_before(&tree, b, attrs("C")).unwrap();

    assert_eq!(interval(&ns, &tree, c), (4, 5));
    assert_eq!(interval(&ns, &tree, b), (6, 7));
    assert_eq!(interval(&ns, &tree, r), (1, 8));

    ns.move_after(&tree, a, b).unwrap();
    assert_eq!(interval(&ns, &tree, r), (1, 8));
    assert_eq!(interval(&ns, &tree, a), (6, 7));
    validate_rows(&ns.rows(&tree).unwrap(), true).unwrap();
}

#[test]
fn rejected_operations_roll_the_transaction_back() {
    let tree = TreeId::new("t");
    let mut ns = engine();
    let root = ns.append_child(&tree, None, attrs("root")).unwrap();
    let a = ns.append_child(&tree, Some(root), attrs("a")).unwrap();

    let before = ns.rows(&tree).unwrap();
    assert!(matches!(ns.move_before(&tree, a, a), Err(Error::Cycle)));
    assert!(matches!(
        ns.insert_after(&tree, root, attrs("x")),
        Err(Error::RootOperation)
    ));
    assert_eq!(ns.rows(&tree).unwrap(), before);
}

#[test]
fn deferred_deletes_and_compaction_on_sqlite() {
    let tree = TreeId::new("t");
    let mut ns = engine();
    let root = ns.append_child(&tree, None, attrs("root")).unwrap();
    let a = ns.append_child(&tree, Some(root), attrs("a")).unwrap();
    ns.append_child(&tree, Some(a), attrs("a1")).unwrap();
    let b = ns.append_child(&tree, Some(root), attrs("b")).unwrap();
    let c = ns.append_child(&tree, Some(root), attrs("c")).unwrap();

    ns.delete_subtree(&tree, a, false).unwrap();
    assert!(matches!(
        ns.append_child(&tree, Some(root), attrs("x")),
        Err(Error::NonContiguous)
    ));
    ns.delete_subtree(&tree, b, false).unwrap();
    ns.close_gaps(&tree).unwrap();

    let rows = ns.rows(&tree).unwrap();
    validate_rows(&rows, true).unwrap();
    assert_eq!(rows.iter().map(|n| n.id).collect::<Vec<_>>(), vec![root, c]);
    assert_eq!(interval(&ns, &tree, c), (2, 3));
}

#[test]
fn attributes_survive_the_json_column() {
    let tree = TreeId::new("t");
    let mut ns = engine();
    let root = ns.append_child(&tree, None, attrs("root")).unwrap();

    let mut update = Attributes::new();
    update.insert("kind".into(), "folder".into());
    update.insert("title".into(), "Projects \"2026\"".into());
    ns.update_attributes(&tree, root, update).unwrap();

    let row = ns.node(&tree, root).unwrap();
    assert_eq!(row.attributes.get("name").map(String::as_str), Some("root"));
    assert_eq!(
        row.attributes.get("title").map(String::as_str),
        Some("Projects \"2026\"")
    );
}

#[test]
fn trees_share_the_table_but_not_the_numbering() {
    let mut ns = engine();
    let left = TreeId::new("left");
    let right = TreeId::new("right");

    let l = ns.append_child(&left, None, attrs("L")).unwrap();
    let r = ns.append_child(&right, None, attrs("R")).unwrap();
    ns.append_child(&left, Some(l), attrs("l1")).unwrap();

    assert_eq!(interval(&ns, &left, l), (1, 4));
    assert_eq!(interval(&ns, &right, r), (1, 2));
    // ids are global, intervals are per tree
    assert_ne!(l, r);
}

#[test]
fn reopening_the_database_preserves_the_tree() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trees.db");
    let path = path.to_str().unwrap();
    let tree = TreeId::new("persistent");

    let expected = {
        let mut ns = NestedSet::new(SqliteNodeStore::new(path).unwrap());
        let root = ns.append_child(&tree, None, attrs("root")).unwrap();
        let a = ns.append_child(&tree, Some(root), attrs("a")).unwrap();
        ns.append_child(&tree, Some(a), attrs("a1")).unwrap();
        ns.rows(&tree).unwrap()
    };

    let ns = NestedSet::new(SqliteNodeStore::new(path).unwrap());
    assert_eq!(ns.rows(&tree).unwrap(), expected);
    let materialized = ns.materialize_tree(&tree).unwrap().unwrap();
    assert_eq!(materialized.descendant_count(), 2);
}
