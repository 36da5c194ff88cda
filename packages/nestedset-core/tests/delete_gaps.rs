use nestedset_core::{
    validate_rows, Attributes, Error, MemoryNodeStore, NestedSet, NodeId, TreeId,
};

fn engine() -> NestedSet<MemoryNodeStore> {
    NestedSet::new(MemoryNodeStore::default())
}

fn attrs(name: &str) -> Attributes {
    let mut map = Attributes::new();
    map.insert("name".into(), name.into());
    map
}

/// root > (a > (a1, a2), b, c)
fn build(ns: &mut NestedSet<MemoryNodeStore>, tree: &TreeId) -> Vec<NodeId> {
    let root = ns.append_child(tree, None, attrs("root")).unwrap();
    let a = ns.append_child(tree, Some(root), attrs("a")).unwrap();
    let a1 = ns.append_child(tree, Some(a), attrs("a1")).unwrap();
    let a2 = ns.append_child(tree, Some(a), attrs("a2")).unwrap();
    let b = ns.append_child(tree, Some(root), attrs("b")).unwrap();
    let c = ns.append_child(tree, Some(root), attrs("c")).unwrap();
    vec![root, a, a1, a2, b, c]
}

#[test]
fn immediate_gap_closing_restores_contiguity() {
    let tree = TreeId::new("t");
    let mut ns = engine();
    let ids = build(&mut ns, &tree);

    let deleted = ns.delete_subtree(&tree, ids[1], true).unwrap();
    assert_eq!(deleted, 3); // a, a1, a2

    let rows = ns.rows(&tree).unwrap();
    assert_eq!(rows.len(), 3);
    validate_rows(&rows, true).unwrap();
    assert_eq!(ns.subtree_size(&tree, ids[0]).unwrap(), 3);
}

#[test]
fn deferred_deletion_leaves_a_gap_of_the_subtree_width() {
    let tree = TreeId::new("t");
    let mut ns = engine();
    let ids = build(&mut ns, &tree);
    let a = ns.node(&tree, ids[1]).unwrap();

    ns.delete_subtree(&tree, ids[1], false).unwrap();

    let rows = ns.rows(&tree).unwrap();
    validate_rows(&rows, false).unwrap();
    assert!(matches!(validate_rows(&rows, true), Err(Error::NonContiguous)));
    // surviving rows kept their numbering; the freed range stays unused
    let root = ns.node(&tree, ids[0]).unwrap();
    assert_eq!(root.size(), 2 * 6);
    assert!(rows.iter().all(|n| n.rgt < a.lft || n.lft > a.rgt || n.id == root.id));
}

#[test]
fn further_deferred_deletions_are_allowed_on_a_gapped_tree() {
    let tree = TreeId::new("t");
    let mut ns = engine();
    let ids = build(&mut ns, &tree);

    ns.delete_subtree(&tree, ids[2], false).unwrap(); // a1
    ns.delete_subtree(&tree, ids[4], false).unwrap(); // b
    // immediate-close deletion assumes contiguity and is rejected
    assert!(matches!(
        ns.delete_subtree(&tree, ids[5], true),
        Err(Error::NonContiguous)
    ));

    ns.close_gaps(&tree).unwrap();
    validate_rows(&ns.rows(&tree).unwrap(), true).unwrap();
    assert_eq!(ns.rows(&tree).unwrap().len(), 4);
}

#[test]
fn gapped_tree_answers_containment_queries_but_not_width_arithmetic() {
    let tree = TreeId::new("t");
    let mut ns = engine();
    let ids = build(&mut ns, &tree);

    ns.delete_subtree(&tree, ids[1], false).unwrap(); // a, a1, a2

    // width arithmetic would count the freed units as nodes
    assert!(matches!(
        ns.subtree_size(&tree, ids[0]),
        Err(Error::NonContiguous)
    ));

    // containment-driven projections keep answering correctly
    assert_eq!(ns.descendant_ids(&tree, None).unwrap(), vec![ids[4], ids[5]]);
    assert_eq!(
        ns.children(&tree, ids[0])
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect::<Vec<_>>(),
        vec![ids[4], ids[5]]
    );
    assert_eq!(ns.level(&tree, ids[4]).unwrap(), 1);
    assert_eq!(ns.height(&tree).unwrap(), 2);

    // attribute updates touch no intervals and stay available
    ns.update_attributes(&tree, ids[4], attrs("b-renamed")).unwrap();
    assert_eq!(
        ns.node(&tree, ids[4]).unwrap().attributes.get("name").map(String::as_str),
        Some("b-renamed")
    );

    ns.close_gaps(&tree).unwrap();
    assert_eq!(ns.subtree_size(&tree, ids[0]).unwrap(), 3);
}

#[test]
fn batched_deferred_deletes_plus_compaction_match_immediate_closing() {
    let tree = TreeId::new("t");
    let mut deferred = engine();
    let mut immediate = engine();
    let ids_d = build(&mut deferred, &tree);
    let ids_i = build(&mut immediate, &tree);
    assert_eq!(ids_d, ids_i); // same store, same id sequence

    deferred.delete_subtree(&tree, ids_d[1], false).unwrap();
    deferred.close_gaps(&tree).unwrap();
    immediate.delete_subtree(&tree, ids_i[1], true).unwrap();

    assert_eq!(deferred.rows(&tree).unwrap(), immediate.rows(&tree).unwrap());
    validate_rows(&deferred.rows(&tree).unwrap(), true).unwrap();
}

#[test]
fn compaction_preserves_order_and_nesting() {
    let tree = TreeId::new("t");
    let mut ns = engine();
    let ids = build(&mut ns, &tree);

    ns.delete_subtree(&tree, ids[3], false).unwrap(); // a2
    ns.delete_subtree(&tree, ids[4], false).unwrap(); // b
    ns.close_gaps(&tree).unwrap();

    let rows = ns.rows(&tree).unwrap();
    validate_rows(&rows, true).unwrap();
    let surviving: Vec<NodeId> = rows.iter().map(|n| n.id).collect();
    assert_eq!(surviving, vec![ids[0], ids[1], ids[2], ids[5]]);
    assert_eq!(ns.level(&tree, ids[2]).unwrap(), 2);
    assert_eq!(
        ns.children(&tree, ids[0])
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect::<Vec<_>>(),
        vec![ids[1], ids[5]]
    );
}

#[test]
fn deleting_the_root_empties_the_tree() {
    let tree = TreeId::new("t");
    let mut ns = engine();
    let ids = build(&mut ns, &tree);

    let deleted = ns.delete_subtree(&tree, ids[0], true).unwrap();
    assert_eq!(deleted, 6);
    assert!(ns.rows(&tree).unwrap().is_empty());
    assert!(ns.root(&tree).unwrap().is_none());

    // the tree accepts a fresh root afterwards
    let new_root = ns.append_child(&tree, None, attrs("again")).unwrap();
    let row = ns.node(&tree, new_root).unwrap();
    assert_eq!((row.lft, row.rgt), (1, 2));
}

#[test]
fn compacting_a_contiguous_tree_is_a_no_op() {
    let tree = TreeId::new("t");
    let mut ns = engine();
    build(&mut ns, &tree);

    let before = ns.rows(&tree).unwrap();
    ns.close_gaps(&tree).unwrap();
    assert_eq!(ns.rows(&tree).unwrap(), before);
}
