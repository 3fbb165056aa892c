//! Subtree direction flip: replacing an ancestor's action propagates to its
//! children, and collapsing a child back to `NoOp` forces the ancestor back
//! to `NoOp` too.

use sync_fs::{Entry, EntryKind};
use sync_plan::{Action, ActionDirection, ActionKind, PlanTree};

fn no_op(path: &str, a_root: &str, b_root: &str) -> Action {
    let a = Entry::new(path, EntryKind::Regular);
    let b = Entry::new(path, EntryKind::Regular);
    Action::no_op(a, b, a_root, b_root)
}

#[test]
fn subtree_direction_flip_propagates_then_collapses() {
    let a_root = "/src";
    let b_root = "/dst";
    let mut tree = PlanTree::new(a_root, b_root);

    for leaf in ["dir/a", "dir/b", "dir/c"] {
        tree.insert(no_op(leaf, a_root, b_root)).unwrap();
    }
    assert_eq!(tree.get("dir").unwrap().kind, ActionKind::NoOp);

    let a = Entry::new("dir", EntryKind::Directory);
    let b = Entry::new("dir", EntryKind::Directory);
    let replacement = Action::copy(a, b, a_root, b_root, ActionDirection::SrcToDst).unwrap();
    tree.replace("dir", replacement).unwrap();

    for leaf in ["dir/a", "dir/b", "dir/c"] {
        let action = tree.get(leaf).unwrap();
        assert!(matches!(action.kind, ActionKind::Copy { .. }));
        assert_eq!(action.direction, Some(ActionDirection::SrcToDst));
    }
    let dir_action = tree.get("dir").unwrap();
    assert!(matches!(dir_action.kind, ActionKind::Copy { .. }));
    assert_eq!(dir_action.direction, Some(ActionDirection::SrcToDst));

    tree.replace("dir/a", no_op("dir/a", a_root, b_root)).unwrap();

    assert_eq!(tree.get("dir").unwrap().kind, ActionKind::NoOp);
}
