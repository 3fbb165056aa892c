//! The plan tree: a rooted arena of nodes keyed by relative path, each
//! carrying at most one [`Action`]. A node's identity is its relative path;
//! ancestor nodes exist implicitly as soon as a descendant is inserted.

use std::collections::HashMap;

use sync_fs::Entry;

use crate::action::{Action, ActionDirection, ActionKind};
use crate::error::{ActionError, ActionResult};

struct Node {
    path: String,
    parent: Option<usize>,
    children: Vec<usize>,
    action: Action,
}

/// Arena-backed plan tree. Nodes are addressed by relative path; the root
/// node's path is the empty string.
pub struct PlanTree {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    a_root: String,
    b_root: String,
}

fn parent_path(path: &str) -> Option<String> {
    match path.rsplit_once('/') {
        Some((parent, _)) => Some(parent.to_string()),
        None if path.is_empty() => None,
        None => Some(String::new()),
    }
}

fn signature(action: &Action) -> (ActionKind, Option<ActionDirection>) {
    (action.kind, action.direction)
}

impl PlanTree {
    pub fn new(a_root: impl Into<String>, b_root: impl Into<String>) -> Self {
        let a_root = a_root.into();
        let b_root = b_root.into();
        let root_action = Action::no_op(
            Entry::new("", sync_fs::EntryKind::Directory),
            Entry::new("", sync_fs::EntryKind::Directory),
            a_root.clone(),
            b_root.clone(),
        );
        let root = Node {
            path: String::new(),
            parent: None,
            children: Vec::new(),
            action: root_action,
        };
        let mut index = HashMap::new();
        index.insert(String::new(), 0);
        PlanTree {
            nodes: vec![root],
            index,
            a_root,
            b_root,
        }
    }

    fn require_node(&self, path: &str) -> ActionResult<usize> {
        self.index
            .get(path)
            .copied()
            .ok_or_else(|| ActionError::NodeNotFound(path.to_string()))
    }

    /// Creates the node at `path` (and any missing ancestors) if it does not
    /// already exist, returning its index. Synthetic ancestors are inserted
    /// as excluded `NoOp`s over a missing entry pair until a real action
    /// overwrites them.
    fn ensure_path(&mut self, path: &str) -> usize {
        if let Some(&idx) = self.index.get(path) {
            return idx;
        }
        let parent_idx = match parent_path(path) {
            Some(parent) => self.ensure_path(&parent),
            None => 0,
        };
        let mut action = Action::no_op(
            Entry::missing(path),
            Entry::missing(path),
            self.a_root.clone(),
            self.b_root.clone(),
        );
        action.excluded = true;
        let idx = self.nodes.len();
        self.nodes.push(Node {
            path: path.to_string(),
            parent: Some(parent_idx),
            children: Vec::new(),
            action,
        });
        self.nodes[parent_idx].children.push(idx);
        self.index.insert(path.to_string(), idx);
        idx
    }

    /// Inserts or overwrites the action at its own path, creating any
    /// missing ancestor nodes along the way.
    pub fn insert(&mut self, action: Action) -> ActionResult<()> {
        if action.a.relative_path != action.b.relative_path {
            return Err(ActionError::DirectionNotPermitted(
                "an action's two sides must share a relative path".into(),
            ));
        }
        let path = action.a.relative_path.clone();
        let idx = self.ensure_path(&path);
        self.nodes[idx].action = action;
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&Action> {
        self.index.get(path).map(|&idx| &self.nodes[idx].action)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut Action> {
        match self.index.get(path).copied() {
            Some(idx) => Some(&mut self.nodes[idx].action),
            None => None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Depth-first, parent-before-child walk of every node's action,
    /// including the implicit root.
    pub fn pre_order(&self) -> Vec<&Action> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.walk_pre_order(0, &mut out);
        out
    }

    fn walk_pre_order<'a>(&'a self, idx: usize, out: &mut Vec<&'a Action>) {
        out.push(&self.nodes[idx].action);
        for &child in &self.nodes[idx].children {
            self.walk_pre_order(child, out);
        }
    }

    /// Relative paths of every node, excluding the implicit root, in
    /// pre-order. Lets a caller enumerate nodes and then reach each one
    /// mutably through [`PlanTree::get_mut`].
    pub fn paths(&self) -> Vec<String> {
        self.pre_order()
            .into_iter()
            .map(|a| a.a.relative_path.clone())
            .filter(|p| !p.is_empty())
            .collect()
    }

    /// Descendant propagation: every non-excluded descendant of `path`
    /// adopts `path`'s `(kind, direction)`. Excluded descendants keep their
    /// own variant.
    pub fn make_children_as_parent(&mut self, path: &str) -> ActionResult<()> {
        let idx = self.require_node(path)?;
        self.propagate_to_children(idx);
        Ok(())
    }

    fn propagate_to_children(&mut self, idx: usize) {
        let kind = self.nodes[idx].action.kind;
        let direction = self.nodes[idx].action.direction;
        let children = self.nodes[idx].children.clone();
        for child in children {
            if !self.nodes[child].action.excluded {
                self.nodes[child].action.kind = kind;
                self.nodes[child].action.direction = direction;
            }
            self.propagate_to_children(child);
        }
    }

    /// Ancestor reconciliation: recomputes `path`'s action from its direct
    /// children. All non-excluded children sharing a `(kind, direction)`
    /// promote it to the parent; divergence either collapses the parent to
    /// an excluded `NoOp` (if every child is excluded), to a plain `NoOp`
    /// (if `force_no_action`), or leaves the parent untouched.
    pub fn make_action_consistent(&mut self, path: &str, force_no_action: bool) -> ActionResult<()> {
        let idx = self.require_node(path)?;
        self.reconcile_node(idx, force_no_action);
        Ok(())
    }

    fn reconcile_node(&mut self, idx: usize, force_no_action: bool) {
        let children = self.nodes[idx].children.clone();
        if children.is_empty() {
            return;
        }

        let mut signatures = Vec::with_capacity(children.len());
        let mut all_excluded = true;
        for &child in &children {
            let action = &self.nodes[child].action;
            if !action.excluded {
                all_excluded = false;
                signatures.push(signature(action));
            }
        }

        if all_excluded {
            self.nodes[idx].action.kind = ActionKind::NoOp;
            self.nodes[idx].action.direction = None;
            self.nodes[idx].action.excluded = true;
            return;
        }

        let first = signatures[0];
        if signatures.iter().all(|s| *s == first) {
            self.nodes[idx].action.kind = first.0;
            self.nodes[idx].action.direction = first.1;
            self.nodes[idx].action.excluded = false;
        } else if force_no_action {
            self.nodes[idx].action.kind = ActionKind::NoOp;
            self.nodes[idx].action.direction = None;
            self.nodes[idx].action.excluded = false;
        }
    }

    /// Subtree reconciliation: walks from `path` up to the root, applying
    /// ancestor reconciliation at every level above the node itself.
    pub fn make_subtree_consistent(&mut self, path: &str, force_no_action: bool) -> ActionResult<()> {
        let mut idx = self.require_node(path)?;
        while let Some(parent) = self.nodes[idx].parent {
            self.reconcile_node(parent, force_no_action);
            idx = parent;
        }
        Ok(())
    }

    /// Whole-tree reconciliation: a post-order walk applying ancestor
    /// reconciliation at every node. Runs once at the end of comparison.
    pub fn make_all_actions_consistent(&mut self, force_no_action: bool) {
        self.reconcile_post_order(0, force_no_action);
    }

    fn reconcile_post_order(&mut self, idx: usize, force_no_action: bool) {
        let children = self.nodes[idx].children.clone();
        for child in children {
            self.reconcile_post_order(child, force_no_action);
        }
        self.reconcile_node(idx, force_no_action);
    }

    /// Atomically swaps the action at `path`, then runs descendant
    /// propagation from that node, then subtree reconciliation back to the
    /// root.
    pub fn replace(&mut self, path: &str, new_action: Action) -> ActionResult<()> {
        let idx = self.require_node(path)?;
        self.nodes[idx].action = new_action;
        self.propagate_to_children(idx);
        self.make_subtree_consistent(path, true)
    }

    /// Replaces `path`'s action with a `NoOp` over the same entry pair.
    pub fn cancel_action(&mut self, path: &str) -> ActionResult<()> {
        let idx = self.require_node(path)?;
        let current = &self.nodes[idx].action;
        let no_op = Action::no_op(
            current.a.clone(),
            current.b.clone(),
            current.a_root.clone(),
            current.b_root.clone(),
        );
        self.replace(path, no_op)
    }

    /// Converts `path`'s action into a `Delete`, preferring the action's
    /// current direction and falling back to the opposite direction if the
    /// natural one is impossible. Fails if neither direction validates.
    pub fn convert_to_delete(&mut self, path: &str) -> ActionResult<()> {
        let idx = self.require_node(path)?;
        let current = &self.nodes[idx].action;
        let natural = current.direction.unwrap_or(ActionDirection::SrcToDst);
        let opposite = match natural {
            ActionDirection::SrcToDst => ActionDirection::DstToSrc,
            ActionDirection::DstToSrc => ActionDirection::SrcToDst,
            ActionDirection::Both => ActionDirection::Both,
        };
        let a = current.a.clone();
        let b = current.b.clone();
        let a_root = current.a_root.clone();
        let b_root = current.b_root.clone();

        let delete = Action::delete(a.clone(), b.clone(), a_root.clone(), b_root.clone(), natural)
            .or_else(|_| Action::delete(a, b, a_root, b_root, opposite))?;
        self.replace(path, delete)
    }

    #[cfg(test)]
    fn path_of(&self, path: &str) -> &str {
        &self.nodes[self.index[path]].path
    }
}
