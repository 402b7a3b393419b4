use super::OutlineChange;
use crate::cursor::CaretPosition;
use crate::models::{NodeId, NodeRecord};
use leptos::logging::error;
use std::collections::{HashMap, HashSet};

/// One node of the structural tree.
///
/// `record.children` is what gets persisted; `children` is the rendered container.
/// Containment calls touch one or the other, and a finished command leaves them equal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutlineNode {
    pub(crate) record: NodeRecord,
    pub(crate) children: Vec<NodeId>,
    pub(crate) expanded: bool,
    pub(crate) has_subtasks: bool,
    pub(crate) frozen: bool,
}

impl OutlineNode {
    fn new(record: NodeRecord) -> Self {
        Self {
            record,
            children: vec![],
            expanded: false,
            has_subtasks: false,
            frozen: false,
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.record.id
    }

    pub fn record(&self) -> &NodeRecord {
        &self.record
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn expanded(&self) -> bool {
        self.expanded
    }

    pub fn has_subtasks(&self) -> bool {
        self.has_subtasks
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

/// Records plus containment, with an explicit `child -> parent` index.
///
/// The root id is fixed at construction. Every mutation queues an [`OutlineChange`].
#[derive(Clone, Debug)]
pub struct OutlineTree {
    root: NodeId,
    nodes: HashMap<NodeId, OutlineNode>,
    parents: HashMap<NodeId, NodeId>,
    changes: Vec<OutlineChange>,
}

impl OutlineTree {
    /// Empty outline: just the root.
    pub fn new(root: NodeId) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(root.clone(), OutlineNode::new(NodeRecord::new(root.clone(), "")));
        Self {
            root,
            nodes,
            parents: HashMap::new(),
            changes: vec![],
        }
    }

    /// Assemble from loaded records.
    ///
    /// Unreachable records are ignored. Child references to missing ids, to the root, or to
    /// an already placed node are dropped from the parent record.
    pub fn from_records(root: NodeId, records: impl IntoIterator<Item = NodeRecord>) -> Self {
        let mut by_id = records
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect::<HashMap<_, _>>();

        let root_rec = by_id
            .remove(&root)
            .unwrap_or_else(|| NodeRecord::new(root.clone(), ""));

        let mut tree = Self::new(root.clone());
        let mut placed: HashSet<NodeId> = HashSet::new();
        placed.insert(root.clone());

        let mut stack: Vec<NodeRecord> = vec![root_rec];
        while let Some(mut rec) = stack.pop() {
            let parent_id = rec.id.clone();
            let mut kept: Vec<NodeId> = Vec::with_capacity(rec.children.len());
            let mut kids: Vec<NodeRecord> = vec![];

            for child in rec.children.drain(..) {
                if placed.contains(&child) {
                    error!("outline: dropping repeated reference to {child} under {parent_id}");
                    continue;
                }
                let Some(child_rec) = by_id.remove(&child) else {
                    error!("outline: dropping missing child {child} of {parent_id}");
                    continue;
                };
                placed.insert(child.clone());
                kept.push(child);
                kids.push(child_rec);
            }

            rec.children = kept.clone();
            let has_kids = !kept.is_empty();
            let node = tree
                .nodes
                .entry(parent_id.clone())
                .or_insert_with(|| OutlineNode::new(rec.clone()));
            node.record = rec;
            node.children = kept.clone();
            node.expanded = has_kids;
            node.has_subtasks = has_kids;

            for kid in &kept {
                tree.parents.insert(kid.clone(), parent_id.clone());
            }
            for kid_rec in kids.into_iter().rev() {
                tree.nodes
                    .insert(kid_rec.id.clone(), OutlineNode::new(kid_rec.clone()));
                stack.push(kid_rec);
            }
        }

        tree
    }

    /* ------------------------------ queries ------------------------------ */

    pub fn root(&self) -> &NodeId {
        &self.root
    }

    pub fn is_root(&self, id: &NodeId) -> bool {
        &self.root == id
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Known and not frozen.
    pub fn is_live(&self, id: &NodeId) -> bool {
        self.nodes.get(id).is_some_and(|n| !n.frozen)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &NodeId) -> Option<&OutlineNode> {
        self.nodes.get(id)
    }

    pub fn record(&self, id: &NodeId) -> Option<&NodeRecord> {
        self.nodes.get(id).map(|n| &n.record)
    }

    pub fn parent_of(&self, id: &NodeId) -> Option<&NodeId> {
        self.parents.get(id)
    }

    /// Rendered children in document order.
    pub fn children(&self, id: &NodeId) -> &[NodeId] {
        self.nodes.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn index_in_parent(&self, id: &NodeId) -> Option<usize> {
        let parent = self.parent_of(id)?;
        self.children(parent).iter().position(|c| c == id)
    }

    pub fn previous_sibling(&self, id: &NodeId) -> Option<&NodeId> {
        let parent = self.parent_of(id)?;
        let idx = self.index_in_parent(id)?;
        idx.checked_sub(1).and_then(|i| self.children(parent).get(i))
    }

    pub fn next_sibling(&self, id: &NodeId) -> Option<&NodeId> {
        let parent = self.parent_of(id)?;
        let idx = self.index_in_parent(id)?;
        self.children(parent).get(idx + 1)
    }

    /// `id` and all its rendered descendants, preorder.
    pub fn subtree_ids(&self, id: &NodeId) -> Vec<NodeId> {
        let mut out = vec![];
        if !self.contains(id) {
            return out;
        }
        let mut stack = vec![id.clone()];
        while let Some(cur) = stack.pop() {
            stack.extend(self.children(&cur).iter().rev().cloned());
            out.push(cur);
        }
        out
    }

    /// Nodes a user can see, in document order. The root itself is never shown.
    pub fn visible_preorder(&self) -> Vec<NodeId> {
        fn collect(tree: &OutlineTree, id: &NodeId, out: &mut Vec<NodeId>) {
            for c in tree.children(id) {
                out.push(c.clone());
                if tree.node(c).is_some_and(|n| n.expanded) {
                    collect(tree, c, out);
                }
            }
        }

        let mut out = vec![];
        collect(self, &self.root, &mut out);
        out
    }

    /// Depth below the root (top-level items are 0).
    pub fn depth(&self, id: &NodeId) -> Option<usize> {
        let mut depth = 0usize;
        let mut cur = self.parent_of(id)?;
        while let Some(p) = self.parent_of(cur) {
            depth += 1;
            cur = p;
        }
        self.is_root(cur).then_some(depth)
    }

    /* ---------------------------- containment ---------------------------- */

    /// Register a node that is not contained anywhere yet.
    pub fn insert_node(&mut self, record: NodeRecord) -> bool {
        if self.nodes.contains_key(&record.id) {
            return false;
        }
        self.nodes.insert(record.id.clone(), OutlineNode::new(record));
        true
    }

    /// Take `id` out of its current container. Idempotent.
    pub fn detach(&mut self, id: &NodeId) -> bool {
        let Some(parent) = self.parents.remove(id) else {
            return false;
        };
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|c| c != id);
        }
        self.changes.push(OutlineChange::ChildrenChanged { id: parent });
        true
    }

    fn can_contain(&self, parent: &NodeId, node: &NodeId) -> bool {
        if !self.contains(parent) || !self.contains(node) || self.is_root(node) {
            return false;
        }
        // `parent` must not sit inside `node`'s subtree.
        let mut cur = Some(parent);
        while let Some(c) = cur {
            if c == node {
                return false;
            }
            cur = self.parent_of(c);
        }
        true
    }

    fn attach(&mut self, parent: &NodeId, node: &NodeId, before: Option<&NodeId>) {
        let was_contained = self.parents.contains_key(node);
        self.detach(node);

        let Some(p) = self.nodes.get_mut(parent) else {
            return;
        };
        let at = before
            .and_then(|s| p.children.iter().position(|c| c == s))
            .unwrap_or(p.children.len());
        p.children.insert(at, node.clone());
        self.parents.insert(node.clone(), parent.clone());

        self.changes.push(if was_contained {
            OutlineChange::ChildrenChanged { id: parent.clone() }
        } else {
            OutlineChange::Inserted {
                id: node.clone(),
                parent: parent.clone(),
            }
        });
    }

    /// Move `node` to the end of `parent`'s container and mark `parent` expanded with subtasks.
    /// Records are not touched.
    pub fn add_child(&mut self, parent: &NodeId, node: &NodeId) -> bool {
        if !self.can_contain(parent, node) {
            return false;
        }
        self.attach(parent, node, None);
        if let Some(p) = self.nodes.get_mut(parent) {
            p.expanded = true;
            p.has_subtasks = true;
        }
        self.changes.push(OutlineChange::FlagsChanged { id: parent.clone() });
        true
    }

    /// Like [`Self::add_child`] but lands immediately before `sibling`; appends when `sibling`
    /// is not in `parent`'s container.
    pub fn add_child_before(&mut self, parent: &NodeId, node: &NodeId, sibling: &NodeId) -> bool {
        if !self.can_contain(parent, node) || node == sibling {
            return false;
        }
        self.attach(parent, node, Some(sibling));
        if let Some(p) = self.nodes.get_mut(parent) {
            p.expanded = true;
        }
        self.changes.push(OutlineChange::FlagsChanged { id: parent.clone() });
        true
    }

    /// Drop `child` from `parent`'s record; clears the flags when it becomes childless.
    /// Returns the updated record for persisting. The rendered container is not touched.
    pub fn remove_child_record(&mut self, parent: &NodeId, child: &NodeId) -> Option<NodeRecord> {
        let p = self.nodes.get_mut(parent)?;
        p.record.remove_child(child);
        if p.record.children.is_empty() {
            p.expanded = false;
            p.has_subtasks = false;
            self.changes.push(OutlineChange::FlagsChanged { id: parent.clone() });
        }
        Some(p.record.clone())
    }

    /// Mutable access to a record's child list, for the command that owns the move.
    pub(crate) fn record_mut(&mut self, id: &NodeId) -> Option<&mut NodeRecord> {
        self.nodes.get_mut(id).map(|n| &mut n.record)
    }

    pub fn freeze_text(&mut self, id: &NodeId) -> bool {
        let Some(n) = self.nodes.get_mut(id) else {
            return false;
        };
        if !n.frozen {
            n.frozen = true;
            self.changes.push(OutlineChange::Frozen { id: id.clone() });
        }
        true
    }

    /// Detach `id` and forget it together with its whole subtree. Returns the removed ids.
    pub fn remove_subtree(&mut self, id: &NodeId) -> Vec<NodeId> {
        if self.is_root(id) {
            return vec![];
        }
        let ids = self.subtree_ids(id);
        self.detach(id);
        for removed in &ids {
            self.nodes.remove(removed);
            self.parents.remove(removed);
            self.changes.push(OutlineChange::Removed { id: removed.clone() });
        }
        ids
    }

    /* ------------------------------ content ------------------------------ */

    /// Returns `Some(true)` when the text changed.
    pub fn set_text(&mut self, id: &NodeId, text: &str) -> Option<bool> {
        let n = self.nodes.get_mut(id)?;
        if n.record.text == text {
            return Some(false);
        }
        n.record.text = text.to_string();
        self.changes.push(OutlineChange::TextChanged { id: id.clone() });
        Some(true)
    }

    /// Returns `Some(true)` when the flag changed.
    pub fn set_checked(&mut self, id: &NodeId, checked: bool) -> Option<bool> {
        let n = self.nodes.get_mut(id)?;
        if n.record.checked == checked {
            return Some(false);
        }
        n.record.checked = checked;
        self.changes.push(OutlineChange::CheckedChanged { id: id.clone() });
        Some(true)
    }

    /// Show/hide children. Rendered-only; nodes without children stay collapsed.
    pub fn toggle_expanded(&mut self, id: &NodeId) -> bool {
        let Some(n) = self.nodes.get_mut(id) else {
            return false;
        };
        if n.children.is_empty() {
            return false;
        }
        n.expanded = !n.expanded;
        self.changes.push(OutlineChange::FlagsChanged { id: id.clone() });
        true
    }

    /* ------------------------------ changes ------------------------------ */

    pub fn push_focus(&mut self, pos: CaretPosition) {
        self.changes.push(OutlineChange::Focus(pos));
    }

    pub fn take_changes(&mut self) -> Vec<OutlineChange> {
        std::mem::take(&mut self.changes)
    }

    /// Verify records, containers, and the parent index agree.
    pub fn check_consistency(&self) -> Result<(), String> {
        for (id, node) in &self.nodes {
            if node.record.id != *id {
                return Err(format!("node {id} holds record {}", node.record.id));
            }
            if node.record.children != node.children {
                return Err(format!(
                    "node {id}: record children {:?} != rendered {:?}",
                    node.record.children, node.children
                ));
            }
            let unique = node.children.iter().collect::<HashSet<_>>();
            if unique.len() != node.children.len() {
                return Err(format!("node {id} lists a child twice"));
            }
            if node.has_subtasks != !node.children.is_empty() {
                return Err(format!("node {id}: has-subtasks flag out of date"));
            }
            for c in &node.children {
                if self.parents.get(c) != Some(id) {
                    return Err(format!("parent index for {c} does not point at {id}"));
                }
                if !self.nodes.contains_key(c) {
                    return Err(format!("node {id} lists unknown child {c}"));
                }
            }
        }

        for (child, parent) in &self.parents {
            if !self.children(parent).contains(child) {
                return Err(format!("parent index says {parent} contains {child}, it does not"));
            }
        }

        let reachable = self.subtree_ids(&self.root).len();
        if reachable != self.nodes.len() {
            return Err(format!(
                "{} nodes known, {} reachable from root",
                self.nodes.len(),
                reachable
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> NodeId {
        NodeId::from(s)
    }

    fn rec(s: &str, kids: &[&str]) -> NodeRecord {
        let mut r = NodeRecord::new(id(s), s.to_uppercase());
        r.children = kids.iter().map(|k| id(k)).collect();
        r
    }

    /// root -> [a -> [a1, a2], b]
    fn sample() -> OutlineTree {
        OutlineTree::from_records(
            id("root"),
            vec![
                rec("root", &["a", "b"]),
                rec("a", &["a1", "a2"]),
                rec("a1", &[]),
                rec("a2", &[]),
                rec("b", &[]),
            ],
        )
    }

    #[test]
    fn test_from_records_builds_containment_and_flags() {
        let t = sample();
        assert_eq!(t.children(&id("root")), &[id("a"), id("b")]);
        assert_eq!(t.parent_of(&id("a2")), Some(&id("a")));
        assert!(t.node(&id("a")).is_some_and(|n| n.expanded() && n.has_subtasks()));
        assert!(t.node(&id("b")).is_some_and(|n| !n.has_subtasks()));
        assert_eq!(t.depth(&id("a1")), Some(1));
        assert_eq!(t.depth(&id("b")), Some(0));
        t.check_consistency().expect("consistent");
    }

    #[test]
    fn test_from_records_drops_missing_and_repeated_children() {
        let t = OutlineTree::from_records(
            id("root"),
            vec![
                rec("root", &["a", "ghost", "a", "root"]),
                rec("a", &["root"]),
                rec("orphan", &[]),
            ],
        );
        assert_eq!(t.record(&id("root")).map(|r| r.children.clone()), Some(vec![id("a")]));
        assert!(t.record(&id("a")).is_some_and(|r| r.children.is_empty()));
        assert!(!t.contains(&id("orphan")));
        t.check_consistency().expect("consistent");
    }

    #[test]
    fn test_from_records_without_root_record_starts_empty() {
        let t = OutlineTree::from_records(id("root"), vec![rec("a", &[])]);
        assert_eq!(t.len(), 1);
        assert!(t.children(&id("root")).is_empty());
    }

    #[test]
    fn test_siblings() {
        let t = sample();
        assert_eq!(t.previous_sibling(&id("a1")), None);
        assert_eq!(t.previous_sibling(&id("a2")), Some(&id("a1")));
        assert_eq!(t.next_sibling(&id("a")), Some(&id("b")));
        assert_eq!(t.next_sibling(&id("b")), None);
        assert_eq!(t.next_sibling(&id("root")), None);
    }

    #[test]
    fn test_add_child_moves_between_containers_without_touching_records() {
        let mut t = sample();
        assert!(t.add_child(&id("b"), &id("a1")));
        assert_eq!(t.children(&id("a")), &[id("a2")]);
        assert_eq!(t.children(&id("b")), &[id("a1")]);
        assert_eq!(t.parent_of(&id("a1")), Some(&id("b")));
        let b = t.node(&id("b")).expect("b");
        assert!(b.expanded() && b.has_subtasks());
        // Records are the caller's business.
        assert_eq!(t.record(&id("a")).map(|r| r.children.len()), Some(2));
        assert!(t.record(&id("b")).is_some_and(|r| r.children.is_empty()));
    }

    #[test]
    fn test_add_child_before_preserves_order_of_others() {
        let mut t = sample();
        assert!(t.add_child_before(&id("root"), &id("a2"), &id("b")));
        assert_eq!(t.children(&id("root")), &[id("a"), id("a2"), id("b")]);

        // Unknown sibling appends.
        assert!(t.add_child_before(&id("root"), &id("a1"), &id("zzz")));
        assert_eq!(t.children(&id("root")).last(), Some(&id("a1")));
    }

    #[test]
    fn test_add_child_refuses_cycles_and_root() {
        let mut t = sample();
        assert!(!t.add_child(&id("a1"), &id("a")));
        assert!(!t.add_child(&id("a"), &id("a")));
        assert!(!t.add_child(&id("a"), &id("root")));
        assert!(!t.add_child(&id("nope"), &id("b")));
        t.check_consistency().expect("untouched tree stays consistent");
    }

    #[test]
    fn test_remove_child_record_clears_flags_when_empty() {
        let mut t = sample();
        let a = t.remove_child_record(&id("a"), &id("a1")).expect("a");
        assert_eq!(a.children, vec![id("a2")]);
        assert!(t.node(&id("a")).is_some_and(|n| n.has_subtasks()));

        let a = t.remove_child_record(&id("a"), &id("a2")).expect("a");
        assert!(a.children.is_empty());
        let n = t.node(&id("a")).expect("a");
        assert!(!n.expanded() && !n.has_subtasks());
        // Rendered container untouched.
        assert_eq!(n.children().len(), 2);
    }

    #[test]
    fn test_remove_subtree_forgets_descendants() {
        let mut t = sample();
        let removed = t.remove_subtree(&id("a"));
        assert_eq!(removed, vec![id("a"), id("a1"), id("a2")]);
        assert!(!t.contains(&id("a1")));
        assert!(t.parent_of(&id("a")).is_none());
        assert_eq!(t.children(&id("root")), &[id("b")]);
        assert!(t.remove_subtree(&id("root")).is_empty());
    }

    #[test]
    fn test_visible_preorder_skips_collapsed_children() {
        let mut t = sample();
        assert_eq!(t.visible_preorder(), vec![id("a"), id("a1"), id("a2"), id("b")]);
        assert!(t.toggle_expanded(&id("a")));
        assert_eq!(t.visible_preorder(), vec![id("a"), id("b")]);
        assert!(!t.toggle_expanded(&id("b")));
    }

    #[test]
    fn test_set_text_and_checked_report_changes() {
        let mut t = sample();
        t.take_changes();
        assert_eq!(t.set_text(&id("b"), "B"), Some(false));
        assert_eq!(t.set_text(&id("b"), "bee"), Some(true));
        assert_eq!(t.set_checked(&id("b"), true), Some(true));
        assert_eq!(t.set_checked(&id("b"), true), Some(false));
        assert_eq!(t.set_text(&id("nope"), "x"), None);
        assert_eq!(
            t.take_changes(),
            vec![
                OutlineChange::TextChanged { id: id("b") },
                OutlineChange::CheckedChanged { id: id("b") },
            ]
        );
    }

    #[test]
    fn test_freeze_text_marks_node_not_live() {
        let mut t = sample();
        assert!(t.is_live(&id("b")));
        assert!(t.freeze_text(&id("b")));
        assert!(!t.is_live(&id("b")));
        assert!(t.node(&id("b")).is_some_and(|n| n.is_frozen()));
    }

    #[test]
    fn test_check_consistency_reports_record_drift() {
        let mut t = sample();
        t.add_child(&id("b"), &id("a1"));
        assert!(t.check_consistency().is_err());
    }
}
