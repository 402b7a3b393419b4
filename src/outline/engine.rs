use super::{Command, OutlineChange, OutlineTree};
use crate::cursor::{CaretPosition, CaretSource, CursorTracker};
use crate::models::{NodeId, NodeRecord};
use crate::store::{load_reachable, NodeStore, StoreError, StoreResult};
use crate::sync::{PendingWrite, PendingWrites};
use crate::util::utf16_len;
use futures::future::join_all;
use leptos::logging::{log, warn};
use std::cell::RefCell;
use std::collections::HashSet;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandError {
    /// `create` failed; the tree was not touched.
    Create(StoreError),
    /// The tree changed but some writes failed. They are queued for the repair pass.
    Persist { failed: Vec<NodeId>, first: StoreError },
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create(e) => write!(f, "could not create node: {e}"),
            Self::Persist { failed, first } => {
                write!(f, "could not save {} node(s): {first}", failed.len())
            }
        }
    }
}

impl std::error::Error for CommandError {}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    /// False for guard no-ops (no previous sibling, no grandparent, root, unknown node...).
    pub applied: bool,
    pub focus: Option<CaretPosition>,
}

impl CommandOutcome {
    fn noop() -> Self {
        Self::default()
    }

    fn applied(focus: Option<CaretPosition>) -> Self {
        Self {
            applied: true,
            focus,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub retried: usize,
    pub remaining: usize,
}

/// Runs structural commands against an [`OutlineTree`] and persists them through `S`.
///
/// Each command mutates the tree synchronously, then awaits its store writes concurrently.
/// No tree borrow is held across an await, so the tree is consistent while writes are
/// outstanding.
pub struct Outliner<S> {
    tree: RefCell<OutlineTree>,
    store: S,
    pending: RefCell<PendingWrites>,
}

impl<S: NodeStore> Outliner<S> {
    pub fn new(tree: OutlineTree, store: S) -> Self {
        Self {
            tree: RefCell::new(tree),
            store,
            pending: RefCell::new(PendingWrites::new()),
        }
    }

    /// Load everything under `root`, creating an empty root record on first run.
    pub async fn load(store: S, root: NodeId) -> StoreResult<Self> {
        let records = load_reachable(&store, &root).await?;
        if records.is_empty() {
            store.set(&root, &NodeRecord::new(root.clone(), "")).await?;
            log!("outline: created root record {root}");
        }
        Ok(Self::new(OutlineTree::from_records(root, records), store))
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn with_tree<R>(&self, f: impl FnOnce(&OutlineTree) -> R) -> R {
        f(&self.tree.borrow())
    }

    pub fn take_changes(&self) -> Vec<OutlineChange> {
        self.tree.borrow_mut().take_changes()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Rendered-only; never persisted.
    pub fn toggle_expanded(&self, id: &NodeId) -> bool {
        self.tree.borrow_mut().toggle_expanded(id)
    }

    pub async fn dispatch(
        &self,
        id: &NodeId,
        command: Command,
        caret: &impl CaretSource,
    ) -> Result<CommandOutcome, CommandError> {
        match command {
            Command::AddSibling => self.add_sibling(id).await,
            Command::Indent => self.indent(id, caret).await,
            Command::Outdent => self.outdent(id, caret).await,
            Command::Delete => self.delete(id).await,
            Command::ToggleStatus => self.toggle_status(id).await,
            Command::CommitText(text) => self.commit_text(id, &text).await,
            Command::SetChecked(checked) => self.set_checked(id, checked).await,
        }
    }

    fn movable(tree: &OutlineTree, id: &NodeId) -> bool {
        tree.is_live(id) && !tree.is_root(id)
    }

    fn restore_caret(tree: &mut OutlineTree, cursor: &CursorTracker, id: &NodeId) -> CaretPosition {
        let text = tree.record(id).map(|r| r.text.clone()).unwrap_or_default();
        let pos = cursor.restore(&text);
        tree.push_focus(pos.clone());
        pos
    }

    /// New empty node right after `id` in the same parent, focused at offset 0.
    pub async fn add_sibling(&self, id: &NodeId) -> Result<CommandOutcome, CommandError> {
        let parent_rec = {
            let tree = self.tree.borrow();
            if !Self::movable(&tree, id) {
                return Ok(CommandOutcome::noop());
            }
            let Some(rec) = tree.parent_of(id).and_then(|p| tree.record(p)) else {
                return Ok(CommandOutcome::noop());
            };
            rec.clone()
        };

        let created = match self.store.create("", &parent_rec).await {
            Ok(rec) => rec,
            Err(e) => {
                warn!("outline: create under {} failed: {e}", parent_rec.id);
                return Err(CommandError::Create(e));
            }
        };
        let new_id = created.id.clone();

        // `id` may have moved or gone while `create` was outstanding.
        let placement = {
            let tree = self.tree.borrow();
            let anchor_parent = tree.parent_of(id).filter(|_| tree.is_live(id)).cloned();
            match anchor_parent {
                Some(p) => Some((p, true)),
                None if tree.contains(&parent_rec.id) => Some((parent_rec.id.clone(), false)),
                None => None,
            }
        };
        let Some((parent, after_anchor)) = placement else {
            warn!("outline: parent {} vanished, discarding {new_id}", parent_rec.id);
            self.persist(vec![PendingWrite::Remove(new_id)]).await?;
            return Ok(CommandOutcome::noop());
        };

        let (writes, focus) = {
            let mut tree = self.tree.borrow_mut();
            tree.insert_node(created);

            let mut parent_after = None;
            if let Some(rec) = tree.record_mut(&parent) {
                let at = if after_anchor {
                    rec.position_of(id).map(|i| i + 1).unwrap_or(rec.children.len())
                } else {
                    rec.children.len()
                };
                rec.insert_child(at, new_id.clone());
                parent_after = Some(rec.clone());
            }

            let next = if after_anchor {
                tree.next_sibling(id).cloned()
            } else {
                None
            };
            match next {
                Some(next) => tree.add_child_before(&parent, &new_id, &next),
                None => tree.add_child(&parent, &new_id),
            };

            let focus = CaretPosition {
                id: new_id,
                offset: 0,
            };
            tree.push_focus(focus.clone());
            (
                parent_after.into_iter().map(PendingWrite::Set).collect::<Vec<_>>(),
                focus,
            )
        };

        self.persist(writes).await?;
        Ok(CommandOutcome::applied(Some(focus)))
    }

    /// New empty last child of `parent`. Used to start an empty outline.
    pub async fn append_child(&self, parent: &NodeId) -> Result<CommandOutcome, CommandError> {
        let parent_rec = {
            let tree = self.tree.borrow();
            if !tree.is_live(parent) {
                return Ok(CommandOutcome::noop());
            }
            let Some(rec) = tree.record(parent) else {
                return Ok(CommandOutcome::noop());
            };
            rec.clone()
        };

        let created = self.store.create("", &parent_rec).await.map_err(|e| {
            warn!("outline: create under {parent} failed: {e}");
            CommandError::Create(e)
        })?;
        let new_id = created.id.clone();

        if !self.tree.borrow().is_live(parent) {
            warn!("outline: parent {parent} vanished, discarding {new_id}");
            self.persist(vec![PendingWrite::Remove(new_id)]).await?;
            return Ok(CommandOutcome::noop());
        }

        let (writes, focus) = {
            let mut tree = self.tree.borrow_mut();
            let Some(rec) = tree.record_mut(parent) else {
                return Ok(CommandOutcome::noop());
            };
            rec.push_child(new_id.clone());
            let parent_after = rec.clone();

            tree.insert_node(created);
            tree.add_child(parent, &new_id);
            let focus = CaretPosition {
                id: new_id,
                offset: 0,
            };
            tree.push_focus(focus.clone());
            (vec![PendingWrite::Set(parent_after)], focus)
        };

        self.persist(writes).await?;
        Ok(CommandOutcome::applied(Some(focus)))
    }

    /// Make `id` the last child of its previous sibling.
    pub async fn indent(
        &self,
        id: &NodeId,
        caret: &impl CaretSource,
    ) -> Result<CommandOutcome, CommandError> {
        let (writes, focus) = {
            let mut tree = self.tree.borrow_mut();
            if !Self::movable(&tree, id) {
                return Ok(CommandOutcome::noop());
            }
            let (Some(parent), Some(prev)) =
                (tree.parent_of(id).cloned(), tree.previous_sibling(id).cloned())
            else {
                return Ok(CommandOutcome::noop());
            };
            let cursor = CursorTracker::capture(caret, id);

            let Some(parent_rec) = tree.remove_child_record(&parent, id) else {
                return Ok(CommandOutcome::noop());
            };
            let prev_rec = tree.record_mut(&prev).map(|rec| {
                rec.push_child(id.clone());
                rec.clone()
            });
            tree.add_child(&prev, id);
            let focus = Self::restore_caret(&mut tree, &cursor, id);

            let mut writes = vec![PendingWrite::Set(parent_rec)];
            writes.extend(prev_rec.map(PendingWrite::Set));
            (writes, focus)
        };

        self.persist(writes).await?;
        Ok(CommandOutcome::applied(Some(focus)))
    }

    /// Move `id` up one level, directly after its former parent.
    pub async fn outdent(
        &self,
        id: &NodeId,
        caret: &impl CaretSource,
    ) -> Result<CommandOutcome, CommandError> {
        let (writes, focus) = {
            let mut tree = self.tree.borrow_mut();
            if !Self::movable(&tree, id) {
                return Ok(CommandOutcome::noop());
            }
            let Some(parent) = tree.parent_of(id).cloned() else {
                return Ok(CommandOutcome::noop());
            };
            let Some(grand) = tree.parent_of(&parent).cloned() else {
                return Ok(CommandOutcome::noop());
            };
            let cursor = CursorTracker::capture(caret, id);
            let next_parent = tree.next_sibling(&parent).cloned();

            let Some(grand_rec) = tree.record_mut(&grand) else {
                return Ok(CommandOutcome::noop());
            };
            match &next_parent {
                None => {
                    grand_rec.push_child(id.clone());
                }
                Some(next) => {
                    let at = grand_rec
                        .position_of(next)
                        .unwrap_or(grand_rec.children.len());
                    grand_rec.insert_child(at, id.clone());
                }
            }
            let grand_rec = grand_rec.clone();

            match &next_parent {
                None => tree.add_child(&grand, id),
                Some(next) => tree.add_child_before(&grand, id, next),
            };
            let parent_rec = tree.remove_child_record(&parent, id);
            let focus = Self::restore_caret(&mut tree, &cursor, id);

            let mut writes = parent_rec.into_iter().map(PendingWrite::Set).collect::<Vec<_>>();
            writes.push(PendingWrite::Set(grand_rec));
            (writes, focus)
        };

        self.persist(writes).await?;
        Ok(CommandOutcome::applied(Some(focus)))
    }

    /// Remove `id` and its subtree; focus moves to the previous visible node.
    pub async fn delete(&self, id: &NodeId) -> Result<CommandOutcome, CommandError> {
        self.delete_node(id, true).await
    }

    async fn delete_node(&self, id: &NodeId, refocus: bool) -> Result<CommandOutcome, CommandError> {
        let (writes, focus) = {
            let mut tree = self.tree.borrow_mut();
            if !Self::movable(&tree, id) {
                return Ok(CommandOutcome::noop());
            }
            let Some(parent) = tree.parent_of(id).cloned() else {
                return Ok(CommandOutcome::noop());
            };
            let focus = if refocus {
                Self::focus_after_delete(&tree, id)
            } else {
                None
            };

            tree.freeze_text(id);
            let removed = tree.remove_subtree(id);
            let parent_rec = tree.remove_child_record(&parent, id);
            if let Some(f) = &focus {
                tree.push_focus(f.clone());
            }

            let mut writes = parent_rec.into_iter().map(PendingWrite::Set).collect::<Vec<_>>();
            writes.extend(removed.into_iter().map(PendingWrite::Remove));
            (writes, focus)
        };

        self.persist(writes).await?;
        Ok(CommandOutcome::applied(focus))
    }

    /// Previous visible node, else the next one outside the subtree; caret at end of text.
    fn focus_after_delete(tree: &OutlineTree, id: &NodeId) -> Option<CaretPosition> {
        let visible = tree.visible_preorder();
        let idx = visible.iter().position(|v| v == id)?;
        let subtree = tree.subtree_ids(id).into_iter().collect::<HashSet<_>>();

        let target = idx
            .checked_sub(1)
            .map(|i| visible[i].clone())
            .or_else(|| {
                visible[idx + 1..]
                    .iter()
                    .find(|v| !subtree.contains(*v))
                    .cloned()
            })?;
        let offset = utf16_len(&tree.record(&target)?.text);
        Some(CaretPosition { id: target, offset })
    }

    pub async fn toggle_status(&self, id: &NodeId) -> Result<CommandOutcome, CommandError> {
        self.write_checked(id, |current| !current).await
    }

    /// Checkbox path: mirror the checkbox's new state into the record.
    pub async fn set_checked(&self, id: &NodeId, checked: bool) -> Result<CommandOutcome, CommandError> {
        self.write_checked(id, |_| checked).await
    }

    async fn write_checked(
        &self,
        id: &NodeId,
        next: impl FnOnce(bool) -> bool,
    ) -> Result<CommandOutcome, CommandError> {
        let rec = {
            let mut tree = self.tree.borrow_mut();
            if !Self::movable(&tree, id) {
                return Ok(CommandOutcome::noop());
            }
            let Some(current) = tree.record(id).map(|r| r.checked) else {
                return Ok(CommandOutcome::noop());
            };
            if tree.set_checked(id, next(current)) != Some(true) {
                return Ok(CommandOutcome::noop());
            }
            let Some(rec) = tree.record(id).cloned() else {
                return Ok(CommandOutcome::noop());
            };
            rec
        };

        self.persist(vec![PendingWrite::Set(rec)]).await?;
        Ok(CommandOutcome::applied(None))
    }

    /// Text surface lost focus. Empty text deletes the node instead of storing it.
    pub async fn commit_text(&self, id: &NodeId, text: &str) -> Result<CommandOutcome, CommandError> {
        if text.is_empty() {
            return self.delete_node(id, false).await;
        }

        let rec = {
            let mut tree = self.tree.borrow_mut();
            if !Self::movable(&tree, id) || tree.set_text(id, text) != Some(true) {
                return Ok(CommandOutcome::noop());
            }
            let Some(rec) = tree.record(id).cloned() else {
                return Ok(CommandOutcome::noop());
            };
            rec
        };

        self.persist(vec![PendingWrite::Set(rec)]).await?;
        Ok(CommandOutcome::applied(None))
    }

    /// Repair pass: retry every queued write with the node's current record.
    pub async fn flush_pending(&self) -> FlushReport {
        let writes = {
            let tree = self.tree.borrow();
            let batch = self
                .pending
                .borrow_mut()
                .retry_batch(|id| tree.record(id).cloned());
            batch
        };
        if writes.is_empty() {
            return FlushReport {
                retried: 0,
                remaining: self.pending_len(),
            };
        }

        let retried = writes.len();
        if let Err(e) = self.persist(writes).await {
            warn!("outline: repair pass incomplete: {e}");
        }
        let remaining = self.pending_len();
        log!("outline: repair pass retried {retried}, {remaining} still pending");
        FlushReport { retried, remaining }
    }

    /// Issue all writes at once and wait for every one of them.
    async fn persist(&self, writes: Vec<PendingWrite>) -> Result<(), CommandError> {
        let issued = {
            let mut pending = self.pending.borrow_mut();
            writes
                .into_iter()
                .map(|w| (pending.issue(), w))
                .collect::<Vec<_>>()
        };

        let results = join_all(issued.iter().map(|(_, w)| self.send(w))).await;

        let mut failed: Vec<NodeId> = vec![];
        let mut first: Option<StoreError> = None;
        let mut pending = self.pending.borrow_mut();
        for ((seq, write), res) in issued.into_iter().zip(results) {
            match res {
                Ok(()) => pending.succeeded(seq, write.id()),
                Err(e) => {
                    warn!("outline: store write for {} failed: {e}", write.id());
                    failed.push(write.id().clone());
                    first.get_or_insert(e);
                    pending.failed(seq, write);
                }
            }
        }

        match first {
            None => Ok(()),
            Some(first) => Err(CommandError::Persist { failed, first }),
        }
    }

    async fn send(&self, write: &PendingWrite) -> StoreResult<()> {
        match write {
            PendingWrite::Set(rec) => self.store.set(&rec.id, rec).await,
            PendingWrite::Remove(id) => self.store.remove(id).await,
        }
    }
}
