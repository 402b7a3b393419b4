use super::{NodeStore, StoreError, StoreResult};
use crate::models::{NodeId, NodeRecord};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet};

/// One call observed by a [`MemoryStore`], in issue order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreOp {
    Create(NodeId),
    Set(NodeId),
    Remove(NodeId),
}

/// In-process store. Backs `STORE=memory` and every engine test.
///
/// Writes for ids in the reject set fail with [`super::StoreErrorKind::Rejected`] and leave
/// the stored state untouched.
#[derive(Default)]
pub struct MemoryStore {
    records: RefCell<BTreeMap<NodeId, NodeRecord>>,
    next_id: Cell<u64>,
    ops: RefCell<Vec<StoreOp>>,
    rejected: RefCell<HashSet<NodeId>>,
    reject_creates: Cell<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, records: impl IntoIterator<Item = NodeRecord>) {
        let mut map = self.records.borrow_mut();
        for rec in records {
            map.insert(rec.id.clone(), rec);
        }
    }

    pub fn record(&self, id: &NodeId) -> Option<NodeRecord> {
        self.records.borrow().get(id).cloned()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.records.borrow().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    pub fn ops(&self) -> Vec<StoreOp> {
        self.ops.borrow().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.borrow_mut().clear();
    }

    pub fn reject_writes_for(&self, id: &NodeId) {
        self.rejected.borrow_mut().insert(id.clone());
    }

    pub fn accept_writes_for(&self, id: &NodeId) {
        self.rejected.borrow_mut().remove(id);
    }

    pub fn reject_creates(&self, reject: bool) {
        self.reject_creates.set(reject);
    }

    fn allocate_id(&self) -> NodeId {
        let n = self.next_id.get() + 1;
        self.next_id.set(n);
        NodeId(format!("mem-{n}"))
    }

    fn check_write(&self, id: &NodeId) -> StoreResult<()> {
        if self.rejected.borrow().contains(id) {
            Err(StoreError::rejected(id))
        } else {
            Ok(())
        }
    }
}

impl NodeStore for MemoryStore {
    async fn create(&self, text: &str, _parent: &NodeRecord) -> StoreResult<NodeRecord> {
        let mut id = self.allocate_id();
        while self.contains(&id) {
            id = self.allocate_id();
        }
        self.ops.borrow_mut().push(StoreOp::Create(id.clone()));
        if self.reject_creates.get() {
            return Err(StoreError::rejected(&id));
        }

        let rec = NodeRecord::new(id.clone(), text);
        self.records.borrow_mut().insert(id, rec.clone());
        Ok(rec)
    }

    async fn get(&self, id: &NodeId) -> StoreResult<Option<NodeRecord>> {
        Ok(self.record(id))
    }

    async fn set(&self, id: &NodeId, record: &NodeRecord) -> StoreResult<()> {
        self.ops.borrow_mut().push(StoreOp::Set(id.clone()));
        self.check_write(id)?;
        self.records.borrow_mut().insert(id.clone(), record.clone());
        Ok(())
    }

    async fn remove(&self, id: &NodeId) -> StoreResult<()> {
        self.ops.borrow_mut().push(StoreOp::Remove(id.clone()));
        self.check_write(id)?;
        self.records.borrow_mut().remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreErrorKind;
    use futures::executor::block_on;

    #[test]
    fn test_create_allocates_fresh_ids_and_empty_records() {
        let store = MemoryStore::new();
        let parent = NodeRecord::new(NodeId::from("root"), "");
        let a = block_on(store.create("", &parent)).expect("create a");
        let b = block_on(store.create("x", &parent)).expect("create b");
        assert_ne!(a.id, b.id);
        assert!(a.children.is_empty());
        assert!(!a.checked);
        assert_eq!(store.record(&b.id).map(|r| r.text), Some("x".to_string()));
    }

    #[test]
    fn test_create_skips_ids_already_seeded() {
        let store = MemoryStore::new();
        store.seed(vec![NodeRecord::new(NodeId::from("mem-1"), "seeded")]);
        let parent = NodeRecord::new(NodeId::from("root"), "");
        let rec = block_on(store.create("", &parent)).expect("create");
        assert_eq!(rec.id, NodeId::from("mem-2"));
    }

    #[test]
    fn test_rejected_writes_leave_state_untouched() {
        let store = MemoryStore::new();
        let id = NodeId::from("n");
        store.seed(vec![NodeRecord::new(id.clone(), "old")]);
        store.reject_writes_for(&id);

        let err = block_on(store.set(&id, &NodeRecord::new(id.clone(), "new"))).unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::Rejected);
        assert!(block_on(store.remove(&id)).is_err());
        assert_eq!(store.record(&id).map(|r| r.text), Some("old".to_string()));

        store.accept_writes_for(&id);
        block_on(store.remove(&id)).expect("remove");
        assert!(!store.contains(&id));
        assert_eq!(
            store.ops(),
            vec![StoreOp::Set(id.clone()), StoreOp::Remove(id.clone()), StoreOp::Remove(id)]
        );
    }
}
