use super::{NodeStore, StoreError, StoreResult};
use crate::models::{NodeId, NodeRecord};
use crate::storage::{
    load_json_from_storage, local_storage, node_key, remove_from_storage, save_json_to_storage,
    NODE_SEQ_KEY,
};
use crate::util::now_ms;

/// Records kept in browser localStorage, one key per node.
#[derive(Clone, Default)]
pub struct LocalStore;

impl LocalStore {
    pub fn new() -> Self {
        Self
    }

    fn next_seq() -> StoreResult<u64> {
        let seq = load_json_from_storage::<u64>(NODE_SEQ_KEY).unwrap_or(0) + 1;
        if !save_json_to_storage(NODE_SEQ_KEY, &seq) {
            return Err(StoreError::unavailable("localStorage"));
        }
        Ok(seq)
    }
}

pub(crate) fn make_local_node_id(now_ms: i64, seq: u64) -> NodeId {
    NodeId(format!("loc-{now_ms}-{seq}"))
}

impl NodeStore for LocalStore {
    async fn create(&self, text: &str, _parent: &NodeRecord) -> StoreResult<NodeRecord> {
        let id = make_local_node_id(now_ms(), Self::next_seq()?);
        let rec = NodeRecord::new(id.clone(), text);
        if !save_json_to_storage(&node_key(&id), &rec) {
            return Err(StoreError::rejected(&id));
        }
        Ok(rec)
    }

    async fn get(&self, id: &NodeId) -> StoreResult<Option<NodeRecord>> {
        if local_storage().is_none() {
            return Err(StoreError::unavailable("localStorage"));
        }
        Ok(load_json_from_storage::<NodeRecord>(&node_key(id)))
    }

    async fn set(&self, id: &NodeId, record: &NodeRecord) -> StoreResult<()> {
        if save_json_to_storage(&node_key(id), record) {
            Ok(())
        } else {
            Err(StoreError::rejected(id))
        }
    }

    async fn remove(&self, id: &NodeId) -> StoreResult<()> {
        if remove_from_storage(&node_key(id)) {
            Ok(())
        } else {
            Err(StoreError::unavailable("localStorage"))
        }
    }
}


// WASM-only tests (run with `cargo test --target wasm32-unknown-unknown` + wasm-bindgen-test-runner)
#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use futures::executor::block_on;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_local_store_roundtrip() {
        let store = LocalStore::new();
        let parent = NodeRecord::new(NodeId::from("root"), "");
        let mut rec = block_on(store.create("", &parent)).expect("create");

        rec.text = "hello".to_string();
        rec.checked = true;
        block_on(store.set(&rec.id, &rec)).expect("set");
        assert_eq!(block_on(store.get(&rec.id)).expect("get"), Some(rec.clone()));

        block_on(store.remove(&rec.id)).expect("remove");
        assert_eq!(block_on(store.get(&rec.id)).expect("get"), None);
    }
}
