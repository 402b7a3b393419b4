//! Node persistence contract and its backends.
//!
//! The engine only needs `create`/`set`/`remove`; `get` exists for loading a tree at startup.
//! Every call is a suspension point, and callers never hold tree borrows across one.

mod local;
mod memory;
mod remote;

pub use local::LocalStore;
pub use memory::{MemoryStore, StoreOp};
pub use remote::HttpStore;

use crate::config::{EnvConfig, StoreBackend};
use crate::models::{NodeId, NodeRecord};
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreErrorKind {
    Unauthorized,
    Network,
    Http,
    Parse,
    /// The backend cannot be reached at all (no window, no localStorage).
    Unavailable,
    /// Write refused by the store itself.
    Rejected,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StoreError {}

impl StoreError {
    pub(crate) fn network(e: reqwest::Error) -> Self {
        Self {
            kind: StoreErrorKind::Network,
            message: e.to_string(),
        }
    }

    pub(crate) fn parse(e: impl std::fmt::Display) -> Self {
        Self {
            kind: StoreErrorKind::Parse,
            message: e.to_string(),
        }
    }

    pub(crate) fn unauthorized() -> Self {
        Self {
            kind: StoreErrorKind::Unauthorized,
            message: "Unauthorized".to_string(),
        }
    }

    pub(crate) fn http(status: reqwest::StatusCode, body: String, ctx: &str) -> Self {
        Self {
            kind: StoreErrorKind::Http,
            message: format!("{ctx} ({status}): {body}"),
        }
    }

    pub(crate) fn unavailable(what: &str) -> Self {
        Self {
            kind: StoreErrorKind::Unavailable,
            message: format!("{what} is not available"),
        }
    }

    pub fn rejected(id: &NodeId) -> Self {
        Self {
            kind: StoreErrorKind::Rejected,
            message: format!("write rejected for node {id}"),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Async key-value persistence of node records.
///
/// `create` allocates the id and persists `{id, text, checked: false, children: []}`.
/// It does not touch `parent.children`; the caller appends the id and writes the parent.
#[allow(async_fn_in_trait)]
pub trait NodeStore {
    async fn create(&self, text: &str, parent: &NodeRecord) -> StoreResult<NodeRecord>;

    async fn get(&self, id: &NodeId) -> StoreResult<Option<NodeRecord>>;

    /// Upsert the full record.
    async fn set(&self, id: &NodeId, record: &NodeRecord) -> StoreResult<()>;

    async fn remove(&self, id: &NodeId) -> StoreResult<()>;
}

impl<S: NodeStore> NodeStore for Rc<S> {
    async fn create(&self, text: &str, parent: &NodeRecord) -> StoreResult<NodeRecord> {
        (**self).create(text, parent).await
    }

    async fn get(&self, id: &NodeId) -> StoreResult<Option<NodeRecord>> {
        (**self).get(id).await
    }

    async fn set(&self, id: &NodeId, record: &NodeRecord) -> StoreResult<()> {
        (**self).set(id, record).await
    }

    async fn remove(&self, id: &NodeId) -> StoreResult<()> {
        (**self).remove(id).await
    }
}

/// The store picked by `window.ENV.STORE`.
pub enum AppStore {
    Memory(MemoryStore),
    Local(LocalStore),
    Remote(HttpStore),
}

impl AppStore {
    pub fn from_config(config: &EnvConfig) -> Self {
        match config.store {
            StoreBackend::Memory => Self::Memory(MemoryStore::new()),
            StoreBackend::Local => Self::Local(LocalStore::new()),
            StoreBackend::Remote => Self::Remote(HttpStore::load_from_storage(config.api_url.clone())),
        }
    }
}

impl NodeStore for AppStore {
    async fn create(&self, text: &str, parent: &NodeRecord) -> StoreResult<NodeRecord> {
        match self {
            Self::Memory(s) => s.create(text, parent).await,
            Self::Local(s) => s.create(text, parent).await,
            Self::Remote(s) => s.create(text, parent).await,
        }
    }

    async fn get(&self, id: &NodeId) -> StoreResult<Option<NodeRecord>> {
        match self {
            Self::Memory(s) => s.get(id).await,
            Self::Local(s) => s.get(id).await,
            Self::Remote(s) => s.get(id).await,
        }
    }

    async fn set(&self, id: &NodeId, record: &NodeRecord) -> StoreResult<()> {
        match self {
            Self::Memory(s) => s.set(id, record).await,
            Self::Local(s) => s.set(id, record).await,
            Self::Remote(s) => s.set(id, record).await,
        }
    }

    async fn remove(&self, id: &NodeId) -> StoreResult<()> {
        match self {
            Self::Memory(s) => s.remove(id).await,
            Self::Local(s) => s.remove(id).await,
            Self::Remote(s) => s.remove(id).await,
        }
    }
}

/// Load every record reachable from `root` (breadth-first).
///
/// Missing children are skipped; a missing root yields an empty list.
pub async fn load_reachable<S: NodeStore>(store: &S, root: &NodeId) -> StoreResult<Vec<NodeRecord>> {
    let mut out: Vec<NodeRecord> = vec![];
    let mut seen: std::collections::HashSet<NodeId> = std::collections::HashSet::new();
    let mut queue: std::collections::VecDeque<NodeId> = std::collections::VecDeque::new();
    queue.push_back(root.clone());

    while let Some(id) = queue.pop_front() {
        if !seen.insert(id.clone()) {
            continue;
        }
        let Some(rec) = store.get(&id).await? else {
            continue;
        };
        queue.extend(rec.children.iter().cloned());
        out.push(rec);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_store_error_display_is_message() {
        let e = StoreError::rejected(&NodeId::from("n1"));
        assert_eq!(e.kind, StoreErrorKind::Rejected);
        assert_eq!(e.to_string(), "write rejected for node n1");
    }

    #[test]
    fn test_load_reachable_walks_children_and_skips_missing() {
        let store = MemoryStore::new();
        let mut root = NodeRecord::new(NodeId::from("root"), "");
        root.children = vec![NodeId::from("a"), NodeId::from("gone")];
        let mut a = NodeRecord::new(NodeId::from("a"), "A");
        a.children = vec![NodeId::from("a1")];
        let a1 = NodeRecord::new(NodeId::from("a1"), "A1");
        store.seed(vec![root, a, a1]);

        let loaded = block_on(load_reachable(&store, &NodeId::from("root"))).expect("load");
        let ids = loaded.iter().map(|r| r.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["root", "a", "a1"]);
    }

    #[test]
    fn test_load_reachable_missing_root_is_empty() {
        let store = MemoryStore::new();
        let loaded = block_on(load_reachable(&store, &NodeId::from("root"))).expect("load");
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_app_store_memory_backend_delegates() {
        let store = AppStore::Memory(MemoryStore::new());
        let parent = NodeRecord::new(NodeId::from("root"), "");
        let created = block_on(store.create("", &parent)).expect("create");
        let got = block_on(store.get(&created.id)).expect("get");
        assert_eq!(got, Some(created));
    }
}
