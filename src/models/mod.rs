use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque node identifier, allocated by the store and stable for the node's lifetime.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One persisted outline item.
///
/// There is no parent field: parentage is whichever record lists this id in `children`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NodeRecord {
    pub id: NodeId,

    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub checked: bool,

    /// Child ids in document order.
    #[serde(default)]
    pub children: Vec<NodeId>,
}

impl NodeRecord {
    pub fn new(id: NodeId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            checked: false,
            children: vec![],
        }
    }

    pub fn position_of(&self, child: &NodeId) -> Option<usize> {
        self.children.iter().position(|c| c == child)
    }

    /// Append `child` unless already present. Returns false on duplicates.
    pub fn push_child(&mut self, child: NodeId) -> bool {
        if self.children.contains(&child) {
            return false;
        }
        self.children.push(child);
        true
    }

    /// Insert `child` at `index` (clamped). An existing entry is moved rather than duplicated.
    pub fn insert_child(&mut self, index: usize, child: NodeId) {
        if let Some(old) = self.position_of(&child) {
            self.children.remove(old);
        }
        let index = index.min(self.children.len());
        self.children.insert(index, child);
    }

    pub fn remove_child(&mut self, child: &NodeId) -> bool {
        let before = self.children.len();
        self.children.retain(|c| c != child);
        self.children.len() != before
    }
}
