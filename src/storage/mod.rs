use crate::models::NodeId;
use serde::{Deserialize, Serialize};

pub(crate) const TOKEN_KEY: &str = "outline_token";

/// Monotonic counter used by `LocalStore` when allocating ids.
pub(crate) const NODE_SEQ_KEY: &str = "outline_node_seq";

pub(crate) fn node_key(id: &NodeId) -> String {
    format!("outline_node::{id}")
}

pub(crate) fn local_storage() -> Option<web_sys::Storage> {
    web_sys::window().and_then(|w| w.local_storage().ok().flatten())
}

pub(crate) fn load_json_from_storage<T: for<'de> Deserialize<'de>>(key: &str) -> Option<T> {
    let storage = local_storage()?;
    let json = storage.get_item(key).ok().flatten()?;
    serde_json::from_str(&json).ok()
}

/// Returns false when localStorage is missing, full, or the value does not serialize.
pub(crate) fn save_json_to_storage<T: Serialize>(key: &str, value: &T) -> bool {
    let Ok(json) = serde_json::to_string(value) else {
        return false;
    };
    local_storage()
        .map(|storage| storage.set_item(key, &json).is_ok())
        .unwrap_or(false)
}

pub(crate) fn remove_from_storage(key: &str) -> bool {
    local_storage()
        .map(|storage| storage.remove_item(key).is_ok())
        .unwrap_or(false)
}

pub(crate) fn load_token() -> Option<String> {
    local_storage().and_then(|s| s.get_item(TOKEN_KEY).ok().flatten())
}
