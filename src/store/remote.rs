use super::{NodeStore, StoreError, StoreResult};
use crate::models::{NodeId, NodeRecord};
use crate::storage::load_token;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct CreateNodeRequest {
    pub text: String,

    /// Intended parent; the backend may record the association, the client still writes the
    /// parent's `children` itself.
    #[serde(rename = "parent-id")]
    pub parent_id: NodeId,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct NodeIdRequest {
    pub id: NodeId,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub(crate) struct SetNodeRequest {
    pub id: NodeId,
    pub node: NodeRecord,
}

/// JSON-over-HTTP node store.
#[derive(Clone)]
pub struct HttpStore {
    pub(crate) base_url: String,
    pub(crate) token: Option<String>,
}

impl HttpStore {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            token: None,
        }
    }

    pub fn load_from_storage(base_url: String) -> Self {
        Self {
            base_url,
            token: load_token(),
        }
    }

    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    fn get_auth_header(&self) -> Option<String> {
        self.token.as_ref().map(|t| format!("Bearer {}", t))
    }

    async fn request_api<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> StoreResult<T> {
        let client = reqwest::Client::new();
        let url = format!("{}{}", self.base_url, path);
        let mut req = client.post(url).json(body);
        if let Some(auth) = self.get_auth_header() {
            req = req.header("Authorization", auth);
        }

        let res = req.send().await.map_err(StoreError::network)?;

        if res.status().is_success() {
            res.json().await.map_err(StoreError::parse)
        } else if res.status().as_u16() == 401 {
            Err(StoreError::unauthorized())
        } else {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            Err(StoreError::http(status, body, "Request failed"))
        }
    }

    /// Accepts `{"node": {...}}`, a bare record, or just `{"id": ...}`.
    pub(crate) fn parse_created_node(data: serde_json::Value, text: &str) -> StoreResult<NodeRecord> {
        let node = data.get("node").cloned().unwrap_or(data);
        if let Ok(rec) = serde_json::from_value::<NodeRecord>(node.clone()) {
            if !rec.id.as_str().trim().is_empty() {
                return Ok(rec);
            }
        }

        let id = node
            .get("id")
            .or_else(|| node.get("node-id"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        if id.trim().is_empty() {
            return Err(StoreError::parse(format!(
                "Create node succeeded but response is missing node id: {}",
                node
            )));
        }

        Ok(NodeRecord::new(NodeId(id), text))
    }

    /// `{"node": null}` and `{}` both mean "no such record".
    pub(crate) fn parse_get_node(data: serde_json::Value) -> StoreResult<Option<NodeRecord>> {
        match data.get("node") {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(node) => serde_json::from_value(node.clone())
                .map(Some)
                .map_err(StoreError::parse),
        }
    }
}

impl NodeStore for HttpStore {
    async fn create(&self, text: &str, parent: &NodeRecord) -> StoreResult<NodeRecord> {
        let data: serde_json::Value = self
            .request_api(
                "/outline/create-node",
                &CreateNodeRequest {
                    text: text.to_string(),
                    parent_id: parent.id.clone(),
                },
            )
            .await?;
        Self::parse_created_node(data, text)
    }

    async fn get(&self, id: &NodeId) -> StoreResult<Option<NodeRecord>> {
        let data: serde_json::Value = self
            .request_api("/outline/get-node", &NodeIdRequest { id: id.clone() })
            .await?;
        Self::parse_get_node(data)
    }

    async fn set(&self, id: &NodeId, record: &NodeRecord) -> StoreResult<()> {
        let _: serde_json::Value = self
            .request_api(
                "/outline/set-node",
                &SetNodeRequest {
                    id: id.clone(),
                    node: record.clone(),
                },
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, id: &NodeId) -> StoreResult<()> {
        let _: serde_json::Value = self
            .request_api("/outline/remove-node", &NodeIdRequest { id: id.clone() })
            .await?;
        Ok(())
    }
}
