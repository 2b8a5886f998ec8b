use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type Metadata = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Child identifier scoped under this node.
    pub fn child(&self, suffix: &str) -> Self {
        Self(format!("{}/{}", self.0, suffix))
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub metadata: Metadata,
}

impl Node {
    pub fn new(id: NodeId, metadata: Metadata) -> Self {
        Self { id, metadata }
    }

    /// Host node for the machine the agent runs on.
    pub fn host(name: &str) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert("Type".to_string(), Value::from("host"));
        metadata.insert("Name".to_string(), Value::from(name));
        Self::new(NodeId::new(name), metadata)
    }

    pub fn node_type(&self) -> Option<&str> {
        self.metadata.get("Type").and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata.get("Name").and_then(Value::as_str)
    }
}
