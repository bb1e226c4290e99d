use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::PersistenceResult;
use crate::model::{Edge, Node};
use crate::store::GraphStore;

/// Persisted form of one project's graph.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    #[serde(default)]
    pub elements: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub project_title: String,
    pub updated_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(project_title: impl Into<String>, elements: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self {
            elements,
            edges,
            project_title: project_title.into(),
            updated_at: Utc::now(),
        }
    }

    pub fn from_store(store: &GraphStore, project_title: impl Into<String>) -> Self {
        let (elements, edges) = store.to_parts();
        Self::new(project_title, elements, edges)
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() && self.edges.is_empty()
    }

    pub fn to_json(&self) -> PersistenceResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> PersistenceResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
