use serde::{Deserialize, Serialize};

use super::InputHandle;

// Directed derivation edge between two nodes
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: Self::derive_id(&source, &target, None),
            source,
            target,
            source_handle: None,
            target_handle: None,
        }
    }

    /// Edge into a named input of the target.
    pub fn into_handle(
        source: impl Into<String>,
        target: impl Into<String>,
        handle: InputHandle,
    ) -> Self {
        Self::new(source, target).with_target_handle(handle.as_str())
    }

    pub fn with_target_handle(mut self, handle: impl Into<String>) -> Self {
        self.target_handle = Some(handle.into());
        self.id = Self::derive_id(&self.source, &self.target, self.target_handle.as_deref());
        self
    }

    pub fn with_source_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = Some(handle.into());
        self
    }

    /// Identity of the logical connection; re-creating it yields the same id.
    ///
    /// Node ids are length-prefixed so ids containing `->` or `:` cannot
    /// collide with another (source, target, handle) triple.
    pub fn derive_id(source: &str, target: &str, target_handle: Option<&str>) -> String {
        format!(
            "edge:{}:{}->{}:{}:{}",
            source.len(),
            source,
            target.len(),
            target,
            target_handle.unwrap_or("default")
        )
    }

    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }

    pub fn input_handle(&self) -> Option<InputHandle> {
        self.target_handle.as_deref().and_then(|h| h.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_is_deterministic() {
        let a = Edge::into_handle("img", "vid", InputHandle::StartImage);
        let b = Edge::into_handle("img", "vid", InputHandle::StartImage);
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, Edge::into_handle("img", "vid", InputHandle::EndImage).id);
    }

    #[test]
    fn test_ids_with_separators_do_not_collide() {
        let a = Edge::new("a->b", "c").with_target_handle("d");
        let b = Edge::new("a", "b->c").with_target_handle("d");
        let c = Edge::new("a", "b:c").with_target_handle("d");
        let d = Edge::new("a", "b").with_target_handle("c:d");
        assert_ne!(a.id, b.id);
        assert_ne!(c.id, d.id);
    }

    #[test]
    fn test_source_handle_does_not_change_identity() {
        let plain = Edge::new("a", "b");
        let handled = Edge::new("a", "b").with_source_handle("out");
        assert_eq!(plain.id, handled.id);
    }
}
