//! Node entities
//!
//! A node is a typed vertex. Its logic id is its type name followed by its
//! instance id.

use super::entity::{EntityCore, SdEntity};
use super::property::PropertyValue;
use crate::definition::{DefinitionSource, EventDefinition};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A vertex of a declared node type
///
/// Equality and hashing use the logic id only. Cloning drops the cached
/// fingerprint so a modified copy recomputes it, and drops the transient
/// children map.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct NodeEntity {
    #[serde(flatten)]
    core: EntityCore,

    /// Caller-side traversal helper, not indexed by any store
    #[serde(skip)]
    children: IndexMap<Arc<EventDefinition>, Vec<NodeEntity>>,
}

impl NodeEntity {
    pub fn new(sd: impl Into<String>, id: impl Into<String>) -> Self {
        NodeEntity {
            core: EntityCore::new(sd, id),
            children: IndexMap::new(),
        }
    }

    pub fn from_core(core: EntityCore) -> Self {
        NodeEntity {
            core,
            children: IndexMap::new(),
        }
    }

    /// Builder-style property setter
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.set_property(key, value);
        self
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.core.id = Some(id.into());
        self.core.uuid = None;
    }

    pub fn set_sd(&mut self, sd: impl Into<String>) {
        self.core.sd = Some(sd.into());
        self.core.uuid = None;
    }

    pub fn put_child(&mut self, event: Arc<EventDefinition>, child: NodeEntity) {
        self.children.entry(event).or_default().push(child);
    }

    pub fn children(&self) -> &IndexMap<Arc<EventDefinition>, Vec<NodeEntity>> {
        &self.children
    }

    /// Copy that keeps the cached fingerprint
    pub(crate) fn duplicate(&self) -> Self {
        NodeEntity::from_core(self.core.clone())
    }
}

impl SdEntity for NodeEntity {
    const KIND: &'static str = "Node";

    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn base_properties(&self) -> Option<String> {
        self.core.sd.clone()
    }

    fn unique_index<D: DefinitionSource + ?Sized>(&self, defs: &D) -> Vec<String> {
        self.sd()
            .and_then(|sd| defs.node_definition(sd))
            .map(|def| def.unique_index.clone())
            .unwrap_or_default()
    }

    fn display_keys<D: DefinitionSource + ?Sized>(&self, defs: &D) -> Vec<String> {
        self.sd()
            .and_then(|sd| defs.node_definition(sd))
            .map(|def| def.display.clone())
            .unwrap_or_default()
    }
}

impl Clone for NodeEntity {
    fn clone(&self) -> Self {
        NodeEntity::from_core(self.core.without_uuid())
    }
}

impl PartialEq for NodeEntity {
    fn eq(&self, other: &Self) -> bool {
        self.logic_key() == other.logic_key()
    }
}

impl Eq for NodeEntity {}

impl Hash for NodeEntity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.logic_key().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{Catalog, EventDefinition, NodeDefinition};

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .put_node(
                NodeDefinition::new("Person")
                    .with_unique_index(["name"])
                    .with_display(["name", "age"]),
                false,
            )
            .unwrap();
        catalog.put_node(NodeDefinition::new("Tag"), false).unwrap();
        catalog
    }

    #[test]
    fn test_effective_and_logic_id() {
        let node = NodeEntity::new("Person", "1");
        assert!(node.is_effective());
        assert_eq!(node.logic_id().unwrap(), "Person1");

        let mut partial = NodeEntity::default();
        partial.set_id("1");
        assert!(!partial.is_effective());
        assert!(partial.logic_id().is_err());
    }

    #[test]
    fn test_uuid_from_unique_index() {
        let defs = catalog();
        let mut a = NodeEntity::new("Person", "1").with_property("name", "ann");
        let mut b = NodeEntity::new("Person", "2").with_property("name", "ann");
        let ua = a.generate_uuid(&defs).unwrap();
        let ub = b.generate_uuid(&defs).unwrap();
        assert!(ua.is_some());
        assert_eq!(ua, ub);
        assert_eq!(a.uuid(), ua.as_deref());
    }

    #[test]
    fn test_uuid_indeterminate_when_unique_value_missing() {
        let defs = catalog();
        let mut node = NodeEntity::new("Person", "1");
        assert_eq!(node.generate_uuid(&defs).unwrap(), None);
    }

    #[test]
    fn test_uuid_uses_id_without_unique_index() {
        let defs = catalog();
        let mut a = NodeEntity::new("Tag", "1");
        let mut b = NodeEntity::new("Tag", "2");
        assert_ne!(a.generate_uuid(&defs).unwrap(), b.generate_uuid(&defs).unwrap());
    }

    #[test]
    fn test_uuid_requires_effective() {
        let defs = catalog();
        let mut node = NodeEntity::default();
        assert!(node.generate_uuid(&defs).is_err());
    }

    #[test]
    fn test_clone_drops_uuid() {
        let defs = catalog();
        let mut node = NodeEntity::new("Person", "1").with_property("name", "ann");
        node.generate_uuid(&defs).unwrap();
        assert!(node.uuid().is_some());
        assert!(node.clone().uuid().is_none());
        assert!(node.duplicate().uuid().is_some());
    }

    #[test]
    fn test_merge_skips_reserved() {
        let mut target = NodeEntity::new("Person", "1").with_property("name", "ann");
        let mut source = NodeEntity::new("Person", "9").with_property("age", 30);
        source.set_operate(crate::definition::OperateKind::Delete);

        target.merge(&source);
        assert_eq!(target.id(), Some("1"));
        assert_eq!(target.property("age"), Some(&PropertyValue::Integer(30)));
        assert_eq!(target.property("name"), Some(&PropertyValue::from("ann")));
        assert_eq!(target.operate(), None);
    }

    #[test]
    fn test_equality_by_logic_id() {
        let a = NodeEntity::new("Person", "1").with_property("name", "ann");
        let b = NodeEntity::new("Person", "1").with_property("name", "bob");
        assert_eq!(a, b);
        assert_ne!(a, NodeEntity::new("Person", "2"));
    }

    #[test]
    fn test_resolve_uuid_reuses_cache() {
        let defs = catalog();
        let mut node = NodeEntity::new("Person", "1").with_property("name", "ann");
        let first = node.resolve_uuid(&defs).unwrap();
        assert!(first.is_some());

        // Without a cache the empty catalog would hash the id instead.
        assert_eq!(node.resolve_uuid(&Catalog::new()).unwrap(), first);
        assert_ne!(node.generate_uuid(&Catalog::new()).unwrap(), first);
    }

    #[test]
    fn test_directive_flags() {
        let mut node: NodeEntity = serde_json::from_str(
            r#"{"__sd":"Person","__id":"1","$operate_create_original_id":true,"$operate_delete_enforce":true}"#,
        )
        .unwrap();
        assert!(node.is_create_original_id());
        assert!(node.is_delete_enforce());
        assert!(node.properties().is_empty());

        node.remove_directives();
        assert!(!node.is_create_original_id());
        assert!(!node.is_delete_enforce());
        assert!(node.core().directives.is_empty());
    }

    #[test]
    fn test_children_grouped_by_event() {
        let owns = Arc::new(EventDefinition::new("OWNS", "Person", "Tag"));
        let likes = Arc::new(EventDefinition::new("LIKES", "Person", "Tag"));
        let mut node = NodeEntity::new("Person", "1");
        node.put_child(Arc::clone(&owns), NodeEntity::new("Tag", "a"));
        node.put_child(Arc::clone(&likes), NodeEntity::new("Tag", "b"));
        node.put_child(Arc::clone(&owns), NodeEntity::new("Tag", "c"));

        assert_eq!(node.children().len(), 2);
        let owned: Vec<_> = node.children()[&owns].iter().filter_map(|c| c.id()).collect();
        assert_eq!(owned, vec!["a", "c"]);

        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json.as_object().map(|o| o.len()), Some(2));
    }

    #[test]
    fn test_display() {
        let defs = catalog();
        let node = NodeEntity::new("Person", "1").with_property("name", "ann");
        assert_eq!(node.display(&defs), "annnull");
    }

    #[test]
    fn test_json_shape() {
        let node: NodeEntity =
            serde_json::from_str(r#"{"__sd":"Person","__id":"1","name":"ann","$syncLock":true}"#)
                .unwrap();
        assert_eq!(node.logic_id().unwrap(), "Person1");
        assert_eq!(node.core().directives.sync_lock, Some(true));
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["name"], "ann");
    }
}
