//! Schema definitions consumed by the graph model
//!
//! Node and event definitions describe the declared types of a graph: which
//! properties make an instance unique, which properties form its display text,
//! and for events, which node types they connect. The graph store and the
//! chain engine only ever read definitions, through [`DefinitionSource`].

pub mod registry;

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub use registry::{
    Catalog, Registry, RegistryChange, RegistryError, RegistryListener, RegistryResult, SchemaDocument,
};

/// Read-only view of the declared node and event types
pub trait DefinitionSource {
    /// Definition of a node type
    fn node_definition(&self, node_name: &str) -> Option<Arc<NodeDefinition>>;

    /// Definition of an event type between a left and a right node type
    fn event_definition(
        &self,
        event_name: &str,
        left_node_name: &str,
        right_node_name: &str,
    ) -> Option<Arc<EventDefinition>>;

    /// Every event definition that has `node_name` as its left or right type
    fn events_incident_to(&self, node_name: &str) -> Vec<Arc<EventDefinition>>;
}

impl<T: DefinitionSource + ?Sized> DefinitionSource for Arc<T> {
    fn node_definition(&self, node_name: &str) -> Option<Arc<NodeDefinition>> {
        (**self).node_definition(node_name)
    }

    fn event_definition(
        &self,
        event_name: &str,
        left_node_name: &str,
        right_node_name: &str,
    ) -> Option<Arc<EventDefinition>> {
        (**self).event_definition(event_name, left_node_name, right_node_name)
    }

    fn events_incident_to(&self, node_name: &str) -> Vec<Arc<EventDefinition>> {
        (**self).events_incident_to(node_name)
    }
}

/// Which endpoint of an event requires the event to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventRequired {
    Left,
    Right,
    Both,
    #[default]
    None,
}

/// Operation directive stamped onto entities for persistence adapters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperateKind {
    /// Explicit create
    Create,
    /// Explicit update keyed by id
    Update,
    /// Create when no entity with the same unique properties exists, else update
    CreateOrUpdate,
    /// Create only when no entity with the same unique properties exists
    CreateNotExist,
    /// Explicit delete keyed by id
    Delete,
    /// Match on all properties
    Query,
    /// Match on unique properties
    Match,
}

/// Per-instance authority flags
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataAuthority {
    pub edit_disabled: bool,
    pub delete_disabled: bool,
    pub properties_disabled: Vec<String>,
}

/// Declared node type
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeDefinition {
    /// Type name, taken from the catalog key
    #[serde(skip)]
    pub node_name: String,
    pub title: Option<String>,
    pub display: Vec<String>,
    pub namespace: Vec<String>,
    pub extend: Vec<String>,
    pub unique_index: Vec<String>,
}

impl NodeDefinition {
    pub fn new(node_name: impl Into<String>) -> Self {
        NodeDefinition {
            node_name: node_name.into(),
            ..Default::default()
        }
    }

    /// Set the unique index properties, kept sorted
    pub fn with_unique_index<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_index = properties.into_iter().map(Into::into).collect();
        self.unique_index.sort();
        self
    }

    pub fn with_display<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.display = properties.into_iter().map(Into::into).collect();
        self
    }

    /// Set the namespaces, kept sorted
    pub fn with_namespace<I, S>(mut self, namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespace = namespaces.into_iter().map(Into::into).collect();
        self.namespace.sort();
        self
    }

    pub fn in_namespace(&self, namespace: &str) -> bool {
        self.namespace.binary_search_by(|n| n.as_str().cmp(namespace)).is_ok()
    }

    pub(crate) fn normalize(&mut self) {
        self.unique_index.sort();
        self.namespace.sort();
    }
}

/// Declared event type between two node types
///
/// Two definitions are the same definition when their event name and both
/// endpoint types match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventDefinition {
    #[serde(skip)]
    pub event_name: String,
    #[serde(skip)]
    pub left_node_name: String,
    #[serde(skip)]
    pub right_node_name: String,
    pub title: Option<String>,
    pub display: Vec<String>,
    pub namespace: Vec<String>,
    pub unique_index: Vec<String>,
    pub is_member: bool,
    pub is_left_master: bool,
    pub is_right_master: bool,
    pub required: EventRequired,
    pub readonly: bool,
}

impl EventDefinition {
    pub fn new(
        event_name: impl Into<String>,
        left_node_name: impl Into<String>,
        right_node_name: impl Into<String>,
    ) -> Self {
        EventDefinition {
            event_name: event_name.into(),
            left_node_name: left_node_name.into(),
            right_node_name: right_node_name.into(),
            ..Default::default()
        }
    }

    /// Set the unique index properties, kept sorted
    pub fn with_unique_index<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_index = properties.into_iter().map(Into::into).collect();
        self.unique_index.sort();
        self
    }

    pub fn with_member(mut self, is_member: bool) -> Self {
        self.is_member = is_member;
        self
    }

    pub fn with_required(mut self, required: EventRequired) -> Self {
        self.required = required;
        self
    }

    pub fn with_masters(mut self, left: bool, right: bool) -> Self {
        self.is_left_master = left;
        self.is_right_master = right;
        self
    }

    /// The endpoint type opposite to `node_name`
    pub fn target_node_name(&self, node_name: &str) -> &str {
        if node_name == self.left_node_name {
            &self.right_node_name
        } else {
            &self.left_node_name
        }
    }

    /// Whether instances of `node_name` must take part in this event
    pub fn is_required(&self, node_name: &str) -> bool {
        (self.left_node_name == node_name
            && matches!(self.required, EventRequired::Left | EventRequired::Both))
            || (self.right_node_name == node_name
                && matches!(self.required, EventRequired::Right | EventRequired::Both))
    }

    /// Whether `node_name` is the member side of a membership event
    pub fn is_member_of(&self, node_name: &str) -> bool {
        self.is_member && self.left_node_name == node_name
    }

    pub fn is_master(&self, node_name: &str) -> bool {
        (self.left_node_name == node_name && self.is_left_master)
            || (self.right_node_name == node_name && self.is_right_master)
    }

    pub fn touches(&self, node_name: &str) -> bool {
        self.left_node_name == node_name || self.right_node_name == node_name
    }

    pub(crate) fn normalize(&mut self) {
        self.unique_index.sort();
        self.namespace.sort();
    }
}

impl PartialEq for EventDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.event_name == other.event_name
            && self.left_node_name == other.left_node_name
            && self.right_node_name == other.right_node_name
    }
}

impl Eq for EventDefinition {}

impl Hash for EventDefinition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.left_node_name.hash(state);
        self.event_name.hash(state);
        self.right_node_name.hash(state);
    }
}
