//! Definition registry
//!
//! A [`Catalog`] is an immutable set of node and event definitions. The
//! [`Registry`] owns the current catalog behind a read-write lock and replaces
//! it wholesale on every mutation or reload, so a reader holding a snapshot
//! keeps a consistent view while writers build the next one.

use super::{DefinitionSource, EventDefinition, NodeDefinition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Registry errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Node definition already exists: {0}")]
    NodeExists(String),

    #[error("Node definition not found: {0}")]
    NodeMissing(String),

    #[error("Event definition already exists: {left}-{event}>{right}")]
    EventExists {
        event: String,
        left: String,
        right: String,
    },

    #[error("Event definition not found: {left}-{event}>{right}")]
    EventMissing {
        event: String,
        left: String,
        right: String,
    },

    #[error("Event {event} refers to undefined node type {node}")]
    UndefinedEndpoint { event: String, node: String },

    #[error("JSON schema error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML schema error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Schema file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Registry change [{change}] rejected: {reason}")]
    Rejected { change: String, reason: String },
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Serialized form of a catalog
///
/// Events are nested by event name, then left type, then right type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDocument {
    #[serde(default)]
    pub node: BTreeMap<String, NodeDefinition>,
    #[serde(default)]
    pub event: BTreeMap<String, BTreeMap<String, BTreeMap<String, EventDefinition>>>,
}

type EventKey = (String, String, String);

fn event_key(event: &str, left: &str, right: &str) -> EventKey {
    (event.to_string(), left.to_string(), right.to_string())
}

/// Immutable snapshot of node and event definitions
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    nodes: BTreeMap<String, Arc<NodeDefinition>>,
    events: BTreeMap<EventKey, Arc<EventDefinition>>,
    incident: BTreeMap<String, Vec<Arc<EventDefinition>>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from its document form
    ///
    /// All node types are registered before any event, so events may refer to
    /// node types declared anywhere in the document.
    pub fn from_document(document: SchemaDocument) -> RegistryResult<Self> {
        let mut catalog = Catalog::new();
        for (name, mut def) in document.node {
            def.node_name = name;
            catalog.put_node(def, false)?;
        }
        for (event_name, lefts) in document.event {
            for (left, rights) in lefts {
                for (right, mut def) in rights {
                    def.event_name = event_name.clone();
                    def.left_node_name = left.clone();
                    def.right_node_name = right;
                    catalog.put_event(def, false)?;
                }
            }
        }
        Ok(catalog)
    }

    pub fn to_document(&self) -> SchemaDocument {
        let mut document = SchemaDocument::default();
        for (name, def) in &self.nodes {
            document.node.insert(name.clone(), (**def).clone());
        }
        for ((event, left, right), def) in &self.events {
            document
                .event
                .entry(event.clone())
                .or_default()
                .entry(left.clone())
                .or_default()
                .insert(right.clone(), (**def).clone());
        }
        document
    }

    /// Add or replace a node definition
    ///
    /// Without `overwrite` an existing definition is an error; with it a
    /// missing definition is.
    pub fn put_node(&mut self, mut def: NodeDefinition, overwrite: bool) -> RegistryResult<()> {
        let exists = self.nodes.contains_key(&def.node_name);
        if !overwrite && exists {
            return Err(RegistryError::NodeExists(def.node_name));
        }
        if overwrite && !exists {
            return Err(RegistryError::NodeMissing(def.node_name));
        }
        def.normalize();
        self.nodes.insert(def.node_name.clone(), Arc::new(def));
        Ok(())
    }

    /// Add or replace an event definition; both endpoint types must exist
    pub fn put_event(&mut self, mut def: EventDefinition, overwrite: bool) -> RegistryResult<()> {
        for endpoint in [&def.left_node_name, &def.right_node_name] {
            if !self.nodes.contains_key(endpoint) {
                return Err(RegistryError::UndefinedEndpoint {
                    event: def.event_name.clone(),
                    node: endpoint.clone(),
                });
            }
        }

        let key = event_key(&def.event_name, &def.left_node_name, &def.right_node_name);
        let exists = self.events.contains_key(&key);
        if !overwrite && exists {
            return Err(RegistryError::EventExists {
                event: key.0,
                left: key.1,
                right: key.2,
            });
        }
        if overwrite && !exists {
            return Err(RegistryError::EventMissing {
                event: key.0,
                left: key.1,
                right: key.2,
            });
        }

        def.normalize();
        self.events.insert(key, Arc::new(def));
        self.rebuild_incident();
        Ok(())
    }

    /// Remove a node definition together with every event touching it
    pub fn remove_node(&mut self, node_name: &str) -> Option<Arc<NodeDefinition>> {
        let removed = self.nodes.remove(node_name)?;
        self.events.retain(|_, def| !def.touches(node_name));
        self.rebuild_incident();
        Some(removed)
    }

    pub fn remove_event(
        &mut self,
        event_name: &str,
        left_node_name: &str,
        right_node_name: &str,
    ) -> Option<Arc<EventDefinition>> {
        let removed = self
            .events
            .remove(&event_key(event_name, left_node_name, right_node_name))?;
        self.rebuild_incident();
        Some(removed)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Arc<NodeDefinition>> {
        self.nodes.values()
    }

    pub fn events(&self) -> impl Iterator<Item = &Arc<EventDefinition>> {
        self.events.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.events.is_empty()
    }

    fn rebuild_incident(&mut self) {
        self.incident.clear();
        for def in self.events.values() {
            self.incident
                .entry(def.left_node_name.clone())
                .or_default()
                .push(Arc::clone(def));
            if def.right_node_name != def.left_node_name {
                self.incident
                    .entry(def.right_node_name.clone())
                    .or_default()
                    .push(Arc::clone(def));
            }
        }
    }
}

impl DefinitionSource for Catalog {
    fn node_definition(&self, node_name: &str) -> Option<Arc<NodeDefinition>> {
        self.nodes.get(node_name).cloned()
    }

    fn event_definition(
        &self,
        event_name: &str,
        left_node_name: &str,
        right_node_name: &str,
    ) -> Option<Arc<EventDefinition>> {
        self.events
            .get(&event_key(event_name, left_node_name, right_node_name))
            .cloned()
    }

    fn events_incident_to(&self, node_name: &str) -> Vec<Arc<EventDefinition>> {
        self.incident.get(node_name).cloned().unwrap_or_default()
    }
}

/// A catalog change about to be committed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryChange {
    PutNode(String),
    PutEvent {
        event: String,
        left: String,
        right: String,
    },
    RemoveNode(String),
    RemoveEvent {
        event: String,
        left: String,
        right: String,
    },
    Reload,
}

impl fmt::Display for RegistryChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryChange::PutNode(name) => write!(f, "put node {}", name),
            RegistryChange::PutEvent { event, left, right } => {
                write!(f, "put event {}-{}>{}", left, event, right)
            }
            RegistryChange::RemoveNode(name) => write!(f, "remove node {}", name),
            RegistryChange::RemoveEvent { event, left, right } => {
                write!(f, "remove event {}-{}>{}", left, event, right)
            }
            RegistryChange::Reload => write!(f, "reload"),
        }
    }
}

/// Callback run against the candidate catalog before it is swapped in
///
/// Returning an error vetoes the change.
pub type RegistryListener = Box<dyn Fn(&RegistryChange, &Catalog) -> Result<(), String> + Send + Sync>;

/// Shared, reloadable definition registry
///
/// Lookups go through the current snapshot. Mutations copy the snapshot,
/// apply the change, run the listeners in order and swap the copy in; a
/// failed change or a vetoing listener leaves the current snapshot untouched.
#[derive(Default)]
pub struct Registry {
    current: RwLock<Arc<Catalog>>,
    listeners: Vec<RegistryListener>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("current", &self.snapshot())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Registry {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
            listeners: Vec::new(),
        }
    }

    /// Append a listener; listeners run in the order they were added
    pub fn with_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(&RegistryChange, &Catalog) -> Result<(), String> + Send + Sync + 'static,
    {
        self.listeners.push(Box::new(listener));
        self
    }

    /// Load a schema document; `.yaml`/`.yml` files are read as YAML, anything else as JSON
    pub fn load_path(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let registry = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text)?,
            _ => Self::from_json_str(&text)?,
        };
        let catalog = registry.snapshot();
        info!(
            path = %path.display(),
            nodes = catalog.node_count(),
            events = catalog.event_count(),
            "loaded schema"
        );
        Ok(registry)
    }

    pub fn from_json_str(text: &str) -> RegistryResult<Self> {
        let document: SchemaDocument = serde_json::from_str(text)?;
        Ok(Self::new(Catalog::from_document(document)?))
    }

    pub fn from_yaml_str(text: &str) -> RegistryResult<Self> {
        let document: SchemaDocument = serde_yaml::from_str(text)?;
        Ok(Self::new(Catalog::from_document(document)?))
    }

    /// The current catalog
    pub fn snapshot(&self) -> Arc<Catalog> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replace the whole catalog, returning the previous one
    pub fn reload(&self, catalog: Catalog) -> RegistryResult<Arc<Catalog>> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        self.notify(&RegistryChange::Reload, &catalog)?;
        debug!(
            nodes = catalog.node_count(),
            events = catalog.event_count(),
            "registry snapshot reloaded"
        );
        Ok(std::mem::replace(&mut *current, Arc::new(catalog)))
    }

    pub fn put_node(&self, def: NodeDefinition, overwrite: bool) -> RegistryResult<()> {
        let change = RegistryChange::PutNode(def.node_name.clone());
        self.mutate(change, |catalog| catalog.put_node(def, overwrite))
    }

    pub fn put_event(&self, def: EventDefinition, overwrite: bool) -> RegistryResult<()> {
        let change = RegistryChange::PutEvent {
            event: def.event_name.clone(),
            left: def.left_node_name.clone(),
            right: def.right_node_name.clone(),
        };
        self.mutate(change, |catalog| catalog.put_event(def, overwrite))
    }

    /// Remove a node type and every event type touching it
    pub fn remove_node(&self, node_name: &str) -> RegistryResult<Option<Arc<NodeDefinition>>> {
        let change = RegistryChange::RemoveNode(node_name.to_string());
        self.mutate(change, |catalog| Ok(catalog.remove_node(node_name)))
    }

    pub fn remove_event(
        &self,
        event_name: &str,
        left_node_name: &str,
        right_node_name: &str,
    ) -> RegistryResult<Option<Arc<EventDefinition>>> {
        let change = RegistryChange::RemoveEvent {
            event: event_name.to_string(),
            left: left_node_name.to_string(),
            right: right_node_name.to_string(),
        };
        self.mutate(change, |catalog| {
            Ok(catalog.remove_event(event_name, left_node_name, right_node_name))
        })
    }

    fn mutate<T>(
        &self,
        change: RegistryChange,
        apply: impl FnOnce(&mut Catalog) -> RegistryResult<T>,
    ) -> RegistryResult<T> {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = (**current).clone();
        let result = apply(&mut next)?;
        self.notify(&change, &next)?;
        debug!(
            change = %change,
            nodes = next.node_count(),
            events = next.event_count(),
            "registry snapshot swapped"
        );
        *current = Arc::new(next);
        Ok(result)
    }

    fn notify(&self, change: &RegistryChange, candidate: &Catalog) -> RegistryResult<()> {
        for listener in &self.listeners {
            if let Err(reason) = listener(change, candidate) {
                warn!(change = %change, reason = %reason, "registry change vetoed");
                return Err(RegistryError::Rejected {
                    change: change.to_string(),
                    reason,
                });
            }
        }
        Ok(())
    }
}

impl DefinitionSource for Registry {
    fn node_definition(&self, node_name: &str) -> Option<Arc<NodeDefinition>> {
        self.snapshot().node_definition(node_name)
    }

    fn event_definition(
        &self,
        event_name: &str,
        left_node_name: &str,
        right_node_name: &str,
    ) -> Option<Arc<EventDefinition>> {
        self.snapshot()
            .event_definition(event_name, left_node_name, right_node_name)
    }

    fn events_incident_to(&self, node_name: &str) -> Vec<Arc<EventDefinition>> {
        self.snapshot().events_incident_to(node_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> Catalog {
        let mut catalog = Catalog::new();
        catalog.put_node(NodeDefinition::new("Person"), false).unwrap();
        catalog.put_node(NodeDefinition::new("Car"), false).unwrap();
        catalog
            .put_event(EventDefinition::new("OWNS", "Person", "Car"), false)
            .unwrap();
        catalog
            .put_event(EventDefinition::new("KNOWS", "Person", "Person"), false)
            .unwrap();
        catalog
    }

    #[test]
    fn test_put_node_overwrite_rules() {
        let mut catalog = people();
        assert!(matches!(
            catalog.put_node(NodeDefinition::new("Person"), false),
            Err(RegistryError::NodeExists(name)) if name == "Person"
        ));
        assert!(matches!(
            catalog.put_node(NodeDefinition::new("Boat"), true),
            Err(RegistryError::NodeMissing(name)) if name == "Boat"
        ));
        catalog
            .put_node(NodeDefinition::new("Person").with_unique_index(["name"]), true)
            .unwrap();
        assert_eq!(catalog.node_definition("Person").unwrap().unique_index, vec!["name"]);
    }

    #[test]
    fn test_event_endpoints_must_exist() {
        let mut catalog = people();
        let result = catalog.put_event(EventDefinition::new("SAILS", "Person", "Boat"), false);
        assert!(matches!(
            result,
            Err(RegistryError::UndefinedEndpoint { node, .. }) if node == "Boat"
        ));
    }

    #[test]
    fn test_incident_events() {
        let catalog = people();
        let person: Vec<_> = catalog
            .events_incident_to("Person")
            .iter()
            .map(|d| d.event_name.clone())
            .collect();
        assert_eq!(person, vec!["KNOWS", "OWNS"]);
        assert_eq!(catalog.events_incident_to("Car").len(), 1);
        assert!(catalog.events_incident_to("Boat").is_empty());
    }

    #[test]
    fn test_remove_node_drops_events() {
        let mut catalog = people();
        assert!(catalog.remove_node("Car").is_some());
        assert!(catalog.event_definition("OWNS", "Person", "Car").is_none());
        assert_eq!(catalog.event_count(), 1);
        assert!(catalog.remove_node("Car").is_none());
    }

    #[test]
    fn test_registry_snapshot_isolation() {
        let registry = Registry::new(people());
        let before = registry.snapshot();
        registry.put_node(NodeDefinition::new("Boat"), false).unwrap();

        assert!(before.node_definition("Boat").is_none());
        assert!(registry.node_definition("Boat").is_some());
    }

    #[test]
    fn test_failed_mutation_keeps_snapshot() {
        let registry = Registry::new(people());
        let before = registry.snapshot();
        assert!(registry
            .put_event(EventDefinition::new("SAILS", "Person", "Boat"), false)
            .is_err());
        assert!(Arc::ptr_eq(&before, &registry.snapshot()));
    }

    #[test]
    fn test_document_round_trip() {
        let document = people().to_document();
        let catalog = Catalog::from_document(document).unwrap();
        assert_eq!(catalog.node_count(), 2);
        let def = catalog.event_definition("KNOWS", "Person", "Person").unwrap();
        assert_eq!(def.left_node_name, "Person");
        assert_eq!(def.right_node_name, "Person");
    }

    #[test]
    fn test_listener_veto_keeps_snapshot() {
        let registry = Registry::new(people()).with_listener(|change, candidate| {
            if candidate.node_count() > 2 {
                Err(format!("{} would exceed the node limit", change))
            } else {
                Ok(())
            }
        });
        let before = registry.snapshot();

        let result = registry.put_node(NodeDefinition::new("Boat"), false);
        assert!(matches!(result, Err(RegistryError::Rejected { .. })));
        assert!(Arc::ptr_eq(&before, &registry.snapshot()));

        let removed = registry.remove_event("KNOWS", "Person", "Person").unwrap();
        assert!(removed.is_some());
        assert_eq!(registry.snapshot().event_count(), 1);
    }

    #[test]
    fn test_listeners_run_in_order() {
        use std::sync::Mutex;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let (first, second) = (Arc::clone(&seen), Arc::clone(&seen));
        let registry = Registry::new(people())
            .with_listener(move |change, _| {
                first.lock().unwrap().push(format!("a:{}", change));
                Ok(())
            })
            .with_listener(move |change, _| {
                second.lock().unwrap().push(format!("b:{}", change));
                Ok(())
            });

        registry.reload(Catalog::new()).unwrap();
        assert!(registry.snapshot().is_empty());
        assert_eq!(*seen.lock().unwrap(), vec!["a:reload", "b:reload"]);
    }
}
