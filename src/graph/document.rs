//! Whole-document exchange form
//!
//! ```json
//! {
//!   "sd":   {"node": {...}, "event": {"E": {"L": {"R": {...}}}}},
//!   "data": {"node": [...], "event": {"E": [...]}}
//! }
//! ```

use super::event::EventEntity;
use super::node::NodeEntity;
use super::store::{SdData, SdDataResult};
use crate::definition::registry::SchemaDocument;
use crate::definition::{Catalog, Registry, RegistryResult};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The `data` section: nodes in order, events grouped by event type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataDocument {
    #[serde(default)]
    pub node: Vec<NodeEntity>,

    #[serde(default)]
    pub event: IndexMap<String, Vec<EventEntity>>,
}

impl DataDocument {
    pub fn is_empty(&self) -> bool {
        self.node.is_empty() && self.event.values().all(Vec::is_empty)
    }
}

/// Schema plus data in one document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UxdfDocument {
    #[serde(default)]
    pub sd: SchemaDocument,

    #[serde(default)]
    pub data: DataDocument,
}

impl UxdfDocument {
    /// Registry holding the document's own schema section
    pub fn registry(&self) -> RegistryResult<Registry> {
        Ok(Registry::new(Catalog::from_document(self.sd.clone())?))
    }

    /// Load the data section into a store bound to the document's schema
    pub fn into_store(self) -> anyhow::Result<SdData> {
        let registry = Arc::new(self.registry()?);
        Ok(SdData::from_document(registry, self.data)?)
    }
}

impl SdData {
    /// Copy of the store's contents, cached fingerprints included
    pub fn to_document(&self) -> DataDocument {
        let node = self.unmodifiable_nodes().into_iter().map(NodeEntity::duplicate).collect();
        let event = self
            .unmodifiable_events()
            .into_iter()
            .map(|(name, events)| {
                let events = events.into_iter().map(EventEntity::duplicate).collect();
                (name.to_string(), events)
            })
            .collect();
        DataDocument { node, event }
    }

    /// Build a store from a data section, nodes first
    ///
    /// Entries that are not effective or repeat a logic id are skipped; a
    /// fingerprint collision fails the whole load.
    pub fn from_document(registry: Arc<Registry>, document: DataDocument) -> SdDataResult<SdData> {
        let mut data = SdData::new(registry);
        data.set_nodes(document.node)?;
        data.set_events(document.event.into_values().flatten())?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SdEntity;

    const DOCUMENT: &str = r#"{
        "sd": {
            "node": {
                "Person": {"uniqueIndex": ["name"]},
                "Car": {}
            },
            "event": {"OWNS": {"Person": {"Car": {"isMember": true}}}}
        },
        "data": {
            "node": [
                {"__sd": "Person", "__id": "1", "name": "ann"},
                {"__sd": "Car", "__id": "7", "plate": "X-1"},
                {"__sd": "Person", "__id": "1", "name": "dup"}
            ],
            "event": {
                "OWNS": [{"__sd": "OWNS", "__id": "e1", "__left": "1", "__leftSd": "Person",
                          "__right": "7", "__rightSd": "Car"}]
            }
        }
    }"#;

    #[test]
    fn test_load_document() {
        let document: UxdfDocument = serde_json::from_str(DOCUMENT).unwrap();
        let data = document.into_store().unwrap();

        assert_eq!(data.node_count(), 2);
        assert_eq!(data.event_count(), 1);
        let owner = data.node_by_logic_id("Person1").unwrap();
        assert_eq!(owner.property("name").and_then(|v| v.as_string()), Some("ann"));
        assert!(data.unmodifiable_events_by_type("OWNS")[0].is_member());
    }

    #[test]
    fn test_document_round_trip_shape() {
        let document: UxdfDocument = serde_json::from_str(DOCUMENT).unwrap();
        let data = document.into_store().unwrap();

        let json = serde_json::to_value(data.to_document()).unwrap();
        assert_eq!(json["node"].as_array().unwrap().len(), 2);
        assert_eq!(json["event"]["OWNS"][0]["__left"], "1");
        assert_eq!(json["event"]["OWNS"][0]["__isMember"], true);
        assert_eq!(json["node"][0]["__uuid"].as_str().map(str::len), Some(64));
        assert_eq!(
            json["node"][0]["__uuid"].as_str(),
            data.node_by_logic_id("Person1").and_then(|node| node.uuid())
        );

        // Detached copies still drop the cached fingerprint.
        assert!(data.detached_nodes()[0].uuid().is_none());
    }
}
