//! UXDF graph data model
//!
//! A schema-driven, in-memory graph of typed nodes and typed events with a
//! path expression language over it.
//!
//! # Architecture
//!
//! - [`definition`]: node and event type definitions, held by a reloadable
//!   [`Registry`]
//! - [`graph`]: node and event entities, their identity and uniqueness
//!   fingerprints, and the indexed [`SdData`] store
//! - [`chain`]: relationship chain expressions with wildcard expansion
//! - [`id`]: checksum-verifiable identifier generation
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use uxdf::definition::{Catalog, EventDefinition, NodeDefinition, Registry};
//! use uxdf::graph::{EventEntity, NodeEntity, SdData, SdEntity};
//!
//! let mut catalog = Catalog::new();
//! catalog.put_node(NodeDefinition::new("Person").with_unique_index(["name"]), false).unwrap();
//! catalog.put_node(NodeDefinition::new("Car"), false).unwrap();
//! catalog.put_event(EventDefinition::new("OWNS", "Person", "Car"), false).unwrap();
//!
//! let mut data = SdData::new(Arc::new(Registry::new(catalog)));
//!
//! let alice = NodeEntity::new("Person", "1").with_property("name", "Alice");
//! let car = NodeEntity::new("Car", "7");
//! data.add_node(alice.clone(), false).unwrap();
//! data.add_node(car.clone(), false).unwrap();
//! data.add_event(EventEntity::between("OWNS", "e1", &alice, &car), false).unwrap();
//!
//! assert_eq!(data.incident_events("Person1").len(), 1);
//!
//! let chain = uxdf::chain::parse("Person-*>Car", &**data.registry()).unwrap().unwrap();
//! assert_eq!(chain.alternatives()[0][0].event(), "OWNS");
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod chain;
pub mod definition;
pub mod graph;
pub mod id;

// Re-export main types for convenience
pub use chain::{has_relationship_syntax, parse as parse_chain, Chain, ChainError, ChainItem, ChainPath};
pub use definition::{
    Catalog, DefinitionSource, EventDefinition, NodeDefinition, OperateKind, Registry, RegistryError,
};
pub use graph::{
    EntityError, EventEntity, NodeEntity, PropertyMap, PropertyValue, SdData, SdDataError,
    SdDataResult, SdEntity, SharedSdData, UpdateError, UxdfDocument,
};
pub use id::{IdError, IdMaker};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
