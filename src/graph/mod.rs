//! Graph data model and in-memory store
//!
//! - Nodes are typed vertices identified by type name plus instance id
//! - Events are typed, directed edges whose identity includes both endpoints
//! - Properties are free-form JSON values alongside the reserved `__` fields
//! - [`SdData`] indexes both by logic id, fingerprint, event type and adjacency

pub mod document;
pub mod entity;
pub mod event;
pub mod node;
pub mod property;
pub mod store;

// Re-export main types
pub use document::{DataDocument, UxdfDocument};
pub use entity::{fingerprint, Directives, EntityCore, EntityError, EntityResult, SdEntity};
pub use event::EventEntity;
pub use node::NodeEntity;
pub use property::{PropertyMap, PropertyValue};
pub use store::{Lookup, SdData, SdDataError, SdDataResult, SharedSdData, UpdateError};
