//! Event entities
//!
//! An event is a typed, directed edge from a left node to a right node. Both
//! endpoints are part of its identity: the logic id is the event type, left
//! id, left type, right id and right type followed by the event's own id.

use super::entity::{EntityCore, SdEntity};
use super::node::NodeEntity;
use super::property::PropertyValue;
use crate::definition::{DefinitionSource, EventDefinition};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub const ATTR_LEFT: &str = "__left";
pub const ATTR_LEFT_SD: &str = "__leftSd";
pub const ATTR_RIGHT: &str = "__right";
pub const ATTR_RIGHT_SD: &str = "__rightSd";
pub const ATTR_IS_MEMBER: &str = "__isMember";

/// A directed edge between two nodes
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EventEntity {
    #[serde(rename = "__left", default, skip_serializing_if = "Option::is_none")]
    left: Option<String>,

    #[serde(rename = "__leftSd", default, skip_serializing_if = "Option::is_none")]
    left_sd: Option<String>,

    #[serde(rename = "__right", default, skip_serializing_if = "Option::is_none")]
    right: Option<String>,

    #[serde(rename = "__rightSd", default, skip_serializing_if = "Option::is_none")]
    right_sd: Option<String>,

    /// Stamped from the registry when the event enters a store
    #[serde(rename = "__isMember", default, skip_serializing_if = "Option::is_none")]
    is_member: Option<bool>,

    #[serde(flatten)]
    core: EntityCore,
}

impl EventEntity {
    pub fn new(sd: impl Into<String>, id: impl Into<String>) -> Self {
        EventEntity {
            core: EntityCore::new(sd, id),
            ..Default::default()
        }
    }

    /// Event of type `sd` from `left` to `right`
    pub fn between(
        sd: impl Into<String>,
        id: impl Into<String>,
        left: &NodeEntity,
        right: &NodeEntity,
    ) -> Self {
        let mut event = EventEntity::new(sd, id);
        event.set_left_node(left);
        event.set_right_node(right);
        event
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.set_property(key, value);
        self
    }

    pub fn left(&self) -> Option<&str> {
        self.left.as_deref()
    }

    pub fn left_sd(&self) -> Option<&str> {
        self.left_sd.as_deref()
    }

    pub fn right(&self) -> Option<&str> {
        self.right.as_deref()
    }

    pub fn right_sd(&self) -> Option<&str> {
        self.right_sd.as_deref()
    }

    pub fn set_left(&mut self, id: impl Into<String>, sd: impl Into<String>) {
        self.left = Some(id.into());
        self.left_sd = Some(sd.into());
        self.core.uuid = None;
    }

    pub fn set_right(&mut self, id: impl Into<String>, sd: impl Into<String>) {
        self.right = Some(id.into());
        self.right_sd = Some(sd.into());
        self.core.uuid = None;
    }

    /// Point the left endpoint at `node`
    pub fn set_left_node(&mut self, node: &NodeEntity) {
        self.left = node.id().map(str::to_string);
        self.left_sd = node.sd().map(str::to_string);
        self.core.uuid = None;
    }

    /// Point the right endpoint at `node`
    pub fn set_right_node(&mut self, node: &NodeEntity) {
        self.right = node.id().map(str::to_string);
        self.right_sd = node.sd().map(str::to_string);
        self.core.uuid = None;
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.core.id = Some(id.into());
        self.core.uuid = None;
    }

    /// Logic id of the left node, once the event is effective
    pub fn left_logic_id(&self) -> Option<String> {
        if !self.is_effective() {
            return None;
        }
        Some(format!("{}{}", self.left_sd.as_deref()?, self.left.as_deref()?))
    }

    /// Logic id of the right node, once the event is effective
    pub fn right_logic_id(&self) -> Option<String> {
        if !self.is_effective() {
            return None;
        }
        Some(format!("{}{}", self.right_sd.as_deref()?, self.right.as_deref()?))
    }

    pub fn is_member(&self) -> bool {
        self.is_member.unwrap_or(false)
    }

    pub(crate) fn set_member(&mut self, is_member: bool) {
        self.is_member = Some(is_member);
    }

    /// Definition of this event's type between its endpoint types
    pub fn definition<D: DefinitionSource + ?Sized>(&self, defs: &D) -> Option<Arc<EventDefinition>> {
        defs.event_definition(self.sd()?, self.left_sd()?, self.right_sd()?)
    }

    /// Copy that keeps the cached fingerprint
    pub(crate) fn duplicate(&self) -> Self {
        EventEntity {
            left: self.left.clone(),
            left_sd: self.left_sd.clone(),
            right: self.right.clone(),
            right_sd: self.right_sd.clone(),
            is_member: self.is_member,
            core: self.core.clone(),
        }
    }
}

impl SdEntity for EventEntity {
    const KIND: &'static str = "Event";

    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn base_properties(&self) -> Option<String> {
        let mut base = self.core.sd.clone()?;
        base.push_str(self.left.as_deref()?);
        base.push_str(self.left_sd.as_deref()?);
        base.push_str(self.right.as_deref()?);
        base.push_str(self.right_sd.as_deref()?);
        Some(base)
    }

    fn unique_index<D: DefinitionSource + ?Sized>(&self, defs: &D) -> Vec<String> {
        self.definition(defs)
            .map(|def| def.unique_index.clone())
            .unwrap_or_default()
    }

    fn display_keys<D: DefinitionSource + ?Sized>(&self, defs: &D) -> Vec<String> {
        self.definition(defs)
            .map(|def| def.display.clone())
            .unwrap_or_default()
    }
}

impl Clone for EventEntity {
    fn clone(&self) -> Self {
        let mut event = self.duplicate();
        event.core.uuid = None;
        event
    }
}

impl PartialEq for EventEntity {
    fn eq(&self, other: &Self) -> bool {
        self.logic_key() == other.logic_key()
    }
}

impl Eq for EventEntity {}

impl Hash for EventEntity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.logic_key().hash(state);
    }
}
