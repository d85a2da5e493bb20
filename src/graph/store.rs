//! Indexed in-memory store of nodes and events
//!
//! Index layout:
//! - nodes: logic id -> node (insertion ordered), fingerprint -> logic id
//! - events: logic id -> event (insertion ordered), fingerprint -> logic id
//! - events_by_type: event type -> ordered set of event logic ids
//! - node_events: node logic id -> event logic ids touching it at either end
//!
//! Every mutation either completes across all indices or leaves the store
//! untouched. Removing a node does not remove its events; the adjacency entry
//! stays so the events can still be found from the node's logic id.

use super::entity::{EntityError, SdEntity};
use super::event::EventEntity;
use super::node::NodeEntity;
use crate::definition::{OperateKind, Registry};
use indexmap::{IndexMap, IndexSet};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::{debug, warn};

/// Update precondition failures
#[derive(Error, Debug, PartialEq)]
pub enum UpdateError {
    #[error("Update target is not effective")]
    TargetNotEffective,

    #[error("Update source {0} not found")]
    SourceNotFound(String),

    #[error("Update source id is stale: expected {expected}, store holds {actual}")]
    StaleSourceId { expected: String, actual: String },

    #[error("Update target {0} already exists")]
    TargetExists(String),

    #[error("Update changes type from {existing} to {incoming}")]
    TypeMismatch { existing: String, incoming: String },
}

/// Store errors
#[derive(Error, Debug)]
pub enum SdDataError {
    #[error("{kind} {incoming} has fingerprint {uuid} already held by {existing}")]
    UniquenessViolation {
        kind: &'static str,
        uuid: String,
        existing: String,
        incoming: String,
    },

    #[error(transparent)]
    Update(#[from] UpdateError),

    #[error(transparent)]
    Entity(#[from] EntityError),
}

pub type SdDataResult<T> = Result<T, SdDataError>;

/// Key for [`SdData::compute_node`] and [`SdData::compute_event`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup<'a> {
    LogicId(&'a str),
    Uuid(&'a str),
}

struct RepointedEvent {
    old_logic_id: String,
    logic_id: String,
    event: EventEntity,
}

struct NodeUpdatePlan {
    index: usize,
    logic_id: String,
    target: NodeEntity,
    events: Vec<RepointedEvent>,
}

struct EventUpdatePlan {
    index: usize,
    logic_id: String,
    target: EventEntity,
}

/// In-memory graph of nodes and events
#[derive(Debug)]
pub struct SdData {
    registry: Arc<Registry>,
    nodes: IndexMap<String, NodeEntity>,
    node_uuids: HashMap<String, String>,
    events: IndexMap<String, EventEntity>,
    event_uuids: HashMap<String, String>,
    events_by_type: IndexMap<String, IndexSet<String>>,
    node_events: HashMap<String, IndexSet<String>>,
}

impl SdData {
    pub fn new(registry: Arc<Registry>) -> Self {
        SdData {
            registry,
            nodes: IndexMap::new(),
            node_uuids: HashMap::new(),
            events: IndexMap::new(),
            event_uuids: HashMap::new(),
            events_by_type: IndexMap::new(),
            node_events: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    // ---- nodes ----

    /// Insert a node
    ///
    /// Returns `Ok(false)` without side effects when the node is not
    /// effective, or when `overwrite` is false and its logic id is taken. With
    /// `overwrite` any node at the same logic id is replaced. The fingerprint
    /// is validated before anything is removed.
    pub fn add_node(&mut self, mut node: NodeEntity, overwrite: bool) -> SdDataResult<bool> {
        let Some(logic_id) = node.logic_key() else {
            return Ok(false);
        };
        if !overwrite && self.nodes.contains_key(&logic_id) {
            return Ok(false);
        }

        let defs = self.registry.snapshot();
        let uuid = node.generate_uuid(&*defs)?;
        if let Some(uuid) = &uuid {
            check_fingerprint(&self.node_uuids, NodeEntity::KIND, uuid, &logic_id, &logic_id)?;
        }

        if overwrite {
            self.remove_node_by_logic_id(&logic_id);
        }
        if let Some(uuid) = uuid {
            self.node_uuids.insert(uuid, logic_id.clone());
        }
        debug!(logic_id = %logic_id, overwrite, "added node");
        self.nodes.insert(logic_id, node);
        Ok(true)
    }

    pub fn add_node_if_absent(&mut self, node: NodeEntity) -> SdDataResult<bool> {
        self.add_node(node, false)
    }

    pub fn overwrite_node(&mut self, node: NodeEntity) -> SdDataResult<bool> {
        self.add_node(node, true)
    }

    /// Remove the node with the same logic id as `node`
    pub fn remove_node(&mut self, node: &NodeEntity) -> Option<NodeEntity> {
        self.remove_node_by_logic_id(&node.logic_key()?)
    }

    pub fn remove_node_by_logic_id(&mut self, logic_id: &str) -> Option<NodeEntity> {
        let node = self.nodes.shift_remove(logic_id)?;
        if let Some(uuid) = node.uuid() {
            self.node_uuids.remove(uuid);
        }
        debug!(logic_id, "removed node");
        Some(node)
    }

    pub fn remove_node_by_uuid(&mut self, uuid: &str) -> Option<NodeEntity> {
        let logic_id = self.node_uuids.get(uuid)?.clone();
        self.remove_node_by_logic_id(&logic_id)
    }

    /// Replace the node at `source_logic_id` with `target`
    ///
    /// The node keeps its position. When the logic id changes, every event
    /// touching the node is re-pointed at the new identity and re-keyed.
    /// Any failed precondition leaves the store unchanged. Returns the stored
    /// node; look it up again by its new logic id afterwards.
    pub fn update_node(
        &mut self,
        source_logic_id: &str,
        source_id: &str,
        target: NodeEntity,
    ) -> SdDataResult<&NodeEntity> {
        let plan = self
            .plan_node_update(source_logic_id, source_id, target)
            .inspect_err(|err| warn!(source_logic_id, error = %err, "node update rejected"))?;
        let index = self.apply_node_update(source_logic_id, plan);
        Ok(&self.nodes[index])
    }

    fn plan_node_update(
        &self,
        source_logic_id: &str,
        source_id: &str,
        mut target: NodeEntity,
    ) -> SdDataResult<NodeUpdatePlan> {
        let logic_id = target.logic_key().ok_or(UpdateError::TargetNotEffective)?;
        let (index, _, source) = self
            .nodes
            .get_full(source_logic_id)
            .ok_or_else(|| UpdateError::SourceNotFound(source_logic_id.to_string()))?;
        validate_update(source, &target, source_id, &logic_id, source_logic_id, |key| {
            self.nodes.contains_key(key)
        })?;

        let defs = self.registry.snapshot();
        if let Some(uuid) = target.generate_uuid(&*defs)? {
            check_fingerprint(&self.node_uuids, NodeEntity::KIND, &uuid, source_logic_id, &logic_id)?;
        }

        let mut events = Vec::new();
        if logic_id != source_logic_id {
            let incident: Vec<&String> = self
                .node_events
                .get(source_logic_id)
                .map(|set| set.iter().collect())
                .unwrap_or_default();
            let moving: HashSet<&str> = incident.iter().map(|key| key.as_str()).collect();
            let mut planned: HashSet<String> = HashSet::new();

            for old_logic_id in incident {
                let Some(stored) = self.events.get(old_logic_id) else {
                    continue;
                };
                let mut event = stored.duplicate();
                if event.left_logic_id().as_deref() == Some(source_logic_id) {
                    event.set_left_node(&target);
                }
                if event.right_logic_id().as_deref() == Some(source_logic_id) {
                    event.set_right_node(&target);
                }

                let event_logic_id = event.logic_id()?;
                if self.events.contains_key(&event_logic_id)
                    && !moving.contains(event_logic_id.as_str())
                {
                    return Err(UpdateError::TargetExists(event_logic_id).into());
                }
                if let Some(uuid) = event.generate_uuid(&*defs)? {
                    let held_elsewhere = self
                        .event_uuids
                        .get(&uuid)
                        .filter(|holder| !moving.contains(holder.as_str()));
                    if let Some(existing) = held_elsewhere {
                        return Err(violation(EventEntity::KIND, &uuid, existing, &event_logic_id));
                    }
                    if !planned.insert(uuid.clone()) {
                        return Err(violation(EventEntity::KIND, &uuid, old_logic_id, &event_logic_id));
                    }
                }

                events.push(RepointedEvent {
                    old_logic_id: old_logic_id.clone(),
                    logic_id: event_logic_id,
                    event,
                });
            }
        }

        Ok(NodeUpdatePlan {
            index,
            logic_id,
            target,
            events,
        })
    }

    fn apply_node_update(&mut self, source_logic_id: &str, plan: NodeUpdatePlan) -> usize {
        let NodeUpdatePlan {
            index,
            logic_id,
            target,
            events,
        } = plan;

        if let Some((_, source)) = self.nodes.shift_remove_index(index) {
            if let Some(uuid) = source.uuid() {
                self.node_uuids.remove(uuid);
            }
        }
        if let Some(uuid) = target.uuid() {
            self.node_uuids.insert(uuid.to_string(), logic_id.clone());
        }
        self.nodes.shift_insert(index, logic_id.clone(), target);

        if logic_id != source_logic_id {
            self.node_events.remove(source_logic_id);
            let mut slots: Vec<(usize, RepointedEvent)> = events
                .into_iter()
                .filter_map(|moved| {
                    let slot = self.events.get_index_of(&moved.old_logic_id)?;
                    Some((slot, moved))
                })
                .collect();

            // Pull every moving event out before re-inserting so a new key can
            // never land on an entry that is about to move.
            slots.sort_by(|a, b| b.0.cmp(&a.0));
            for (slot, moved) in &slots {
                if let Some((_, old)) = self.events.shift_remove_index(*slot) {
                    self.relink_event(&old, &moved.old_logic_id, &moved.logic_id, source_logic_id);
                }
            }

            slots.reverse();
            let adjacency = self.node_events.entry(logic_id.clone()).or_default();
            for (_, moved) in &slots {
                adjacency.insert(moved.logic_id.clone());
            }
            for (slot, moved) in slots {
                if let Some(uuid) = moved.event.uuid() {
                    self.event_uuids.insert(uuid.to_string(), moved.logic_id.clone());
                }
                self.events.shift_insert(slot, moved.logic_id, moved.event);
            }
        }

        debug!(
            from = source_logic_id,
            to = %logic_id,
            "updated node"
        );
        index
    }

    /// Move the secondary index entries of a re-pointed event to its new key
    fn relink_event(&mut self, old: &EventEntity, old_logic_id: &str, logic_id: &str, moved_node: &str) {
        if let Some(uuid) = old.uuid() {
            self.event_uuids.remove(uuid);
        }
        if let Some(set) = old.sd().and_then(|sd| self.events_by_type.get_mut(sd)) {
            replace_member(set, old_logic_id, logic_id.to_string());
        }
        for endpoint in endpoints(old) {
            if endpoint == moved_node {
                continue;
            }
            if let Some(set) = self.node_events.get_mut(&endpoint) {
                replace_member(set, old_logic_id, logic_id.to_string());
            }
        }
    }

    pub fn get_node(&self, node: &NodeEntity) -> Option<&NodeEntity> {
        self.nodes.get(&node.logic_key()?)
    }

    pub fn node_by_logic_id(&self, logic_id: &str) -> Option<&NodeEntity> {
        self.nodes.get(logic_id)
    }

    pub fn node_by_uuid(&self, uuid: &str) -> Option<&NodeEntity> {
        self.nodes.get(self.node_uuids.get(uuid)?)
    }

    pub fn contains_node(&self, node: &NodeEntity) -> bool {
        node.logic_key()
            .is_some_and(|logic_id| self.nodes.contains_key(&logic_id))
    }

    pub fn contains_node_uuid(&self, uuid: &str) -> bool {
        self.node_uuids.contains_key(uuid)
    }

    pub fn clear_nodes(&mut self) {
        self.nodes.clear();
        self.node_uuids.clear();
    }

    /// Replace all nodes, skipping entries that are not effective
    pub fn set_nodes(&mut self, nodes: impl IntoIterator<Item = NodeEntity>) -> SdDataResult<()> {
        self.clear_nodes();
        for node in nodes {
            self.add_node_if_absent(node)?;
        }
        Ok(())
    }

    /// Read-modify-write of one node
    ///
    /// `f` sees the current node, if any. Returning a node overwrites the
    /// store's copy; returning `None` removes the key.
    pub fn compute_node<F>(&mut self, key: Lookup<'_>, f: F) -> SdDataResult<()>
    where
        F: FnOnce(Option<&NodeEntity>) -> Option<NodeEntity>,
    {
        let existing = match key {
            Lookup::LogicId(logic_id) => self.nodes.get(logic_id),
            Lookup::Uuid(uuid) => self.node_by_uuid(uuid),
        };
        match f(existing) {
            Some(node) => {
                self.overwrite_node(node)?;
            }
            None => {
                match key {
                    Lookup::LogicId(logic_id) => self.remove_node_by_logic_id(logic_id),
                    Lookup::Uuid(uuid) => self.remove_node_by_uuid(uuid),
                };
            }
        }
        Ok(())
    }

    /// Copies of every node
    pub fn detached_nodes(&self) -> Vec<NodeEntity> {
        self.nodes.values().cloned().collect()
    }

    /// Copies of the stored endpoints of `event`
    pub fn detached_nodes_of_event(&self, event: &EventEntity) -> Vec<NodeEntity> {
        let (Some(left), Some(right)) = (event.left_logic_id(), event.right_logic_id()) else {
            return Vec::new();
        };
        let mut nodes: Vec<NodeEntity> = self.nodes.get(&left).cloned().into_iter().collect();
        if right != left {
            nodes.extend(self.nodes.get(&right).cloned());
        }
        nodes
    }

    /// Borrowed view of every node, in insertion order
    pub fn unmodifiable_nodes(&self) -> Vec<&NodeEntity> {
        self.nodes.values().collect()
    }

    // ---- events ----

    /// Insert an event
    ///
    /// Same contract as [`SdData::add_node`]. The event is stamped with the
    /// membership flag of its definition and registered under both endpoints.
    pub fn add_event(&mut self, mut event: EventEntity, overwrite: bool) -> SdDataResult<bool> {
        let Some(logic_id) = event.logic_key() else {
            return Ok(false);
        };
        if !overwrite && self.events.contains_key(&logic_id) {
            return Ok(false);
        }

        let defs = self.registry.snapshot();
        let uuid = event.generate_uuid(&*defs)?;
        if let Some(uuid) = &uuid {
            check_fingerprint(&self.event_uuids, EventEntity::KIND, uuid, &logic_id, &logic_id)?;
        }
        let is_member = event
            .definition(&*defs)
            .is_some_and(|def| def.is_member);
        event.set_member(is_member);

        if overwrite {
            self.remove_event_by_logic_id(&logic_id);
        }
        self.index_event(&logic_id, &event);
        debug!(logic_id = %logic_id, overwrite, "added event");
        self.events.insert(logic_id, event);
        Ok(true)
    }

    pub fn add_event_if_absent(&mut self, event: EventEntity) -> SdDataResult<bool> {
        self.add_event(event, false)
    }

    pub fn overwrite_event(&mut self, event: EventEntity) -> SdDataResult<bool> {
        self.add_event(event, true)
    }

    pub fn remove_event(&mut self, event: &EventEntity) -> Option<EventEntity> {
        self.remove_event_by_logic_id(&event.logic_key()?)
    }

    pub fn remove_event_by_logic_id(&mut self, logic_id: &str) -> Option<EventEntity> {
        let event = self.events.shift_remove(logic_id)?;
        self.unindex_event(logic_id, &event);
        debug!(logic_id, "removed event");
        Some(event)
    }

    pub fn remove_event_by_uuid(&mut self, uuid: &str) -> Option<EventEntity> {
        let logic_id = self.event_uuids.get(uuid)?.clone();
        self.remove_event_by_logic_id(&logic_id)
    }

    /// Replace the event at `source_logic_id` with `target`
    ///
    /// The target may connect different nodes; adjacency follows its
    /// endpoints. Same all-or-nothing contract as [`SdData::update_node`].
    pub fn update_event(
        &mut self,
        source_logic_id: &str,
        source_id: &str,
        target: EventEntity,
    ) -> SdDataResult<&EventEntity> {
        let plan = self
            .plan_event_update(source_logic_id, source_id, target)
            .inspect_err(|err| warn!(source_logic_id, error = %err, "event update rejected"))?;
        let index = self.apply_event_update(source_logic_id, plan);
        Ok(&self.events[index])
    }

    fn plan_event_update(
        &self,
        source_logic_id: &str,
        source_id: &str,
        mut target: EventEntity,
    ) -> SdDataResult<EventUpdatePlan> {
        let logic_id = target.logic_key().ok_or(UpdateError::TargetNotEffective)?;
        let (index, _, source) = self
            .events
            .get_full(source_logic_id)
            .ok_or_else(|| UpdateError::SourceNotFound(source_logic_id.to_string()))?;
        validate_update(source, &target, source_id, &logic_id, source_logic_id, |key| {
            self.events.contains_key(key)
        })?;

        let defs = self.registry.snapshot();
        if let Some(uuid) = target.generate_uuid(&*defs)? {
            check_fingerprint(&self.event_uuids, EventEntity::KIND, &uuid, source_logic_id, &logic_id)?;
        }
        let is_member = target
            .definition(&*defs)
            .is_some_and(|def| def.is_member);
        target.set_member(is_member);

        Ok(EventUpdatePlan {
            index,
            logic_id,
            target,
        })
    }

    fn apply_event_update(&mut self, source_logic_id: &str, plan: EventUpdatePlan) -> usize {
        let EventUpdatePlan {
            index,
            logic_id,
            target,
        } = plan;

        if let Some((_, source)) = self.events.shift_remove_index(index) {
            if let Some(uuid) = source.uuid() {
                self.event_uuids.remove(uuid);
            }
            for endpoint in endpoints(&source) {
                detach(&mut self.node_events, &endpoint, source_logic_id);
            }
            if let Some(set) = source.sd().and_then(|sd| self.events_by_type.get_mut(sd)) {
                replace_member(set, source_logic_id, logic_id.clone());
            }
        }

        if let Some(uuid) = target.uuid() {
            self.event_uuids.insert(uuid.to_string(), logic_id.clone());
        }
        for endpoint in endpoints(&target) {
            self.node_events
                .entry(endpoint)
                .or_default()
                .insert(logic_id.clone());
        }
        debug!(from = source_logic_id, to = %logic_id, "updated event");
        self.events.shift_insert(index, logic_id, target);
        index
    }

    fn index_event(&mut self, logic_id: &str, event: &EventEntity) {
        if let Some(uuid) = event.uuid() {
            self.event_uuids
                .insert(uuid.to_string(), logic_id.to_string());
        }
        if let Some(sd) = event.sd() {
            self.events_by_type
                .entry(sd.to_string())
                .or_default()
                .insert(logic_id.to_string());
        }
        for endpoint in endpoints(event) {
            self.node_events
                .entry(endpoint)
                .or_default()
                .insert(logic_id.to_string());
        }
    }

    fn unindex_event(&mut self, logic_id: &str, event: &EventEntity) {
        if let Some(uuid) = event.uuid() {
            self.event_uuids.remove(uuid);
        }
        if let Some(sd) = event.sd() {
            if let Some(set) = self.events_by_type.get_mut(sd) {
                set.shift_remove(logic_id);
                if set.is_empty() {
                    self.events_by_type.shift_remove(sd);
                }
            }
        }
        for endpoint in endpoints(event) {
            detach(&mut self.node_events, &endpoint, logic_id);
        }
    }

    pub fn get_event(&self, event: &EventEntity) -> Option<&EventEntity> {
        self.events.get(&event.logic_key()?)
    }

    pub fn event_by_logic_id(&self, logic_id: &str) -> Option<&EventEntity> {
        self.events.get(logic_id)
    }

    pub fn event_by_uuid(&self, uuid: &str) -> Option<&EventEntity> {
        self.events.get(self.event_uuids.get(uuid)?)
    }

    pub fn contains_event(&self, event: &EventEntity) -> bool {
        event
            .logic_key()
            .is_some_and(|logic_id| self.events.contains_key(&logic_id))
    }

    pub fn contains_event_uuid(&self, uuid: &str) -> bool {
        self.event_uuids.contains_key(uuid)
    }

    pub fn contains_event_type(&self, event_name: &str) -> bool {
        self.events_by_type.contains_key(event_name)
    }

    /// Events touching the node with `node_logic_id` at either end
    pub fn incident_events(&self, node_logic_id: &str) -> Vec<&EventEntity> {
        self.node_events
            .get(node_logic_id)
            .map(|set| set.iter().filter_map(|key| self.events.get(key)).collect())
            .unwrap_or_default()
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
        self.event_uuids.clear();
        self.events_by_type.clear();
        self.node_events.clear();
    }

    /// Replace all events, skipping entries that are not effective
    pub fn set_events(&mut self, events: impl IntoIterator<Item = EventEntity>) -> SdDataResult<()> {
        self.clear_events();
        for event in events {
            self.add_event_if_absent(event)?;
        }
        Ok(())
    }

    /// Read-modify-write of one event, see [`SdData::compute_node`]
    pub fn compute_event<F>(&mut self, key: Lookup<'_>, f: F) -> SdDataResult<()>
    where
        F: FnOnce(Option<&EventEntity>) -> Option<EventEntity>,
    {
        let existing = match key {
            Lookup::LogicId(logic_id) => self.events.get(logic_id),
            Lookup::Uuid(uuid) => self.event_by_uuid(uuid),
        };
        match f(existing) {
            Some(event) => {
                self.overwrite_event(event)?;
            }
            None => {
                match key {
                    Lookup::LogicId(logic_id) => self.remove_event_by_logic_id(logic_id),
                    Lookup::Uuid(uuid) => self.remove_event_by_uuid(uuid),
                };
            }
        }
        Ok(())
    }

    /// Copies of every event grouped by event type
    pub fn detached_events(&self) -> IndexMap<String, Vec<EventEntity>> {
        self.events_by_type
            .iter()
            .map(|(name, keys)| {
                let events = keys
                    .iter()
                    .filter_map(|key| self.events.get(key))
                    .cloned()
                    .collect();
                (name.clone(), events)
            })
            .collect()
    }

    pub fn detached_events_by_type(&self, event_name: &str) -> Vec<EventEntity> {
        self.unmodifiable_events_by_type(event_name)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Copies of the events touching `node`
    pub fn detached_events_of_node(&self, node: &NodeEntity) -> Vec<EventEntity> {
        node.logic_key()
            .map(|logic_id| self.incident_events(&logic_id).into_iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Borrowed view of every event grouped by event type
    pub fn unmodifiable_events(&self) -> IndexMap<&str, Vec<&EventEntity>> {
        self.events_by_type
            .iter()
            .map(|(name, keys)| {
                let events = keys.iter().filter_map(|key| self.events.get(key)).collect();
                (name.as_str(), events)
            })
            .collect()
    }

    pub fn unmodifiable_events_by_type(&self, event_name: &str) -> Vec<&EventEntity> {
        self.events_by_type
            .get(event_name)
            .map(|keys| keys.iter().filter_map(|key| self.events.get(key)).collect())
            .unwrap_or_default()
    }

    // ---- whole store ----

    /// Add every node and then every event of `other` that is not already held
    pub fn merge(&mut self, other: &SdData) -> SdDataResult<()> {
        for node in other.nodes.values() {
            self.add_node_if_absent(node.clone())?;
        }
        for event in other.events.values() {
            self.add_event_if_absent(event.clone())?;
        }
        Ok(())
    }

    /// Stamp every held entity with `operate`
    pub fn set_operate(&mut self, operate: OperateKind) {
        for node in self.nodes.values_mut() {
            node.set_operate(operate);
        }
        for event in self.events.values_mut() {
            event.set_operate(operate);
        }
    }

    pub fn clear(&mut self) {
        self.clear_nodes();
        self.clear_events();
    }

    pub fn is_empty(&self) -> bool {
        self.is_node_empty() && self.is_event_empty()
    }

    pub fn is_node_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn is_event_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

/// Deep copy of every entity and index; cost grows with the whole graph
impl Clone for SdData {
    fn clone(&self) -> Self {
        SdData {
            registry: Arc::clone(&self.registry),
            nodes: self
                .nodes
                .iter()
                .map(|(key, node)| (key.clone(), node.duplicate()))
                .collect(),
            node_uuids: self.node_uuids.clone(),
            events: self
                .events
                .iter()
                .map(|(key, event)| (key.clone(), event.duplicate()))
                .collect(),
            event_uuids: self.event_uuids.clone(),
            events_by_type: self.events_by_type.clone(),
            node_events: self.node_events.clone(),
        }
    }
}

/// [`SdData`] behind one store-wide read-write lock
///
/// Writers are serialized; readers share the lock and see whatever the last
/// completed writer left.
#[derive(Debug, Clone)]
pub struct SharedSdData {
    inner: Arc<RwLock<SdData>>,
}

impl SharedSdData {
    pub fn new(data: SdData) -> Self {
        SharedSdData {
            inner: Arc::new(RwLock::new(data)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, SdData> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, SdData> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn validate_update<E: SdEntity>(
    source: &E,
    target: &E,
    source_id: &str,
    logic_id: &str,
    source_logic_id: &str,
    exists: impl Fn(&str) -> bool,
) -> Result<(), UpdateError> {
    if source.id() != Some(source_id) {
        return Err(UpdateError::StaleSourceId {
            expected: source_id.to_string(),
            actual: source.id().unwrap_or_default().to_string(),
        });
    }
    if logic_id != source_logic_id && exists(logic_id) {
        return Err(UpdateError::TargetExists(logic_id.to_string()));
    }
    if source.sd() != target.sd() {
        return Err(UpdateError::TypeMismatch {
            existing: source.sd().unwrap_or_default().to_string(),
            incoming: target.sd().unwrap_or_default().to_string(),
        });
    }
    Ok(())
}

/// Fail unless `uuid` is free or already held by `owner`
fn check_fingerprint(
    index: &HashMap<String, String>,
    kind: &'static str,
    uuid: &str,
    owner: &str,
    incoming: &str,
) -> SdDataResult<()> {
    match index.get(uuid) {
        Some(existing) if existing != owner => Err(violation(kind, uuid, existing, incoming)),
        _ => Ok(()),
    }
}

fn violation(kind: &'static str, uuid: &str, existing: &str, incoming: &str) -> SdDataError {
    warn!(kind, uuid, existing, incoming, "uniqueness violation");
    SdDataError::UniquenessViolation {
        kind,
        uuid: uuid.to_string(),
        existing: existing.to_string(),
        incoming: incoming.to_string(),
    }
}

fn endpoints(event: &EventEntity) -> Vec<String> {
    event
        .left_logic_id()
        .into_iter()
        .chain(event.right_logic_id())
        .collect()
}

fn detach(adjacency: &mut HashMap<String, IndexSet<String>>, node_logic_id: &str, logic_id: &str) {
    if let Some(set) = adjacency.get_mut(node_logic_id) {
        set.shift_remove(logic_id);
        if set.is_empty() {
            adjacency.remove(node_logic_id);
        }
    }
}

/// Swap `old` for `new` keeping its position
fn replace_member(set: &mut IndexSet<String>, old: &str, new: String) {
    match set.get_index_of(old) {
        Some(index) => {
            set.shift_remove_index(index);
            set.shift_insert(index, new);
        }
        None => {
            set.insert(new);
        }
    }
}
