//! Shared entity record and identity rules
//!
//! Reserved fields live in typed slots of [`EntityCore`]; everything else is a
//! custom property. Both are merged into one flat JSON object at the
//! serialization boundary, with reserved keys carrying a `__` prefix and
//! operation directives a `$` prefix.

use super::property::{PropertyMap, PropertyValue};
use crate::chain::{associate, has_relationship_syntax, ChainError};
use crate::definition::{DataAuthority, DefinitionSource, OperateKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::trace;

pub const ATTR_ID: &str = "__id";
pub const ATTR_UUID: &str = "__uuid";
pub const ATTR_SD: &str = "__sd";
pub const ATTR_CREATE_TIME: &str = "__createTime";
pub const ATTR_UPDATE_TIME: &str = "__updateTime";

/// Entity errors
#[derive(Error, Debug)]
pub enum EntityError {
    #[error("{kind} is not effective: {logic_hint}")]
    NotEffective {
        kind: &'static str,
        logic_hint: String,
    },

    #[error("Associative unique property: {0}")]
    Chain(#[from] ChainError),
}

pub type EntityResult<T> = Result<T, EntityError>;

/// Non-persisted instructions for downstream persistence adapters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Directives {
    #[serde(rename = "$operate", default, skip_serializing_if = "Option::is_none")]
    pub operate: Option<OperateKind>,

    #[serde(
        rename = "$operate_delete_enforce",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub delete_enforce: Option<bool>,

    #[serde(
        rename = "$operate_create_original_id",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub create_original_id: Option<bool>,

    #[serde(rename = "$authority", default, skip_serializing_if = "Option::is_none")]
    pub authority: Option<DataAuthority>,

    #[serde(rename = "$syncLock", default, skip_serializing_if = "Option::is_none")]
    pub sync_lock: Option<bool>,
}

impl Directives {
    pub fn is_empty(&self) -> bool {
        *self == Directives::default()
    }
}

/// Fields shared by nodes and events
///
/// `directives` is declared before `properties` so `$` keys are claimed by
/// the directive slots before the catch-all property map sees them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityCore {
    #[serde(rename = "__id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "__uuid", default, skip_serializing_if = "Option::is_none")]
    pub(crate) uuid: Option<String>,

    #[serde(rename = "__sd", default, skip_serializing_if = "Option::is_none")]
    pub sd: Option<String>,

    #[serde(rename = "__createTime", default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,

    #[serde(rename = "__updateTime", default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub directives: Directives,

    #[serde(flatten)]
    pub properties: PropertyMap,
}

impl EntityCore {
    pub fn new(sd: impl Into<String>, id: impl Into<String>) -> Self {
        EntityCore {
            id: Some(id.into()),
            sd: Some(sd.into()),
            ..Default::default()
        }
    }

    /// Copy without the cached fingerprint
    pub(crate) fn without_uuid(&self) -> Self {
        EntityCore {
            uuid: None,
            ..self.clone()
        }
    }
}

/// Behaviour shared by [`NodeEntity`](super::NodeEntity) and
/// [`EventEntity`](super::EventEntity)
pub trait SdEntity {
    /// Entity kind used in error messages
    const KIND: &'static str;

    fn core(&self) -> &EntityCore;

    fn core_mut(&mut self) -> &mut EntityCore;

    /// Identity text preceding the instance id, `None` while incomplete
    fn base_properties(&self) -> Option<String>;

    /// Unique index declared for this entity's type, empty when undeclared
    fn unique_index<D: DefinitionSource + ?Sized>(&self, defs: &D) -> Vec<String>;

    /// Display properties declared for this entity's type
    fn display_keys<D: DefinitionSource + ?Sized>(&self, defs: &D) -> Vec<String>;

    fn id(&self) -> Option<&str> {
        self.core().id.as_deref()
    }

    fn sd(&self) -> Option<&str> {
        self.core().sd.as_deref()
    }

    fn is_effective(&self) -> bool {
        self.core().id.is_some() && self.base_properties().is_some()
    }

    /// Per-type natural key: base properties followed by the id
    fn logic_key(&self) -> Option<String> {
        let mut key = self.base_properties()?;
        key.push_str(self.core().id.as_deref()?);
        Some(key)
    }

    fn logic_id(&self) -> EntityResult<String> {
        self.logic_key().ok_or_else(|| self.not_effective())
    }

    /// Cached fingerprint, if one has been computed
    fn uuid(&self) -> Option<&str> {
        self.core().uuid.as_deref()
    }

    /// Compute and cache the uniqueness fingerprint
    ///
    /// `Ok(None)` means indeterminate: a unique-index value is missing and
    /// cannot be derived through an associative unique property.
    fn generate_uuid<D: DefinitionSource + ?Sized>(
        &mut self,
        defs: &D,
    ) -> EntityResult<Option<String>> {
        let uuid = self.compute_uuid(defs)?;
        self.core_mut().uuid = uuid.clone();
        Ok(uuid)
    }

    /// Cached fingerprint, computed on first use
    fn resolve_uuid<D: DefinitionSource + ?Sized>(
        &mut self,
        defs: &D,
    ) -> EntityResult<Option<String>> {
        match &self.core().uuid {
            Some(uuid) => Ok(Some(uuid.clone())),
            None => self.generate_uuid(defs),
        }
    }

    /// Fingerprint without touching the cache
    fn compute_uuid<D: DefinitionSource + ?Sized>(&self, defs: &D) -> EntityResult<Option<String>> {
        let mut text = match (self.base_properties(), self.id()) {
            (Some(base), Some(_)) => base,
            _ => return Err(self.not_effective()),
        };

        let unique_index = self.unique_index(defs);
        if unique_index.is_empty() {
            text.push_str(self.id().unwrap_or_default());
        } else {
            let mut associated: Option<Option<String>> = None;
            for index in &unique_index {
                let value = match self.property(index) {
                    Some(value) => value,
                    None if has_relationship_syntax(index) => {
                        if associated.is_none() {
                            associated =
                                Some(associate::associate_property_name(&unique_index, defs)?);
                        }
                        let Some(Some(name)) = &associated else {
                            return Ok(None);
                        };
                        match self.property(name) {
                            Some(value) => value,
                            None => return Ok(None),
                        }
                    }
                    None => return Ok(None),
                };
                text.push_str(&value.fingerprint_text());
            }
        }

        trace!(kind = Self::KIND, text = %text, "fingerprint input");
        Ok(Some(fingerprint(&text)))
    }

    fn properties(&self) -> &PropertyMap {
        &self.core().properties
    }

    fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.core().properties.get(key)
    }

    /// Set a custom property, invalidating the cached fingerprint
    fn set_property(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        let core = self.core_mut();
        core.properties.insert(key.into(), value.into());
        core.uuid = None;
    }

    fn remove_property(&mut self, key: &str) -> Option<PropertyValue> {
        let core = self.core_mut();
        core.uuid = None;
        core.properties.shift_remove(key)
    }

    /// Apply another entity's custom properties onto this one
    ///
    /// Identity fields, timestamps, endpoints and directives are never copied.
    fn merge<E: SdEntity>(&mut self, other: &E) {
        let core = self.core_mut();
        for (key, value) in other.properties() {
            core.properties.insert(key.clone(), value.clone());
        }
        core.uuid = None;
    }

    /// Concatenated values of the type's display properties
    fn display<D: DefinitionSource + ?Sized>(&self, defs: &D) -> String {
        self.display_keys(defs)
            .iter()
            .map(|key| {
                self.property(key)
                    .map(PropertyValue::fingerprint_text)
                    .unwrap_or_else(|| "null".to_string())
            })
            .collect()
    }

    fn operate(&self) -> Option<OperateKind> {
        self.core().directives.operate
    }

    fn set_operate(&mut self, operate: OperateKind) {
        self.core_mut().directives.operate = Some(operate);
    }

    fn is_delete_enforce(&self) -> bool {
        self.core().directives.delete_enforce.unwrap_or(false)
    }

    fn is_create_original_id(&self) -> bool {
        self.core().directives.create_original_id.unwrap_or(false)
    }

    /// Drop every non-persisted directive
    fn remove_directives(&mut self) {
        self.core_mut().directives = Directives::default();
    }

    fn not_effective(&self) -> EntityError {
        EntityError::NotEffective {
            kind: Self::KIND,
            logic_hint: format!(
                "sd={} id={}",
                self.sd().unwrap_or("?"),
                self.id().unwrap_or("?")
            ),
        }
    }
}

/// Uppercase hex SHA-256 of `text`
pub fn fingerprint(text: &str) -> String {
    format!("{:X}", Sha256::digest(text.as_bytes()))
}
