//! Per-record attribute store.
//!
//! An `AttributeStore` holds the dynamic attributes of exactly one host
//! record as a JSON object. All operations are in-memory; persistence is
//! cascaded from the host's save.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Polymorphic back-reference from a store to its host record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerRef {
    /// Type discriminator (`modelable_type`).
    pub owner_type: String,
    /// Host identifier (`modelable_id`).
    pub owner_id: String,
}

impl OwnerRef {
    pub fn new(owner_type: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            owner_type: owner_type.into(),
            owner_id: owner_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AttributeStore {
    /// Assigned by the backend on first insert.
    pub id: Option<String>,
    /// `None` while the host itself has not been persisted yet.
    pub owner: Option<OwnerRef>,
    attributes: Map<String, Value>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    #[serde(skip)]
    dirty: bool,
}

impl AttributeStore {
    /// A store not yet attached to any persisted host.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn for_owner(owner: OwnerRef) -> Self {
        Self {
            owner: Some(owner),
            ..Self::default()
        }
    }

    /// Rebuilds a store from its persisted columns.
    pub fn from_parts(
        id: String,
        owner: OwnerRef,
        attributes: Map<String, Value>,
        created_at: String,
        updated_at: String,
    ) -> Self {
        Self {
            id: Some(id),
            owner: Some(owner),
            attributes,
            created_at: Some(created_at),
            updated_at: Some(updated_at),
            dirty: false,
        }
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// Inserts or overwrites `key`. Nothing is written until the host saves.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
        self.dirty = true;
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.set(key, value);
    }

    /// Removes `key`; absent keys are a no-op.
    pub fn unset(&mut self, key: &str) -> Option<Value> {
        let removed = self.attributes.remove(key);
        if removed.is_some() {
            self.dirty = true;
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// True when the in-memory mapping differs from what was last loaded or saved.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn attach(&mut self, owner: OwnerRef) {
        self.owner = Some(owner);
    }

    pub(crate) fn mark_saved(&mut self, id: String, created_at: String, updated_at: String) {
        self.id = Some(id);
        self.created_at = Some(created_at);
        self.updated_at = Some(updated_at);
        self.dirty = false;
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.attributes)
    }
}
