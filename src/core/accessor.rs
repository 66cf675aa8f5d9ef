//! Attribute routing and store lifecycle for host records.
//!
//! A host type embeds an [`EntityAttributes`] and implements
//! [`HasEntityAttributes`]; the provided methods then route every read and
//! write either to the host's fixed columns or to its attribute store.
//!
//! Binding states:
//! - `Unbound`: nothing loaded yet.
//! - `Missing`: the load hook ran and the host has no store row.
//! - `Bound`: a store is held in memory (loaded, created, or pending insert).
//!
//! A store is created lazily on the first dynamic access. Saving cascades
//! to the store when one is bound and is a no-op for it otherwise.

use crate::core::attribute_store::AttributeStore;
use crate::core::config::EavConfig;
use crate::core::error::EavError;
use crate::core::host::{HostRecord, NativeRoute};
use crate::core::ports::StorageBackend;
use crate::core::schema_cache::SchemaColumnCache;
use mockable::{Clock, DefaultClock};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Shared collaborators for every host record: the storage backend and the
/// process-wide schema cache. Build one at startup and pass it around.
#[derive(Clone)]
pub struct Eav {
    backend: Arc<dyn StorageBackend>,
    schema: Arc<SchemaColumnCache>,
}

impl Eav {
    pub fn new<B: StorageBackend + 'static>(backend: Arc<B>, config: &EavConfig) -> Self {
        Self::with_clock(backend, config, Arc::new(DefaultClock))
    }

    pub fn with_clock<B: StorageBackend + 'static>(
        backend: Arc<B>,
        config: &EavConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let schema = SchemaColumnCache::new(backend.clone(), clock, config.schema_cache_ttl());
        Self {
            backend,
            schema: Arc::new(schema),
        }
    }

    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }

    pub fn schema(&self) -> &SchemaColumnCache {
        &self.schema
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum StoreBinding {
    #[default]
    Unbound,
    Missing,
    Bound(AttributeStore),
}

/// Where a write ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteRoute {
    Native(NativeRoute),
    Column,
    Dynamic,
}

/// Per-instance attribute state embedded in a host record.
#[derive(Debug, Clone, Default)]
pub struct EntityAttributes {
    binding: StoreBinding,
}

impl EntityAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn binding(&self) -> &StoreBinding {
        &self.binding
    }

    pub fn store(&self) -> Option<&AttributeStore> {
        match &self.binding {
            StoreBinding::Bound(store) => Some(store),
            _ => None,
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self.binding, StoreBinding::Bound(_))
    }

    fn ensure_bound<F>(&mut self, load: F) -> Result<&mut AttributeStore, EavError>
    where
        F: FnOnce(&StoreBinding) -> Result<AttributeStore, EavError>,
    {
        if !self.is_bound() {
            let store = load(&self.binding)?;
            self.binding = StoreBinding::Bound(store);
        }
        match &mut self.binding {
            StoreBinding::Bound(store) => Ok(store),
            _ => Err(EavError::ValidationError(
                "attribute store binding lost".to_string(),
            )),
        }
    }
}

pub trait HasEntityAttributes: HostRecord + Sized {
    fn entity_attributes(&self) -> &EntityAttributes;

    fn entity_attributes_mut(&mut self) -> &mut EntityAttributes;

    fn attribute_store(&self) -> Option<&AttributeStore> {
        self.entity_attributes().store()
    }

    /// Load hook: run whenever the host is materialised from storage.
    fn retrieved(&mut self, eav: &Eav) -> Result<(), EavError> {
        let Some(owner) = self.owner_ref() else {
            return Ok(());
        };
        let binding = match eav.backend().find_attribute_store(&owner)? {
            Some(store) => StoreBinding::Bound(store),
            None => StoreBinding::Missing,
        };
        debug!(
            owner_type = %owner.owner_type,
            owner_id = %owner.owner_id,
            bound = matches!(binding, StoreBinding::Bound(_)),
            "attribute store loaded with host"
        );
        self.entity_attributes_mut().binding = binding;
        Ok(())
    }

    /// The host's store, loading or creating it on first use. A host that has
    /// not been saved yet gets a detached store, inserted on save.
    fn bind_attribute_store(&mut self, eav: &Eav) -> Result<&mut AttributeStore, EavError> {
        let owner = self.owner_ref();
        self.entity_attributes_mut()
            .ensure_bound(|binding| match (owner, binding) {
                (Some(owner), StoreBinding::Unbound) => {
                    match eav.backend().find_attribute_store(&owner)? {
                        Some(store) => Ok(store),
                        None => eav.backend().create_attribute_store(&owner),
                    }
                }
                (Some(owner), _) => eav.backend().create_attribute_store(&owner),
                (None, _) => Ok(AttributeStore::detached()),
            })
    }

    /// Decides where a write for `key` goes, without performing it.
    fn resolve_write(&self, eav: &Eav, key: &str, value: &Value) -> Result<WriteRoute, EavError> {
        if let Some(route) = NativeRoute::resolve(&self.attribute_traits(key), key, value) {
            return Ok(WriteRoute::Native(route));
        }
        if eav.schema().has_column(self.table(), key)? {
            Ok(WriteRoute::Column)
        } else {
            Ok(WriteRoute::Dynamic)
        }
    }

    /// Fixed column value if `key` is a column of the host table, otherwise
    /// the dynamic attribute (or `None` when neither has it).
    fn get_attribute(&mut self, eav: &Eav, key: &str) -> Result<Option<Value>, EavError> {
        if eav.schema().has_column(self.table(), key)? {
            return self.read_native(key);
        }
        let store = self.bind_attribute_store(eav)?;
        Ok(store.get(key).cloned())
    }

    fn set_attribute(
        &mut self,
        eav: &Eav,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<&mut Self, EavError> {
        let value = value.into();
        match self.resolve_write(eav, key, &value)? {
            WriteRoute::Native(route) => self.write_native(route, key, value)?,
            WriteRoute::Column => self.write_column(key, value),
            WriteRoute::Dynamic => self.bind_attribute_store(eav)?.set(key, value),
        }
        Ok(self)
    }

    /// Removes a dynamic attribute. Fixed columns are never touched, and a
    /// host without a store is left without one.
    fn unset_attribute(&mut self, eav: &Eav, key: &str) -> Result<Option<Value>, EavError> {
        if let StoreBinding::Unbound = self.entity_attributes().binding {
            self.retrieved(eav)?;
        }
        match &mut self.entity_attributes_mut().binding {
            StoreBinding::Bound(store) => Ok(store.unset(key)),
            _ => Ok(None),
        }
    }

    /// Direct store access: `None` reads, `Some` writes.
    ///
    /// Presence is explicit, so falsy values (`0`, `""`, `false`) are stored
    /// and read back like any other value.
    fn eav(&mut self, eav: &Eav, key: &str, value: Option<Value>) -> Result<Option<Value>, EavError> {
        let store = self.bind_attribute_store(eav)?;
        match value {
            None => Ok(store.get(key).cloned()),
            Some(value) => {
                store.put(key, value);
                Ok(None)
            }
        }
    }

    /// Saves the host row and then its bound store in one unit of work.
    fn save(&mut self, eav: &Eav) -> Result<(), EavError> {
        let mut binding = std::mem::take(&mut self.entity_attributes_mut().binding);
        let store = match &mut binding {
            StoreBinding::Bound(store) => Some(store),
            _ => {
                debug!(table = %self.table(), "no attribute store bound, skipping cascade");
                None
            }
        };
        let result = eav.backend().save_record(self, store);
        self.entity_attributes_mut().binding = binding;
        result
    }
}
