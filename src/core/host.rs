//! What the attribute layer needs from a host record type.
//!
//! The host keeps its own attribute pipeline (casts, mutators, storage of
//! fixed columns). The attribute layer only asks which declared behaviour a
//! key has, and otherwise hands values to the host untouched.

use crate::core::attribute_store::OwnerRef;
use crate::core::error::EavError;
use serde_json::{Map, Value};

/// Marker for a key addressing a path inside a JSON column (`meta->color`).
pub const JSON_PATH_SEPARATOR: &str = "->";

/// Declared behaviour of one attribute key on the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributeTraits {
    pub set_mutator: bool,
    pub cast_mutator: bool,
    pub date: bool,
    pub enum_cast: bool,
    pub class_cast: bool,
    pub json_cast: bool,
    pub encrypted: bool,
    pub hashed: bool,
}

/// Reason a write was handed to the host's native path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeRoute {
    SetMutator,
    CastMutator,
    Date,
    Enum,
    ClassCast,
    Json,
    JsonPath,
    Encrypted,
    Hashed,
}

impl NativeRoute {
    /// First matching rule wins; the order is fixed.
    pub fn resolve(traits: &AttributeTraits, key: &str, value: &Value) -> Option<Self> {
        let present = !value.is_null();
        if traits.set_mutator {
            Some(Self::SetMutator)
        } else if traits.cast_mutator {
            Some(Self::CastMutator)
        } else if present && traits.date {
            Some(Self::Date)
        } else if traits.enum_cast {
            Some(Self::Enum)
        } else if traits.class_cast {
            Some(Self::ClassCast)
        } else if present && traits.json_cast {
            Some(Self::Json)
        } else if key.contains(JSON_PATH_SEPARATOR) {
            Some(Self::JsonPath)
        } else if present && traits.encrypted {
            Some(Self::Encrypted)
        } else if present && traits.hashed {
            Some(Self::Hashed)
        } else {
            None
        }
    }
}

pub trait HostRecord {
    /// Table backing the record type; also the schema cache key.
    fn table(&self) -> &str;

    /// Polymorphic type tag written to `modelable_type`.
    fn morph_class(&self) -> &str {
        self.table()
    }

    fn key_name(&self) -> &str {
        "id"
    }

    /// `None` until the record has been persisted.
    fn record_key(&self) -> Option<String>;

    fn attribute_traits(&self, key: &str) -> AttributeTraits;

    /// Native read of a fixed attribute (casts applied by the host).
    fn read_native(&self, key: &str) -> Result<Option<Value>, EavError>;

    /// Native write for keys the host declares behaviour for.
    fn write_native(&mut self, route: NativeRoute, key: &str, value: Value)
    -> Result<(), EavError>;

    /// Raw write into the in-memory fixed-attribute slot.
    fn write_column(&mut self, key: &str, value: Value);

    /// Fixed attribute values as they should be written to the host row.
    fn columns_for_save(&self) -> Map<String, Value>;

    /// Called once the host row is committed, with the row's key.
    fn mark_persisted(&mut self, key: String);

    fn owner_ref(&self) -> Option<OwnerRef> {
        self.record_key()
            .map(|id| OwnerRef::new(self.morph_class(), id))
    }
}
