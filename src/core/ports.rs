//! Collaborator contracts consumed by the attribute layer.
//!
//! The persistence engine is reached only through these traits, so the
//! accessor logic never sees a SQL connection. `SqliteBackend` is the
//! shipped implementation.

use crate::core::attribute_store::{AttributeStore, OwnerRef};
use crate::core::error::EavError;
use crate::core::host::HostRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One column as reported by schema introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub primary_key: bool,
    pub default_value: Option<String>,
}

/// Lists the columns of a table.
///
/// A failure must be reported as an error; an empty list for a table that
/// exists would route every attribute to the dynamic store.
pub trait SchemaIntrospector: Send + Sync {
    fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, EavError>;
}

pub trait StorageBackend: SchemaIntrospector {
    fn find_attribute_store(&self, owner: &OwnerRef) -> Result<Option<AttributeStore>, EavError>;

    /// Returns the owner's store, inserting an empty one if none exists.
    /// Concurrent callers converge on the same row.
    fn create_attribute_store(&self, owner: &OwnerRef) -> Result<AttributeStore, EavError>;

    /// Removes the owner's store. The attribute layer never calls this; it
    /// is the hook for collaborators that cascade host deletion.
    fn delete_attribute_store(&self, owner: &OwnerRef) -> Result<bool, EavError>;

    /// Reads one host row as a column -> value map.
    fn fetch_row(
        &self,
        table: &str,
        key_column: &str,
        key: &str,
    ) -> Result<Option<Map<String, Value>>, EavError>;

    /// Saves the host row, then its store (if any), as one unit of work.
    /// This is the only way a store's attributes reach storage.
    fn save_record(
        &self,
        host: &mut dyn HostRecord,
        store: Option<&mut AttributeStore>,
    ) -> Result<(), EavError>;
}
