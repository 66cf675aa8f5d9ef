//! Schema definitions for the attribute store table.
//!
//! One row per host record that has ever touched a dynamic attribute. The
//! polymorphic pair `(modelable_type, modelable_id)` is unique, which keeps
//! the host/store relationship one-to-one at the storage level.

pub const ATTRIBUTE_STORES_TABLE: &str = "entity_attribute_stores";

pub const ATTRIBUTE_STORES_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS entity_attribute_stores (
        id TEXT PRIMARY KEY,
        modelable_type TEXT NOT NULL,
        modelable_id TEXT NOT NULL,
        attribute_values TEXT NOT NULL DEFAULT '{}', -- JSON object
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
";

pub const ATTRIBUTE_STORES_OWNER_INDEX: &str = "
    CREATE UNIQUE INDEX IF NOT EXISTS idx_entity_attribute_stores_modelable
    ON entity_attribute_stores(modelable_type, modelable_id)
";

/// All statements needed to bring a database up to the current schema.
pub fn all_statements() -> [&'static str; 2] {
    [ATTRIBUTE_STORES_SCHEMA, ATTRIBUTE_STORES_OWNER_INDEX]
}
