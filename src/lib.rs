//! eavkit: schema-less attributes for fixed-schema records
//!
//! **A record keeps its real columns; everything else goes to a per-record
//! JSON attribute store.** Reads and writes are routed by name: keys that are
//! columns of the host table (or that the host declares behaviour for) stay
//! on the host, all other keys land in the store.
//!
//! # Core Principles
//!
//! - **One store per record**: identified by `(modelable_type, modelable_id)`
//! - **Lazy**: a store row is created on first dynamic access, never on unset
//! - **Cascading save**: host row and store are committed together
//! - **Cached schema**: column sets are introspected once per table per TTL
//!
//! # Architecture
//!
//! ## Ports
//!
//! Storage is reached through [`core::ports::StorageBackend`] and
//! [`core::ports::SchemaIntrospector`]. [`core::sqlite::SqliteBackend`] is the
//! bundled implementation.
//!
//! ## Hosts
//!
//! A host type implements [`core::host::HostRecord`] (its own attribute
//! pipeline) and [`core::accessor::HasEntityAttributes`] (routing + store
//! lifecycle). [`core::record::Record`] does both for any table described by
//! a [`core::record::RecordDefinition`].
//!
//! # Example
//!
//! ```no_run
//! use eavkit::{CastKind, Eav, EavConfig, HasEntityAttributes, Record, RecordDefinition, SqliteBackend};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), eavkit::EavError> {
//! let backend = Arc::new(SqliteBackend::open_in_memory()?);
//! let eav = Eav::new(backend, &EavConfig::default());
//!
//! let products = Arc::new(RecordDefinition::new("products").cast("price", CastKind::Real));
//! if let Some(mut product) = Record::find(&eav, products, "1")? {
//!     product.set_attribute(&eav, "color", "red")?;
//!     product.save(&eav)?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Crate Structure
//!
//! - [`core`]: store model, routing, schema cache, SQLite backend

pub mod core;

pub use core::accessor::{Eav, EntityAttributes, HasEntityAttributes, StoreBinding, WriteRoute};
pub use core::attribute_store::{AttributeStore, OwnerRef};
pub use core::config::{DatabaseConfig, EavConfig, load_config};
pub use core::error::EavError;
pub use core::host::{AttributeTraits, HostRecord, NativeRoute};
pub use core::ports::{ColumnInfo, SchemaIntrospector, StorageBackend};
pub use core::record::{CastKind, Encrypter, Record, RecordDefinition};
pub use core::schema_cache::SchemaColumnCache;
pub use core::sqlite::SqliteBackend;
