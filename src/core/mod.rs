//! Core modules for the attribute layer.
//!
//! Storage-facing primitives (`db`, `schemas`, `sqlite`) sit under the
//! routing layer (`host`, `accessor`) and the shared schema cache. `record`
//! is a ready-made host type for tables that don't need a bespoke one.

pub mod accessor;
pub mod attribute_store;
pub mod config;
pub mod db;
pub mod error;
pub mod host;
pub mod ports;
pub mod record;
pub mod schema_cache;
pub mod schemas;
pub mod sqlite;
pub mod time;
