//! SQLite implementation of the storage ports.
//!
//! One connection behind a mutex; every operation runs inside `with_conn`,
//! which serialises access and logs the outcome. Host rows are written
//! generically from `HostRecord::columns_for_save`, so any table works as a
//! host as long as its key column is addressable by value.

use crate::core::attribute_store::{AttributeStore, OwnerRef};
use crate::core::config::DatabaseConfig;
use crate::core::db;
use crate::core::error::EavError;
use crate::core::host::HostRecord;
use crate::core::ports::{ColumnInfo, SchemaIntrospector, StorageBackend};
use crate::core::time;
use mockable::{Clock, DefaultClock};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::{Map, Number, Value};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

#[derive(Clone)]
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
    clock: Arc<dyn Clock>,
}

/// Column values assigned by a store write, applied once the write commits.
struct SavedStore {
    id: String,
    created_at: String,
    updated_at: String,
}

impl SqliteBackend {
    /// Opens the configured database (in-memory when no path is set) and
    /// installs the attribute store schema.
    pub fn open(config: &DatabaseConfig) -> Result<Self, EavError> {
        let conn = match &config.path {
            Some(path) => db::db_connect(path, config)?,
            None => db::db_connect_in_memory(config)?,
        };
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, EavError> {
        Self::open(&DatabaseConfig::default())
    }

    pub fn from_connection(conn: Connection) -> Result<Self, EavError> {
        db::install_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            clock: Arc::new(DefaultClock),
        })
    }

    /// Timestamps written to store rows come from `clock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Execute a closure with exclusive access to the connection.
    pub fn with_conn<F, R>(&self, op_name: &str, f: F) -> Result<R, EavError>
    where
        F: FnOnce(&mut Connection) -> Result<R, EavError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|_| EavError::ValidationError("SqliteBackend lock poisoned".to_string()))?;
        let result = f(&mut conn);
        let status = if result.is_ok() { "success" } else { "error" };
        debug!(op = op_name, status, "sqlite op");
        result
    }

    fn now(&self) -> String {
        time::to_storage(self.clock.utc())
    }
}

impl SchemaIntrospector for SqliteBackend {
    fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, EavError> {
        let table = db::validate_identifier(table)?;
        let columns = self.with_conn("schema.list_columns", |conn| {
            let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
            let mut rows = stmt.query([])?;
            let mut columns = Vec::new();
            while let Some(row) = rows.next()? {
                columns.push(ColumnInfo {
                    name: row.get(1)?,
                    data_type: row.get(2)?,
                    nullable: row.get::<_, i64>(3)? == 0,
                    default_value: sql_text(row.get_ref(4)?)?,
                    primary_key: row.get::<_, i64>(5)? > 0,
                });
            }
            Ok(columns)
        })?;
        if columns.is_empty() {
            return Err(EavError::NotFound(format!("table '{}'", table)));
        }
        Ok(columns)
    }
}

impl StorageBackend for SqliteBackend {
    fn find_attribute_store(&self, owner: &OwnerRef) -> Result<Option<AttributeStore>, EavError> {
        self.with_conn("store.find", |conn| read_store(conn, owner))
    }

    fn create_attribute_store(&self, owner: &OwnerRef) -> Result<AttributeStore, EavError> {
        let now = self.now();
        self.with_conn("store.create", |conn| {
            let inserted = conn.execute(
                "INSERT INTO entity_attribute_stores
                     (id, modelable_type, modelable_id, attribute_values, created_at, updated_at)
                 VALUES (?1, ?2, ?3, '{}', ?4, ?4)
                 ON CONFLICT(modelable_type, modelable_id) DO NOTHING",
                params![time::new_store_id(), owner.owner_type, owner.owner_id, now],
            )?;
            if inserted > 0 {
                info!(
                    owner_type = %owner.owner_type,
                    owner_id = %owner.owner_id,
                    "attribute store created"
                );
            }
            read_store(conn, owner)?.ok_or_else(|| {
                EavError::NotFound(format!(
                    "attribute store for {}#{}",
                    owner.owner_type, owner.owner_id
                ))
            })
        })
    }

    fn delete_attribute_store(&self, owner: &OwnerRef) -> Result<bool, EavError> {
        self.with_conn("store.delete", |conn| {
            let deleted = conn.execute(
                "DELETE FROM entity_attribute_stores WHERE modelable_type = ?1 AND modelable_id = ?2",
                params![owner.owner_type, owner.owner_id],
            )?;
            Ok(deleted > 0)
        })
    }

    fn fetch_row(
        &self,
        table: &str,
        key_column: &str,
        key: &str,
    ) -> Result<Option<Map<String, Value>>, EavError> {
        let table = db::validate_identifier(table)?;
        let key_column = db::validate_identifier(key_column)?;
        self.with_conn("record.fetch", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT * FROM {} WHERE {} = ?1",
                table, key_column
            ))?;
            let names: Vec<String> = stmt.column_names().iter().map(|n| n.to_string()).collect();
            let mut rows = stmt.query(params![key])?;
            let Some(row) = rows.next()? else {
                return Ok(None);
            };
            let mut map = Map::new();
            for (i, name) in names.into_iter().enumerate() {
                map.insert(name, json_value(row.get_ref(i)?)?);
            }
            Ok(Some(map))
        })
    }

    fn save_record(
        &self,
        host: &mut dyn HostRecord,
        mut store: Option<&mut AttributeStore>,
    ) -> Result<(), EavError> {
        let table = db::validate_identifier(host.table())?.to_string();
        let key_name = db::validate_identifier(host.key_name())?.to_string();
        let columns = host.columns_for_save();
        for name in columns.keys() {
            db::validate_identifier(name)?;
        }
        let current_key = host.record_key();
        let morph_class = host.morph_class().to_string();
        let now = self.now();

        let (key, saved) = self.with_conn("record.save", |conn| {
            let tx = conn.transaction()?;
            let key = upsert_row(&tx, &table, &key_name, current_key.as_deref(), &columns)?;
            let owner = OwnerRef::new(morph_class.as_str(), key.as_str());
            let saved = match store.as_deref() {
                Some(store) => write_store(&tx, store, &owner, &now)?,
                None => None,
            };
            tx.commit()?;
            Ok((key, saved))
        })?;

        let store_written = saved.is_some();
        if let Some(store) = store.as_deref_mut() {
            if store.owner.is_none() {
                store.attach(OwnerRef::new(morph_class, key.clone()));
            }
            if let Some(saved) = saved {
                store.mark_saved(saved.id, saved.created_at, saved.updated_at);
            }
        }
        debug!(
            table = %table,
            key = %key,
            store_id = store.as_deref().and_then(|s| s.id.as_deref()).unwrap_or("-"),
            store_written,
            "record saved"
        );
        host.mark_persisted(key);
        Ok(())
    }
}

fn read_store(conn: &Connection, owner: &OwnerRef) -> Result<Option<AttributeStore>, EavError> {
    let row = conn
        .query_row(
            "SELECT id, attribute_values, created_at, updated_at
             FROM entity_attribute_stores
             WHERE modelable_type = ?1 AND modelable_id = ?2",
            params![owner.owner_type, owner.owner_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            },
        )
        .optional()?;
    let Some((id, blob, created_at, updated_at)) = row else {
        return Ok(None);
    };
    let attributes = decode_attributes(&blob)?;
    Ok(Some(AttributeStore::from_parts(
        id,
        owner.clone(),
        attributes,
        created_at,
        updated_at,
    )))
}

/// Inserts or updates `store` for `owner` inside the caller's transaction.
/// Clean, already-persisted stores are skipped and yield `None`.
fn write_store(
    conn: &Connection,
    store: &AttributeStore,
    owner: &OwnerRef,
    now: &str,
) -> Result<Option<SavedStore>, EavError> {
    let blob = store.to_json()?;
    match &store.id {
        Some(_) if !store.is_dirty() => Ok(None),
        Some(id) => {
            let updated = conn.execute(
                "UPDATE entity_attribute_stores SET attribute_values = ?1, updated_at = ?2 WHERE id = ?3",
                params![blob, now, id],
            )?;
            if updated == 0 {
                return Err(EavError::NotFound(format!("attribute store '{}'", id)));
            }
            Ok(Some(SavedStore {
                id: id.clone(),
                created_at: store.created_at.clone().unwrap_or_else(|| now.to_string()),
                updated_at: now.to_string(),
            }))
        }
        None => {
            let id = time::new_store_id();
            conn.execute(
                "INSERT INTO entity_attribute_stores
                     (id, modelable_type, modelable_id, attribute_values, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                params![id, owner.owner_type, owner.owner_id, blob, now],
            )?;
            Ok(Some(SavedStore {
                id,
                created_at: now.to_string(),
                updated_at: now.to_string(),
            }))
        }
    }
}

/// Writes the host row and returns its key. Existing keys are updated in
/// place (or inserted when the row is gone); new rows take the key column
/// from the values or fall back to the rowid.
fn upsert_row(
    conn: &Connection,
    table: &str,
    key_name: &str,
    key: Option<&str>,
    columns: &Map<String, Value>,
) -> Result<String, EavError> {
    if let Some(key) = key {
        let assignments: Vec<(&String, &Value)> =
            columns.iter().filter(|(name, _)| *name != key_name).collect();
        let updated = if assignments.is_empty() {
            conn.query_row(
                &format!("SELECT COUNT(*) FROM {} WHERE {} = ?1", table, key_name),
                params![key],
                |row| row.get::<_, i64>(0),
            )? as usize
        } else {
            let set_clause = assignments
                .iter()
                .enumerate()
                .map(|(i, (name, _))| format!("{} = ?{}", name, i + 1))
                .collect::<Vec<_>>()
                .join(", ");
            let mut values = assignments
                .iter()
                .map(|(_, v)| sql_value(v))
                .collect::<Result<Vec<_>, _>>()?;
            values.push(SqlValue::Text(key.to_string()));
            conn.execute(
                &format!(
                    "UPDATE {} SET {} WHERE {} = ?{}",
                    table,
                    set_clause,
                    key_name,
                    values.len()
                ),
                params_from_iter(values.iter()),
            )?
        };
        if updated == 0 {
            let mut row = columns.clone();
            row.insert(key_name.to_string(), Value::String(key.to_string()));
            insert_row(conn, table, &row)?;
        }
        return Ok(key.to_string());
    }

    let mut row = columns.clone();
    if row.get(key_name).is_some_and(Value::is_null) {
        row.remove(key_name);
    }
    insert_row(conn, table, &row)?;
    match row.get(key_name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Ok(conn.last_insert_rowid().to_string()),
    }
}

fn insert_row(conn: &Connection, table: &str, row: &Map<String, Value>) -> Result<(), EavError> {
    if row.is_empty() {
        conn.execute(&format!("INSERT INTO {} DEFAULT VALUES", table), [])?;
        return Ok(());
    }
    let names = row.keys().cloned().collect::<Vec<_>>().join(", ");
    let placeholders = (1..=row.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");
    let values = row
        .values()
        .map(sql_value)
        .collect::<Result<Vec<_>, _>>()?;
    conn.execute(
        &format!("INSERT INTO {} ({}) VALUES ({})", table, names, placeholders),
        params_from_iter(values.iter()),
    )?;
    Ok(())
}

/// Stored blobs are JSON objects; `[]` and `null` are read as empty.
fn decode_attributes(blob: &str) -> Result<Map<String, Value>, EavError> {
    match serde_json::from_str::<Value>(blob)? {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        Value::Array(items) if items.is_empty() => Ok(Map::new()),
        other => Err(EavError::ValidationError(format!(
            "attribute_values is not a JSON object: {}",
            other
        ))),
    }
}

fn sql_value(value: &Value) -> Result<SqlValue, EavError> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => SqlValue::Integer(i),
            (None, Some(f)) => SqlValue::Real(f),
            (None, None) => SqlValue::Text(n.to_string()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(serde_json::to_string(other)?),
    })
}

/// SQLite values as JSON. Text must be valid UTF-8; BLOBs have no JSON
/// representation and are rejected.
fn json_value(value: ValueRef<'_>) -> Result<Value, EavError> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(
            std::str::from_utf8(t)
                .map_err(|e| {
                    EavError::ValidationError(format!("Invalid UTF-8 in text column: {}", e))
                })?
                .to_string(),
        ),
        ValueRef::Blob(b) => {
            return Err(EavError::ValidationError(format!(
                "BLOB column values are not supported ({} bytes)",
                b.len()
            )));
        }
    })
}

fn sql_text(value: ValueRef<'_>) -> Result<Option<String>, EavError> {
    Ok(match json_value(value)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}
