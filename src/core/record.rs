//! A schema-described host record.
//!
//! `Record` is a ready-made host for tables that have no dedicated Rust
//! type: fixed columns live in a JSON map, and per-attribute behaviour
//! (casts, mutators) comes from a shared [`RecordDefinition`].
//!
//! ```ignore
//! let products = Arc::new(
//!     RecordDefinition::new("products")
//!         .cast("price", CastKind::Real)
//!         .cast("released_on", CastKind::Date),
//! );
//! let mut product = Record::new(products.clone());
//! product.set_attribute(&eav, "name", "Lamp")?;   // fixed column
//! product.set_attribute(&eav, "color", "red")?;   // dynamic attribute
//! product.save(&eav)?;
//! ```

use crate::core::accessor::{Eav, EntityAttributes, HasEntityAttributes};
use crate::core::error::EavError;
use crate::core::host::{AttributeTraits, HostRecord, JSON_PATH_SEPARATOR, NativeRoute};
use crate::core::time;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub type Mutator = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Reversible string encryption for `CastKind::Encrypted` columns.
pub trait Encrypter: Send + Sync {
    fn encrypt(&self, plain: &str) -> Result<String, EavError>;
    fn decrypt(&self, cipher: &str) -> Result<String, EavError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CastKind {
    Integer,
    Real,
    Boolean,
    Text,
    Date,
    /// Allowed variants; an empty list accepts any string.
    Enum(Vec<String>),
    /// Value object stored as JSON text.
    Class(String),
    Json,
    Encrypted,
    Hashed,
}

#[derive(Clone)]
pub struct RecordDefinition {
    table: String,
    morph_class: Option<String>,
    key_name: String,
    casts: BTreeMap<String, CastKind>,
    set_mutators: BTreeMap<String, Mutator>,
    cast_mutators: BTreeMap<String, Mutator>,
    encrypter: Option<Arc<dyn Encrypter>>,
}

impl RecordDefinition {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            morph_class: None,
            key_name: "id".to_string(),
            casts: BTreeMap::new(),
            set_mutators: BTreeMap::new(),
            cast_mutators: BTreeMap::new(),
            encrypter: None,
        }
    }

    pub fn morph_class(mut self, name: impl Into<String>) -> Self {
        self.morph_class = Some(name.into());
        self
    }

    pub fn key_name(mut self, name: impl Into<String>) -> Self {
        self.key_name = name.into();
        self
    }

    pub fn cast(mut self, key: impl Into<String>, kind: CastKind) -> Self {
        self.casts.insert(key.into(), kind);
        self
    }

    pub fn mutator<F>(mut self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.set_mutators.insert(key.into(), Arc::new(f));
        self
    }

    pub fn cast_mutator<F>(mut self, key: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.cast_mutators.insert(key.into(), Arc::new(f));
        self
    }

    pub fn encrypter(mut self, encrypter: Arc<dyn Encrypter>) -> Self {
        self.encrypter = Some(encrypter);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn cast_of(&self, key: &str) -> Option<&CastKind> {
        self.casts.get(key)
    }

    fn traits(&self, key: &str) -> AttributeTraits {
        let cast = self.casts.get(key);
        AttributeTraits {
            set_mutator: self.set_mutators.contains_key(key),
            cast_mutator: self.cast_mutators.contains_key(key),
            date: matches!(cast, Some(CastKind::Date)),
            enum_cast: matches!(cast, Some(CastKind::Enum(_))),
            class_cast: matches!(cast, Some(CastKind::Class(_))),
            json_cast: matches!(cast, Some(CastKind::Json)),
            encrypted: matches!(cast, Some(CastKind::Encrypted)),
            hashed: matches!(cast, Some(CastKind::Hashed)),
        }
    }

    fn require_encrypter(&self, key: &str) -> Result<&dyn Encrypter, EavError> {
        self.encrypter.as_deref().ok_or_else(|| {
            EavError::ValidationError(format!(
                "No encrypter configured for encrypted attribute '{}.{}'",
                self.table, key
            ))
        })
    }
}

impl fmt::Debug for RecordDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordDefinition")
            .field("table", &self.table)
            .field("morph_class", &self.morph_class)
            .field("key_name", &self.key_name)
            .field("casts", &self.casts)
            .field("set_mutators", &self.set_mutators.keys().collect::<Vec<_>>())
            .field("cast_mutators", &self.cast_mutators.keys().collect::<Vec<_>>())
            .field("encrypter", &self.encrypter.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Record {
    definition: Arc<RecordDefinition>,
    attributes: Map<String, Value>,
    key: Option<String>,
    entity_attributes: EntityAttributes,
}

impl Record {
    pub fn new(definition: Arc<RecordDefinition>) -> Self {
        Self {
            definition,
            attributes: Map::new(),
            key: None,
            entity_attributes: EntityAttributes::new(),
        }
    }

    /// Materialises a row read from storage. The load hook is not run.
    pub fn from_row(definition: Arc<RecordDefinition>, row: Map<String, Value>) -> Self {
        let key = row.get(&definition.key_name).and_then(key_text);
        Self {
            definition,
            attributes: row,
            key,
            entity_attributes: EntityAttributes::new(),
        }
    }

    /// Loads a record by key and eagerly binds its attribute store.
    pub fn find(
        eav: &Eav,
        definition: Arc<RecordDefinition>,
        key: &str,
    ) -> Result<Option<Self>, EavError> {
        let Some(row) = eav
            .backend()
            .fetch_row(&definition.table, &definition.key_name, key)?
        else {
            return Ok(None);
        };
        let mut record = Self::from_row(definition, row);
        record.retrieved(eav)?;
        Ok(Some(record))
    }

    pub fn definition(&self) -> &RecordDefinition {
        &self.definition
    }

    /// The stored (uncast) value of a fixed attribute.
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn exists(&self) -> bool {
        self.key.is_some()
    }

    fn date_for_storage(&self, key: &str, value: &Value) -> Result<Value, EavError> {
        let ts = match value {
            Value::String(s) => time::parse_date_text(s),
            Value::Number(n) => n.as_i64().and_then(time::from_epoch_secs),
            _ => None,
        };
        ts.map(|ts| Value::String(time::to_storage(ts))).ok_or_else(|| {
            EavError::ValidationError(format!("Invalid date for '{}': {}", key, value))
        })
    }

    fn checked_enum(&self, key: &str, value: Value) -> Result<Value, EavError> {
        let Some(CastKind::Enum(variants)) = self.definition.casts.get(key) else {
            return Ok(value);
        };
        match &value {
            Value::Null => Ok(value),
            Value::String(s) if variants.is_empty() || variants.contains(s) => Ok(value),
            other => Err(EavError::ValidationError(format!(
                "Invalid value for enum '{}': {}",
                key, other
            ))),
        }
    }

    /// Writes `column->a->b` inside the JSON document held by `column`.
    fn write_json_path(&mut self, key: &str, value: Value) -> Result<(), EavError> {
        let mut segments = key.split(JSON_PATH_SEPARATOR).map(str::trim);
        let column = segments.next().unwrap_or_default().to_string();
        let path: Vec<&str> = segments.collect();

        let mut document = match self.attributes.get(&column) {
            Some(Value::String(s)) => serde_json::from_str(s)?,
            Some(Value::Null) | None => Value::Object(Map::new()),
            Some(other) => other.clone(),
        };
        set_path(&mut document, &path, value);

        self.attributes
            .insert(column, Value::String(serde_json::to_string(&document)?));
        Ok(())
    }
}

fn set_path(target: &mut Value, path: &[&str], value: Value) {
    let Some((head, rest)) = path.split_first() else {
        *target = value;
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(obj) = target {
        let slot = obj.entry(head.to_string()).or_insert(Value::Null);
        set_path(slot, rest, value);
    }
}

fn apply_mutator(
    mutators: &BTreeMap<String, Mutator>,
    key: &str,
    value: Value,
) -> Result<Value, EavError> {
    let f = mutators.get(key).ok_or_else(|| {
        EavError::ValidationError(format!("No mutator registered for '{}'", key))
    })?;
    Ok(f(value))
}

fn key_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

impl HostRecord for Record {
    fn table(&self) -> &str {
        &self.definition.table
    }

    fn morph_class(&self) -> &str {
        self.definition
            .morph_class
            .as_deref()
            .unwrap_or(&self.definition.table)
    }

    fn key_name(&self) -> &str {
        &self.definition.key_name
    }

    fn record_key(&self) -> Option<String> {
        self.key.clone()
    }

    fn attribute_traits(&self, key: &str) -> AttributeTraits {
        self.definition.traits(key)
    }

    fn read_native(&self, key: &str) -> Result<Option<Value>, EavError> {
        let Some(raw) = self.attributes.get(key) else {
            return Ok(None);
        };
        let value = match (self.definition.casts.get(key), raw) {
            (_, Value::Null) => Value::Null,
            (Some(CastKind::Json | CastKind::Class(_)), Value::String(s)) => {
                serde_json::from_str(s)?
            }
            (Some(CastKind::Integer), Value::String(s)) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or_else(|_| raw.clone()),
            (Some(CastKind::Real), Value::Number(n)) => {
                n.as_f64().map(Value::from).unwrap_or_else(|| raw.clone())
            }
            (Some(CastKind::Text), Value::Number(n)) => Value::String(n.to_string()),
            (Some(CastKind::Boolean), Value::Number(n)) => {
                Value::Bool(n.as_f64().is_some_and(|f| f != 0.0))
            }
            (Some(CastKind::Encrypted), Value::String(s)) => {
                Value::String(self.definition.require_encrypter(key)?.decrypt(s)?)
            }
            (_, other) => other.clone(),
        };
        Ok(Some(value))
    }

    fn write_native(
        &mut self,
        route: NativeRoute,
        key: &str,
        value: Value,
    ) -> Result<(), EavError> {
        let stored = match route {
            NativeRoute::SetMutator => apply_mutator(&self.definition.set_mutators, key, value)?,
            NativeRoute::CastMutator => {
                apply_mutator(&self.definition.cast_mutators, key, value)?
            }
            NativeRoute::Date => self.date_for_storage(key, &value)?,
            NativeRoute::Enum => self.checked_enum(key, value)?,
            NativeRoute::ClassCast | NativeRoute::Json => match value {
                Value::Null => Value::Null,
                other => Value::String(serde_json::to_string(&other)?),
            },
            NativeRoute::JsonPath => return self.write_json_path(key, value),
            NativeRoute::Encrypted => {
                let cipher = self.definition.require_encrypter(key)?.encrypt(&text_of(&value))?;
                Value::String(cipher)
            }
            NativeRoute::Hashed => Value::String(sha256_hex(&text_of(&value))),
        };
        self.attributes.insert(key.to_string(), stored);
        Ok(())
    }

    fn write_column(&mut self, key: &str, value: Value) {
        self.attributes.insert(key.to_string(), value);
    }

    fn columns_for_save(&self) -> Map<String, Value> {
        self.attributes.clone()
    }

    fn mark_persisted(&mut self, key: String) {
        let stored = match key.parse::<i64>() {
            Ok(n) if n.to_string() == key => Value::from(n),
            _ => Value::String(key.clone()),
        };
        self.attributes
            .insert(self.definition.key_name.clone(), stored);
        self.key = Some(key);
    }
}

impl HasEntityAttributes for Record {
    fn entity_attributes(&self) -> &EntityAttributes {
        &self.entity_attributes
    }

    fn entity_attributes_mut(&mut self) -> &mut EntityAttributes {
        &mut self.entity_attributes
    }
}
