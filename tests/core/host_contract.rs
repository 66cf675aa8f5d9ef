//! A hand-written host type wired to the attribute layer, without `Record`.

use eavkit::{
    AttributeTraits, Eav, EavConfig, EavError, EntityAttributes, HasEntityAttributes, HostRecord,
    NativeRoute, SqliteBackend, WriteRoute,
};
use serde_json::{Map, Value, json};
use std::sync::Arc;

#[derive(Debug, Default)]
struct User {
    id: Option<i64>,
    email: String,
    nickname: Option<String>,
    native_writes: Vec<(NativeRoute, String)>,
    attrs: EntityAttributes,
}

impl HostRecord for User {
    fn table(&self) -> &str {
        "users"
    }

    fn morph_class(&self) -> &str {
        "App\\User"
    }

    fn record_key(&self) -> Option<String> {
        self.id.map(|id| id.to_string())
    }

    fn attribute_traits(&self, key: &str) -> AttributeTraits {
        match key {
            "email" => AttributeTraits {
                set_mutator: true,
                ..Default::default()
            },
            "password" => AttributeTraits {
                hashed: true,
                ..Default::default()
            },
            _ => AttributeTraits::default(),
        }
    }

    fn read_native(&self, key: &str) -> Result<Option<Value>, EavError> {
        Ok(match key {
            "id" => self.id.map(Value::from),
            "email" => Some(Value::from(self.email.clone())),
            "nickname" => Some(self.nickname.clone().map_or(Value::Null, Value::from)),
            _ => None,
        })
    }

    fn write_native(
        &mut self,
        route: NativeRoute,
        key: &str,
        value: Value,
    ) -> Result<(), EavError> {
        self.native_writes.push((route, key.to_string()));
        match (route, key) {
            (NativeRoute::SetMutator, "email") => {
                self.email = value.as_str().unwrap_or_default().to_lowercase();
                Ok(())
            }
            _ => Err(EavError::ValidationError(format!("no column for '{}'", key))),
        }
    }

    fn write_column(&mut self, key: &str, value: Value) {
        if key == "nickname" {
            self.nickname = value.as_str().map(str::to_string);
        }
    }

    fn columns_for_save(&self) -> Map<String, Value> {
        let mut row = Map::new();
        row.insert("email".to_string(), json!(self.email));
        row.insert("nickname".to_string(), json!(self.nickname));
        row
    }

    fn mark_persisted(&mut self, key: String) {
        self.id = key.parse().ok();
    }
}

impl HasEntityAttributes for User {
    fn entity_attributes(&self) -> &EntityAttributes {
        &self.attrs
    }

    fn entity_attributes_mut(&mut self) -> &mut EntityAttributes {
        &mut self.attrs
    }
}

fn eav() -> (Eav, Arc<SqliteBackend>) {
    let backend = Arc::new(SqliteBackend::open_in_memory().expect("open"));
    backend
        .with_conn("test.setup", |conn| {
            conn.execute_batch(
                "CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL, nickname TEXT)",
            )?;
            Ok(())
        })
        .expect("create users");
    (Eav::new(backend.clone(), &EavConfig::default()), backend)
}

#[test]
fn declared_behaviour_wins_over_column_and_store() {
    let (eav, _) = eav();
    let mut user = User::default();

    assert_eq!(
        user.resolve_write(&eav, "email", &json!("A@B.C")).unwrap(),
        WriteRoute::Native(NativeRoute::SetMutator)
    );
    assert_eq!(
        user.resolve_write(&eav, "nickname", &json!("ann")).unwrap(),
        WriteRoute::Column
    );
    assert_eq!(
        user.resolve_write(&eav, "theme", &json!("dark")).unwrap(),
        WriteRoute::Dynamic
    );
    // hashed only applies to present values
    assert_eq!(
        user.resolve_write(&eav, "password", &Value::Null).unwrap(),
        WriteRoute::Dynamic
    );
    assert_eq!(
        user.resolve_write(&eav, "password", &json!("pw")).unwrap(),
        WriteRoute::Native(NativeRoute::Hashed)
    );

    user.set_attribute(&eav, "email", "Ann@Example.COM").unwrap();
    assert_eq!(user.email, "ann@example.com");
    assert!(user.attribute_store().is_none());
}

#[test]
fn native_route_errors_propagate_unchanged() {
    let (eav, _) = eav();
    let mut user = User::default();
    let err = user.set_attribute(&eav, "password", "pw").unwrap_err();
    assert!(matches!(err, EavError::ValidationError(_)));
    assert_eq!(
        user.native_writes,
        vec![(NativeRoute::Hashed, "password".to_string())]
    );
}

#[test]
fn custom_host_round_trips_with_morph_class() {
    let (eav, backend) = eav();
    let mut user = User::default();
    user.set_attribute(&eav, "email", "ann@example.com")
        .unwrap()
        .set_attribute(&eav, "nickname", "ann")
        .unwrap()
        .set_attribute(&eav, "theme", "dark")
        .unwrap();
    user.save(&eav).unwrap();
    assert_eq!(user.id, Some(1));

    let owner_type: String = backend
        .with_conn("test.read", |conn| {
            Ok(conn.query_row(
                "SELECT modelable_type FROM entity_attribute_stores WHERE modelable_id = '1'",
                [],
                |r| r.get(0),
            )?)
        })
        .unwrap();
    assert_eq!(owner_type, "App\\User");

    let mut again = User {
        id: Some(1),
        email: "ann@example.com".to_string(),
        ..User::default()
    };
    again.retrieved(&eav).unwrap();
    assert_eq!(
        again.get_attribute(&eav, "theme").unwrap(),
        Some(json!("dark"))
    );
    assert_eq!(
        again.get_attribute(&eav, "email").unwrap(),
        Some(json!("ann@example.com"))
    );
}
