use crate::core::config::DatabaseConfig;
use crate::core::error;
use crate::core::schemas;
use regex::Regex;
use rusqlite::Connection;
use std::sync::LazyLock;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

pub fn db_connect(db_path: &str, config: &DatabaseConfig) -> Result<Connection, error::EavError> {
    let conn = Connection::open(db_path)?;
    apply_pragmas(&conn, config)?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))
        .map_err(error::EavError::RusqliteError)?;
    Ok(conn)
}

pub fn db_connect_in_memory(config: &DatabaseConfig) -> Result<Connection, error::EavError> {
    let conn = Connection::open_in_memory()?;
    apply_pragmas(&conn, config)?;
    Ok(conn)
}

fn apply_pragmas(conn: &Connection, config: &DatabaseConfig) -> Result<(), error::EavError> {
    conn.busy_timeout(config.busy_timeout())
        .map_err(error::EavError::RusqliteError)?;
    let fk = if config.foreign_keys { "ON" } else { "OFF" };
    conn.execute(&format!("PRAGMA foreign_keys={fk};"), [])
        .map_err(error::EavError::RusqliteError)?;
    Ok(())
}

/// Creates the attribute store table and its owner index if missing.
pub fn install_schema(conn: &Connection) -> Result<(), error::EavError> {
    for stmt in schemas::all_statements() {
        conn.execute(stmt, [])?;
    }
    Ok(())
}

/// Table and column names are interpolated into SQL, so only plain
/// identifiers are accepted.
pub fn validate_identifier(name: &str) -> Result<&str, error::EavError> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(error::EavError::ValidationError(format!(
            "Invalid SQL identifier: '{}'",
            name
        )))
    }
}
