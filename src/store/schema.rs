//! Schema migration for the AutoHome database
//!
//! The broker plugin, the device controller and the web server all open the
//! same SQLite file, so table creation has to be safe against another process
//! doing the same thing at the same moment.

use crate::error::{AuthError, Result};
use rusqlite::Connection;
use tracing::{debug, info, warn};

/// A table known at compile time.
///
/// Name and definition are interpolated into a `CREATE TABLE` statement, so
/// both must be `'static` constants and never carry user input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub definition: &'static str,
}

impl TableDef {
    fn create_statement(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({});",
            self.name, self.definition
        )
    }
}

/// Device identity: one row per MQTT username.
pub const PROFILE_TABLE: TableDef = TableDef {
    name: "profile",
    definition: "username text not null primary key,\
                 displayname text not null unique,\
                 type text not null,\
                 connected text not null,\
                 status text not null",
};

/// Salted password hashes, removed together with their profile.
pub const AUTH_TABLE: TableDef = TableDef {
    name: "auth",
    definition: "username text not null primary key references profile on delete cascade,\
                 hash text not null,\
                 salt text not null",
};

/// Scheduled commands. Only created here; rows are owned by the scheduler.
pub const SCHEDULE_TABLE: TableDef = TableDef {
    name: "schedule",
    definition: "id integer not null primary key,\
                 username text not null references profile on delete cascade,\
                 command text not null,\
                 fuzzy int not null,\
                 recurrent int not null,\
                 firedate int not null,\
                 weekday int not null,\
                 hours int not null,\
                 minutes int not null",
};

/// Tables in creation order (referenced tables first).
pub const TABLES: [TableDef; 3] = [PROFILE_TABLE, AUTH_TABLE, SCHEDULE_TABLE];

/// What happened to a single table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStatus {
    Created,
    AlreadyExisted,
}

/// Aggregate result of [`initialize_schema`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaOutcome {
    /// Every table was created
    Fresh,
    /// Every table was already there
    Existing,
    /// Some tables were missing and have been added
    Patched { created: Vec<&'static str> },
}

/// Ensure a table exists.
///
/// The count only decides which status is reported. Creation itself always
/// goes through `CREATE TABLE IF NOT EXISTS`, which cannot fail because
/// another process created the table in between.
pub fn ensure_table(conn: &Connection, table: &TableDef) -> Result<TableStatus> {
    let schema_err = |source| AuthError::Schema {
        table: table.name,
        source,
    };

    let count: i64 = conn
        .query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table.name],
            |row| row.get(0),
        )
        .map_err(schema_err)?;

    conn.execute_batch(&table.create_statement())
        .map_err(schema_err)?;

    if count == 0 {
        Ok(TableStatus::Created)
    } else {
        Ok(TableStatus::AlreadyExisted)
    }
}

/// Enable foreign keys and ensure the profile, auth and schedule tables.
///
/// Stops at the first failure; the caller owns the connection and is
/// responsible for closing it.
pub fn initialize_schema(conn: &Connection) -> Result<SchemaOutcome> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    let mut created = Vec::new();
    for table in &TABLES {
        if ensure_table(conn, table)? == TableStatus::Created {
            created.push(table.name);
        }
    }

    let outcome = if created.len() == TABLES.len() {
        SchemaOutcome::Fresh
    } else if created.is_empty() {
        SchemaOutcome::Existing
    } else {
        SchemaOutcome::Patched { created }
    };

    match &outcome {
        SchemaOutcome::Fresh => info!("Uninitialized database, creating from scratch"),
        SchemaOutcome::Existing => debug!("Database schema already present"),
        SchemaOutcome::Patched { created } => warn!(
            tables = ?created,
            "Incomplete database, patching (foreign keys may be wrong)"
        ),
    }

    Ok(outcome)
}
