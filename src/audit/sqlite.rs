//! SQLite-backed audit store.
//!
//! The table is provisioned explicitly with [`SqliteAuditStore::migrate`];
//! until then [`AuditStore::is_provisioned`] reports `false` and the logger
//! falls back to its debug channel.

use std::{path::Path, sync::Mutex};

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::AuditError;

use super::{AuditStore, CallRecord, StoredCallRecord};

pub const AUDIT_TABLE: &str = "desk365_api_logs";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS desk365_api_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    method VARCHAR(10) NOT NULL,
    endpoint TEXT NOT NULL,
    request_headers TEXT NULL,
    request_body TEXT NULL,
    response_status INTEGER NULL,
    response_body TEXT NULL,
    duration_ms INTEGER NULL,
    error_message TEXT NULL,
    operation VARCHAR(255) NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS desk365_api_logs_method_index ON desk365_api_logs (method);
CREATE INDEX IF NOT EXISTS desk365_api_logs_response_status_index ON desk365_api_logs (response_status);
CREATE INDEX IF NOT EXISTS desk365_api_logs_operation_index ON desk365_api_logs (operation);
CREATE INDEX IF NOT EXISTS desk365_api_logs_created_at_index ON desk365_api_logs (created_at);
";

pub struct SqliteAuditStore {
    conn: Mutex<Connection>,
}

impl SqliteAuditStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AuditError> {
        Ok(Self::from_connection(Connection::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self, AuditError> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Creates the audit table and its indexes if they are missing.
    pub fn migrate(&self) -> Result<(), AuditError> {
        let conn = self.conn.lock().map_err(|_| AuditError::Poisoned)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Newest rows first, optionally limited to one operation.
    pub fn recent(
        &self,
        limit: usize,
        operation: Option<&str>,
    ) -> Result<Vec<StoredCallRecord>, AuditError> {
        let conn = self.conn.lock().map_err(|_| AuditError::Poisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, method, endpoint, request_headers, request_body, response_status,
                    response_body, duration_ms, operation, error_message, created_at
             FROM desk365_api_logs
             WHERE ?1 IS NULL OR operation = ?1
             ORDER BY id DESC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![operation, limit as i64], |row| {
            let headers: Option<String> = row.get(3)?;
            Ok(StoredCallRecord {
                id: row.get(0)?,
                method: row.get(1)?,
                endpoint: row.get(2)?,
                request_headers: headers.and_then(|raw| serde_json::from_str(&raw).ok()),
                request_body: row.get(4)?,
                response_status: narrow(row, 5)?,
                response_body: row.get(6)?,
                duration_ms: narrow(row, 7)?,
                operation: row.get(8)?,
                error_message: row.get(9)?,
                created_at: row.get(10)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }
}

/// Reads a nullable integer column into a narrower type, rejecting values
/// that do not fit.
fn narrow<T: TryFrom<i64>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>> {
    row.get::<_, Option<i64>>(idx)?
        .map(|value| {
            T::try_from(value).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, value))
        })
        .transpose()
}

impl AuditStore for SqliteAuditStore {
    fn is_provisioned(&self) -> Result<bool, AuditError> {
        let conn = self.conn.lock().map_err(|_| AuditError::Poisoned)?;
        let found = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![AUDIT_TABLE],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn insert(&self, record: &CallRecord) -> Result<(), AuditError> {
        let headers = record
            .headers_json()
            .map(|value| serde_json::to_string(&value))
            .transpose()?;
        let timestamp = record.created_at.to_rfc3339();

        let conn = self.conn.lock().map_err(|_| AuditError::Poisoned)?;
        conn.execute(
            "INSERT INTO desk365_api_logs (
                method, endpoint, request_headers, request_body, response_status,
                response_body, duration_ms, error_message, operation, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            params![
                record.method.as_str(),
                record.endpoint,
                headers,
                record.request_body,
                record.response_status.map(i64::from),
                record.response_body,
                i64::try_from(record.duration_ms).unwrap_or(i64::MAX),
                record.error_message,
                record.operation,
                timestamp,
            ],
        )?;
        Ok(())
    }
}

impl std::fmt::Debug for SqliteAuditStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteAuditStore").finish_non_exhaustive()
    }
}
