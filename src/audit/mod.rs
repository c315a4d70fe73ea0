//! Best-effort audit trail of outbound calls.
//!
//! [`AuditLogger`] sits in front of an [`AuditStore`] and swallows every store
//! failure: auditing never changes the outcome of the call being audited.

mod memory;
mod models;
mod sqlite;

use std::sync::Arc;

pub use memory::MemoryAuditStore;
pub use models::{CallRecord, StoredCallRecord};
pub use sqlite::{SqliteAuditStore, AUDIT_TABLE};

use crate::error::AuditError;

pub trait AuditStore: Send + Sync {
    /// Whether the backing table exists.
    fn is_provisioned(&self) -> Result<bool, AuditError>;

    fn insert(&self, record: &CallRecord) -> Result<(), AuditError>;
}

#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn AuditStore>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Logger with nowhere to write; every record goes to the debug channel.
    pub fn disabled() -> Self {
        Self::new(Arc::new(MemoryAuditStore::unprovisioned()))
    }

    pub fn record(&self, record: CallRecord) {
        // A failed existence check is treated like a missing table.
        let provisioned = self.store.is_provisioned().unwrap_or(false);
        if !provisioned {
            tracing::debug!(
                method = %record.method,
                endpoint = %record.endpoint,
                operation = record.operation.as_deref().unwrap_or(""),
                status = ?record.response_status,
                duration_ms = record.duration_ms,
                "audit table missing, skipping database log"
            );
            return;
        }

        if let Err(err) = self.store.insert(&record) {
            tracing::error!(
                error = %err,
                method = %record.method,
                endpoint = %record.endpoint,
                "failed to write audit record"
            );
        }
    }
}

impl std::fmt::Debug for AuditLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLogger").finish_non_exhaustive()
    }
}
