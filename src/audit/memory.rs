use std::sync::Mutex;

use crate::error::AuditError;

use super::{AuditStore, CallRecord};

/// In-process store, handy for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryAuditStore {
    records: Mutex<Vec<CallRecord>>,
    unprovisioned: bool,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that reports its table as missing.
    pub fn unprovisioned() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            unprovisioned: true,
        }
    }

    pub fn records(&self) -> Vec<CallRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl AuditStore for MemoryAuditStore {
    fn is_provisioned(&self) -> Result<bool, AuditError> {
        Ok(!self.unprovisioned)
    }

    fn insert(&self, record: &CallRecord) -> Result<(), AuditError> {
        self.records
            .lock()
            .map_err(|_| AuditError::Poisoned)?
            .push(record.clone());
        Ok(())
    }
}
