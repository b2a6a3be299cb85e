//! In-memory projection store.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::AggregateId;
use tokio::sync::RwLock;

use crate::record::{ProjectionRecord, RecordChanges};
use crate::store::ProjectionStore;
use crate::{ProjectionError, Result};

/// In-memory projection store for tests. Clones share state.
#[derive(Clone, Default)]
pub struct InMemoryProjectionStore {
    records: Arc<RwLock<HashMap<AggregateId, ProjectionRecord>>>,
    fail_on_write: Arc<AtomicBool>,
    fail_on_delete: Arc<AtomicBool>,
}

impl InMemoryProjectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every record, in no particular order.
    pub async fn all(&self) -> Vec<ProjectionRecord> {
        self.records.read().await.values().cloned().collect()
    }

    /// Makes inserts and updates fail until switched off.
    pub fn set_fail_on_write(&self, fail: bool) {
        self.fail_on_write.store(fail, Ordering::SeqCst);
    }

    /// Makes deletes fail until switched off.
    pub fn set_fail_on_delete(&self, fail: bool) {
        self.fail_on_delete.store(fail, Ordering::SeqCst);
    }

    fn check_write(&self) -> Result<()> {
        if self.fail_on_write.load(Ordering::SeqCst) {
            return Err(ProjectionError::Unavailable("write refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProjectionStore for InMemoryProjectionStore {
    async fn insert(&self, record: ProjectionRecord) -> Result<()> {
        self.check_write()?;

        let mut records = self.records.write().await;
        if records.contains_key(&record.entity_id) {
            return Err(ProjectionError::DuplicateKey(record.entity_id));
        }
        records.insert(record.entity_id, record);
        Ok(())
    }

    async fn update(&self, entity_id: AggregateId, changes: RecordChanges) -> Result<()> {
        self.check_write()?;

        let mut records = self.records.write().await;
        let record = records
            .get_mut(&entity_id)
            .ok_or(ProjectionError::NotFound(entity_id))?;
        record.apply(&changes);
        Ok(())
    }

    async fn get(&self, entity_id: AggregateId) -> Result<ProjectionRecord> {
        self.records
            .read()
            .await
            .get(&entity_id)
            .cloned()
            .ok_or(ProjectionError::NotFound(entity_id))
    }

    async fn delete(&self, entity_id: AggregateId) -> Result<bool> {
        if self.fail_on_delete.load(Ordering::SeqCst) {
            return Err(ProjectionError::Unavailable(format!(
                "delete of {entity_id} refused"
            )));
        }
        Ok(self.records.write().await.remove(&entity_id).is_some())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().await.len())
    }
}
