//! Projection store trait.

use async_trait::async_trait;
use common::AggregateId;

use crate::record::{ProjectionRecord, RecordChanges};
use crate::{ProjectionError, Result};

/// A table of projection records keyed by entity id.
///
/// Every operation touches a single key. Implementations must be
/// thread-safe (Send + Sync).
#[async_trait]
pub trait ProjectionStore: Send + Sync {
    /// Inserts a new record.
    ///
    /// Fails with [`ProjectionError::DuplicateKey`] if the key is taken.
    async fn insert(&self, record: ProjectionRecord) -> Result<()>;

    /// Merges `changes` into an existing record.
    ///
    /// Fails with [`ProjectionError::NotFound`] if there is no record.
    async fn update(&self, entity_id: AggregateId, changes: RecordChanges) -> Result<()>;

    /// Fails with [`ProjectionError::NotFound`] if there is no record.
    async fn get(&self, entity_id: AggregateId) -> Result<ProjectionRecord>;

    /// Removes a record. Removing an absent key is not an error.
    ///
    /// Returns whether a record was removed.
    async fn delete(&self, entity_id: AggregateId) -> Result<bool>;

    /// Returns the number of records.
    async fn count(&self) -> Result<usize>;
}

/// Extension trait providing convenience methods for projection stores.
#[async_trait]
pub trait ProjectionStoreExt: ProjectionStore {
    /// Looks up a record, mapping a miss to `None`.
    async fn find(&self, entity_id: AggregateId) -> Result<Option<ProjectionRecord>> {
        match self.get(entity_id).await {
            Ok(record) => Ok(Some(record)),
            Err(ProjectionError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn contains(&self, entity_id: AggregateId) -> Result<bool> {
        Ok(self.find(entity_id).await?.is_some())
    }
}

impl<T: ProjectionStore + ?Sized> ProjectionStoreExt for T {}
