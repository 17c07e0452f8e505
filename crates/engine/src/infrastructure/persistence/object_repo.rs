//! SQLite implementation of the object repository port.

use std::sync::Arc;

use async_trait::async_trait;
use taleweaver_domain::{describe_prefix, Document, ObjId, OwnerId};

use super::mapper::ObjectMapper;
use super::scope::ScopeGuard;
use super::store::SqliteStore;
use crate::infrastructure::id_allocator::IdAllocator;
use crate::infrastructure::ports::{ObjectRepo, PersistOutcome, RepoError};

/// Repository for every registered domain object type.
pub struct SqliteObjectRepo {
    mapper: ObjectMapper,
}

impl SqliteObjectRepo {
    /// Seeds `allocator` from the store's durable counters so identifiers
    /// persisted before a restart are never issued again.
    pub async fn new(store: SqliteStore, allocator: Arc<IdAllocator>) -> Result<Self, RepoError> {
        let counters = store.load_counters().await?;
        allocator.seed(counters).await;
        Ok(Self {
            mapper: ObjectMapper::new(store, allocator),
        })
    }

    pub fn mapper(&self) -> &ObjectMapper {
        &self.mapper
    }

    fn scope(&self, owner: OwnerId) -> ScopeGuard<'_> {
        ScopeGuard::new(&self.mapper, owner)
    }
}

#[async_trait]
impl ObjectRepo for SqliteObjectRepo {
    async fn create(
        &self,
        prefix: &str,
        document: Document,
        owner: OwnerId,
    ) -> Result<PersistOutcome, RepoError> {
        let descriptor = describe_prefix(prefix)?;
        self.scope(owner).create(descriptor, document).await
    }

    async fn get(&self, id: &ObjId, owner: OwnerId) -> Result<Option<Document>, RepoError> {
        let descriptor = describe_prefix(&id.prefix)?;
        match self.scope(owner).retrieve(descriptor, id).await {
            Ok(doc) => Ok(Some(doc)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn replace(
        &self,
        id: &ObjId,
        document: Document,
        owner: OwnerId,
    ) -> Result<Document, RepoError> {
        let descriptor = describe_prefix(&id.prefix)?;
        self.scope(owner).replace(descriptor, id, document).await
    }

    async fn delete(&self, id: &ObjId, owner: OwnerId) -> Result<(), RepoError> {
        let descriptor = describe_prefix(&id.prefix)?;
        self.scope(owner).delete(descriptor, id).await
    }

    async fn list_ids(&self, prefix: &str, owner: OwnerId) -> Result<Vec<ObjId>, RepoError> {
        let descriptor = describe_prefix(prefix)?;
        self.scope(owner).list_ids(descriptor).await
    }

    async fn list(&self, prefix: &str, owner: OwnerId) -> Result<Vec<Document>, RepoError> {
        let descriptor = describe_prefix(prefix)?;
        self.scope(owner).list(descriptor).await
    }

    async fn import(
        &self,
        documents: Vec<Document>,
        owner: OwnerId,
    ) -> Result<Vec<PersistOutcome>, RepoError> {
        let count = documents.len();
        let outcomes = self.scope(owner).import(documents).await?;
        tracing::info!(
            owner = %owner,
            documents = count,
            created = outcomes.iter().filter(|o| o.created).count(),
            "Imported documents"
        );
        Ok(outcomes)
    }
}
