//! Repository port for domain object storage.
//!
//! Objects cross this boundary as [`Document`]s so one port serves every
//! registered type. Typed conversion happens in the use cases.

use async_trait::async_trait;
use taleweaver_domain::{Document, ObjId, OwnerId};

use super::error::RepoError;

/// Result of a create: the stored document and whether this call wrote it.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistOutcome {
    pub document: Document,
    /// `false` when a row with the same identifier already existed and was
    /// returned unchanged.
    pub created: bool,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectRepo: Send + Sync {
    /// Assign identifiers to any drafts in `document` and persist it.
    async fn create(
        &self,
        prefix: &str,
        document: Document,
        owner: OwnerId,
    ) -> Result<PersistOutcome, RepoError>;

    async fn get(&self, id: &ObjId, owner: OwnerId) -> Result<Option<Document>, RepoError>;

    /// Overwrite an existing top-level object. The document's `obj_id` must
    /// equal `id`.
    async fn replace(
        &self,
        id: &ObjId,
        document: Document,
        owner: OwnerId,
    ) -> Result<Document, RepoError>;

    /// Delete an object and its owned children. NotFound when absent.
    async fn delete(&self, id: &ObjId, owner: OwnerId) -> Result<(), RepoError>;

    /// Identifiers of top-level objects, ascending by numeric.
    async fn list_ids(&self, prefix: &str, owner: OwnerId) -> Result<Vec<ObjId>, RepoError>;

    /// Hydrated top-level objects, ascending by numeric.
    async fn list(&self, prefix: &str, owner: OwnerId) -> Result<Vec<Document>, RepoError>;

    /// Persist documents with pre-assigned identifiers in one unit of work.
    async fn import(
        &self,
        documents: Vec<Document>,
        owner: OwnerId,
    ) -> Result<Vec<PersistOutcome>, RepoError>;
}
