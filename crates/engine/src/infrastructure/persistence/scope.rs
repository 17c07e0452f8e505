//! Owner scoping for every mapper operation.
//!
//! Rows owned by someone else are indistinguishable from rows that never
//! existed: both come back as `NotFound`.

use taleweaver_domain::object::document_obj_id;
use taleweaver_domain::{describe_prefix, Document, ObjId, OwnerId, TypeDescriptor};

use super::mapper::ObjectMapper;
use crate::infrastructure::ports::{PersistOutcome, RepoError};

/// A mapper bound to one owner.
pub struct ScopeGuard<'m> {
    mapper: &'m ObjectMapper,
    owner: OwnerId,
}

impl<'m> ScopeGuard<'m> {
    pub fn new(mapper: &'m ObjectMapper, owner: OwnerId) -> Self {
        Self { mapper, owner }
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub async fn create(
        &self,
        descriptor: &'static TypeDescriptor,
        doc: Document,
    ) -> Result<PersistOutcome, RepoError> {
        descriptor.ensure_standalone()?;
        let id = document_obj_id(&doc, descriptor)?;
        if id.is_assigned() {
            self.reject_owned_child(descriptor, &id).await?;
        }
        self.mapper.persist(descriptor, doc, self.owner).await
    }

    /// Owned children of standalone types (a Segment inside an Arc) can be
    /// retrieved by their own identifier.
    pub async fn retrieve(
        &self,
        descriptor: &'static TypeDescriptor,
        id: &ObjId,
    ) -> Result<Document, RepoError> {
        descriptor.ensure_standalone()?;
        check_prefix(descriptor, id)?;
        self.mapper
            .load(descriptor, id, self.owner)
            .await?
            .ok_or_else(|| RepoError::not_found(descriptor.type_name, id))
    }

    pub async fn replace(
        &self,
        descriptor: &'static TypeDescriptor,
        id: &ObjId,
        doc: Document,
    ) -> Result<Document, RepoError> {
        descriptor.ensure_standalone()?;
        check_prefix(descriptor, id)?;
        self.reject_owned_child(descriptor, id).await?;
        self.mapper.replace(descriptor, id, doc, self.owner).await
    }

    pub async fn delete(
        &self,
        descriptor: &'static TypeDescriptor,
        id: &ObjId,
    ) -> Result<(), RepoError> {
        descriptor.ensure_standalone()?;
        check_prefix(descriptor, id)?;
        self.reject_owned_child(descriptor, id).await?;
        self.mapper.delete(descriptor, id, self.owner).await
    }

    pub async fn list_ids(
        &self,
        descriptor: &'static TypeDescriptor,
    ) -> Result<Vec<ObjId>, RepoError> {
        descriptor.ensure_standalone()?;
        self.mapper.list_by_owner(descriptor, self.owner).await
    }

    pub async fn list(
        &self,
        descriptor: &'static TypeDescriptor,
    ) -> Result<Vec<Document>, RepoError> {
        descriptor.ensure_standalone()?;
        self.mapper.load_all(descriptor, self.owner).await
    }

    /// Persist documents of any standalone type, typed by their `obj_id`.
    pub async fn import(&self, documents: Vec<Document>) -> Result<Vec<PersistOutcome>, RepoError> {
        let mut items = Vec::with_capacity(documents.len());
        for doc in documents {
            let prefix = doc
                .get(taleweaver_domain::object::OBJ_ID_KEY)
                .and_then(|v| v.get("prefix"))
                .and_then(|v| v.as_str())
                .ok_or_else(|| RepoError::validation("imported document has no obj_id"))?;
            let descriptor = describe_prefix(prefix)?;
            descriptor.ensure_standalone()?;
            document_obj_id(&doc, descriptor)?.validate()?;
            items.push((descriptor, doc));
        }
        self.mapper.persist_many(items, self.owner).await
    }

    async fn reject_owned_child(
        &self,
        descriptor: &'static TypeDescriptor,
        id: &ObjId,
    ) -> Result<(), RepoError> {
        if let Some(parent) = self.mapper.parent_of(descriptor, id, self.owner).await? {
            return Err(RepoError::validation(format!(
                "{id} is owned by {parent}; change it through its parent"
            )));
        }
        Ok(())
    }
}

fn check_prefix(descriptor: &TypeDescriptor, id: &ObjId) -> Result<(), RepoError> {
    if id.prefix != descriptor.prefix {
        return Err(RepoError::validation(format!(
            "{id} is not a {} identifier",
            descriptor.type_name
        )));
    }
    Ok(id.validate()?)
}
