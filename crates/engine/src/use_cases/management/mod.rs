//! Management use cases for CRUD-style operations.
//!
//! These use cases keep HTTP handlers thin: they own the typed conversion
//! between domain objects and the documents the repository stores.

use std::marker::PhantomData;
use std::sync::Arc;

use taleweaver_domain::{
    AgentConfig, Arc as StoryArc, CampaignPlan, Character, DomainError, DomainObject, Item,
    Location, ObjId, Objective, OwnerId, Point, Rule, Segment,
};

use crate::infrastructure::ports::{ObjectRepo, RepoError};

/// Shared error type for management use cases.
#[derive(Debug, thiserror::Error)]
pub enum ManagementError {
    #[error("Not found")]
    NotFound,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Repository error: {0}")]
    Repo(#[source] RepoError),
}

impl From<RepoError> for ManagementError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound { .. } => Self::NotFound,
            e if e.is_client_error() => Self::InvalidInput(e.to_string()),
            e => Self::Repo(e),
        }
    }
}

impl From<DomainError> for ManagementError {
    fn from(err: DomainError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

/// A create result: the stored object and whether this call wrote it.
#[derive(Debug, Clone, PartialEq)]
pub struct Persisted<T> {
    pub object: T,
    pub created: bool,
}

/// Container for management use cases, one per standalone type.
pub struct ManagementUseCases {
    pub rules: ObjectCrud<Rule>,
    pub objectives: ObjectCrud<Objective>,
    pub points: ObjectCrud<Point>,
    pub segments: ObjectCrud<Segment>,
    pub arcs: ObjectCrud<StoryArc>,
    pub items: ObjectCrud<Item>,
    pub characters: ObjectCrud<Character>,
    pub locations: ObjectCrud<Location>,
    pub campaign_plans: ObjectCrud<CampaignPlan>,
    pub agent_configs: ObjectCrud<AgentConfig>,
}

impl ManagementUseCases {
    pub fn new(repo: Arc<dyn ObjectRepo>) -> Self {
        Self {
            rules: ObjectCrud::new(repo.clone()),
            objectives: ObjectCrud::new(repo.clone()),
            points: ObjectCrud::new(repo.clone()),
            segments: ObjectCrud::new(repo.clone()),
            arcs: ObjectCrud::new(repo.clone()),
            items: ObjectCrud::new(repo.clone()),
            characters: ObjectCrud::new(repo.clone()),
            locations: ObjectCrud::new(repo.clone()),
            campaign_plans: ObjectCrud::new(repo.clone()),
            agent_configs: ObjectCrud::new(repo),
        }
    }
}

/// A standalone type with a CRUD set in [`ManagementUseCases`].
pub trait Managed: DomainObject {
    fn crud(use_cases: &ManagementUseCases) -> &ObjectCrud<Self>;
}

macro_rules! managed {
    ($($ty:ty => $field:ident),* $(,)?) => {
        $(
            impl Managed for $ty {
                fn crud(use_cases: &ManagementUseCases) -> &ObjectCrud<Self> {
                    &use_cases.$field
                }
            }
        )*
    };
}

managed! {
    Rule => rules,
    Objective => objectives,
    Point => points,
    Segment => segments,
    StoryArc => arcs,
    Item => items,
    Character => characters,
    Location => locations,
    CampaignPlan => campaign_plans,
    AgentConfig => agent_configs,
}

// =============================================================================
// Generic CRUD
// =============================================================================

/// Create / retrieve / update / delete / list for one domain object type.
pub struct ObjectCrud<T> {
    repo: Arc<dyn ObjectRepo>,
    _type: PhantomData<fn() -> T>,
}

impl<T: DomainObject> ObjectCrud<T> {
    pub fn new(repo: Arc<dyn ObjectRepo>) -> Self {
        Self {
            repo,
            _type: PhantomData,
        }
    }

    /// Persist a new object. Draft identifiers (numeric 0) are assigned; an
    /// object whose identifier is already stored comes back unchanged.
    pub async fn create(&self, object: T, owner: OwnerId) -> Result<Persisted<T>, ManagementError> {
        let outcome = self
            .repo
            .create(T::prefix(), object.to_document()?, owner)
            .await?;
        let object = decode::<T>(outcome.document)?;
        tracing::debug!(
            id = %object.obj_id(),
            owner = %owner,
            created = outcome.created,
            "Created object"
        );
        Ok(Persisted {
            object,
            created: outcome.created,
        })
    }

    pub async fn get(&self, id: &ObjId, owner: OwnerId) -> Result<Option<T>, ManagementError> {
        ensure_prefix::<T>(id)?;
        self.repo
            .get(id, owner)
            .await?
            .map(decode::<T>)
            .transpose()
    }

    pub async fn list(&self, owner: OwnerId) -> Result<Vec<T>, ManagementError> {
        self.repo
            .list(T::prefix(), owner)
            .await?
            .into_iter()
            .map(decode::<T>)
            .collect()
    }

    pub async fn list_ids(&self, owner: OwnerId) -> Result<Vec<ObjId>, ManagementError> {
        Ok(self.repo.list_ids(T::prefix(), owner).await?)
    }

    /// Replace the stored object. `object.obj_id` must equal `id`.
    pub async fn update(
        &self,
        id: &ObjId,
        object: T,
        owner: OwnerId,
    ) -> Result<T, ManagementError> {
        ensure_prefix::<T>(id)?;
        if object.obj_id() != id {
            return Err(ManagementError::InvalidInput(format!(
                "identifier mismatch: path names {id}, body carries {}",
                object.obj_id()
            )));
        }
        let stored = self.repo.replace(id, object.to_document()?, owner).await?;
        decode::<T>(stored)
    }

    pub async fn delete(&self, id: &ObjId, owner: OwnerId) -> Result<(), ManagementError> {
        ensure_prefix::<T>(id)?;
        self.repo.delete(id, owner).await?;
        Ok(())
    }
}

fn ensure_prefix<T: DomainObject>(id: &ObjId) -> Result<(), ManagementError> {
    if id.prefix != T::prefix() {
        return Err(ManagementError::InvalidInput(format!(
            "{id} is not a {} identifier",
            T::descriptor().type_name
        )));
    }
    Ok(())
}

/// Stored documents that fail to decode are a store problem, not bad input.
fn decode<T: DomainObject>(doc: taleweaver_domain::Document) -> Result<T, ManagementError> {
    T::from_document(doc)
        .map_err(|e| ManagementError::Repo(RepoError::serialization(e)))
}
