//! Taleweaver Domain - Campaign data types, identifiers and the object registry
//!
//! Pure types with no I/O. The engine crate persists anything implementing
//! [`DomainObject`] by consulting its [`TypeDescriptor`].

pub mod entities;
pub mod error;
pub mod ids;
pub mod object;
pub mod registry;

pub use entities::{
    AgentConfig, Arc, CampaignPlan, Character, Item, Location, Objective, Point, Rule, Segment,
    SessionNote,
};
pub use error::DomainError;
pub use ids::{is_valid_prefix, Identifier, ObjId, OwnerId};
pub use object::{Document, DomainObject};
pub use registry::{
    describe_prefix, standalone_types, ChildField, LinkField, MapField, MapValueKind, ScalarField,
    ScalarKind, TypeDescriptor, REGISTRY,
};
